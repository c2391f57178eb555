//! Mention extraction from comment text.
//!
//! A mention is an `@` sentinel followed by one or more word characters.
//! The extractor is a pure function shared by comment ingestion and
//! resume-trigger evaluation, so both always agree on what counts as a
//! mention.

/// The reserved mention token that addresses the blocked agent.
pub const AGENT_MENTION: &str = "@agent";

/// Character that introduces a mention.
const SENTINEL: char = '@';

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Extract mention tokens from free text.
///
/// Tokens are returned verbatim (including the sentinel), deduplicated by
/// exact string equality, preserving order of first occurrence. An `@`
/// immediately preceded by a word character does not start a mention, so
/// an email address like `a@b.com` yields nothing.
pub fn extract_mentions(text: &str) -> Vec<String> {
    let mut mentions: Vec<String> = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == SENTINEL {
            // Boundary check: a sentinel glued to a preceding word char is
            // part of that token (email-like), not a mention.
            let preceded_by_word = i > 0 && is_word_char(chars[i - 1]);
            if !preceded_by_word {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && is_word_char(chars[end]) {
                    end += 1;
                }
                if end > start {
                    let token: String = chars[i..end].iter().collect();
                    if !mentions.contains(&token) {
                        mentions.push(token);
                    }
                    i = end;
                    continue;
                }
            }
        }
        i += 1;
    }

    mentions
}

/// Whether the text mentions the reserved agent token.
pub fn mentions_agent(mentions: &[String]) -> bool {
    mentions.iter().any(|m| m == AGENT_MENTION)
}
