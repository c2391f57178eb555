//! Tool adapters for resuming external agent sessions.
//!
//! Each supported tool knows two things: how its session references are
//! shaped (an opaque session ID vs. a filesystem path to a recorded
//! session), and how to build the literal command line that resumes one of
//! its sessions with a re-briefing prompt. Everything else in the crate
//! treats tools through this one enum, so adding a tool is a matter of
//! adding a variant.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Supported external agent tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentTool {
    /// Claude Code: sessions are UUIDs resumed via `claude --resume`
    Claude,
    /// Codex CLI: sessions are rollout files resumed via `codex resume`
    Codex,
    /// opencode: sessions are IDs resumed via `opencode run --session`
    Opencode,
}

/// All supported tool identifiers, as accepted on the CLI.
pub const TOOL_NAMES: &[&str] = &["claude", "codex", "opencode"];

/// Classification of a session reference's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRefKind {
    /// An opaque identifier (UUID or tool-internal ID)
    SessionId,
    /// A filesystem path to a recorded session file
    RolloutPath,
}

impl AgentTool {
    /// Parse a tool identifier. Unknown identifiers are an error, never a
    /// silent default.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "claude" | "claude-code" => Ok(AgentTool::Claude),
            "codex" => Ok(AgentTool::Codex),
            "opencode" => Ok(AgentTool::Opencode),
            other => Err(Error::UnsupportedTool(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentTool::Claude => "claude",
            AgentTool::Codex => "codex",
            AgentTool::Opencode => "opencode",
        }
    }

    /// How this tool's session references are discovered/shaped.
    pub fn ref_kind(&self) -> SessionRefKind {
        match self {
            AgentTool::Claude => SessionRefKind::SessionId,
            AgentTool::Codex => SessionRefKind::RolloutPath,
            AgentTool::Opencode => SessionRefKind::SessionId,
        }
    }

    /// Build the invocation that resumes a session of this tool with the
    /// given re-briefing prompt. Pure: no I/O, no environment access.
    pub fn build_resume_command(
        &self,
        session_ref: &str,
        working_dir: &Path,
        prompt: &str,
    ) -> ResumeInvocation {
        let (program, args) = match self {
            AgentTool::Claude => (
                "claude",
                vec![
                    "--resume".to_string(),
                    session_ref.to_string(),
                    prompt.to_string(),
                ],
            ),
            AgentTool::Codex => (
                "codex",
                vec![
                    "resume".to_string(),
                    session_ref.to_string(),
                    prompt.to_string(),
                ],
            ),
            AgentTool::Opencode => (
                "opencode",
                vec![
                    "run".to_string(),
                    "--session".to_string(),
                    session_ref.to_string(),
                    prompt.to_string(),
                ],
            ),
        };

        ResumeInvocation {
            program: program.to_string(),
            args,
            working_dir: working_dir.to_path_buf(),
        }
    }
}

impl fmt::Display for AgentTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully specified external command for resuming a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeInvocation {
    /// Program to execute
    pub program: String,

    /// Literal argument vector
    pub args: Vec<String>,

    /// Directory to launch in
    pub working_dir: PathBuf,
}

impl ResumeInvocation {
    /// Render as a shell-quoted one-liner for copy/paste (manual resume mode).
    pub fn to_shell_string(&self) -> String {
        let mut parts = vec![shell_quote(&self.program)];
        parts.extend(self.args.iter().map(|a| shell_quote(a)));
        parts.join(" ")
    }
}

/// Quote an argument for POSIX shells. Plain tokens pass through; anything
/// else gets single-quoted with embedded quotes escaped.
fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
