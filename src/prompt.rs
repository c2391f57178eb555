//! Context prompt assembly for resumed agent sessions.
//!
//! When a blocked task resumes, the agent gets a single re-briefing string:
//! task metadata followed by the full ordered discussion and a fixed
//! instruction footer. Pure string building, deterministic for identical
//! inputs.

use crate::models::{Comment, Task};

/// Fixed footer appended to every context prompt.
const INSTRUCTION_FOOTER: &str = "Your question has been answered above. \
Continue working on this task. If you need more input, block the task again \
with a new question.";

/// Build the re-briefing prompt for a task and its ordered comment history.
///
/// Comments must be supplied in ascending creation order; the builder does
/// not sort.
pub fn build_context_prompt(task: &Task, comments: &[Comment]) -> String {
    let mut out = String::new();

    out.push_str(&format!("## Task {}: {}\n", task.reference, task.title));
    if let Some(priority) = task.priority {
        out.push_str(&format!("Priority: {}\n", priority));
    }

    out.push_str("\n## Discussion\n");
    for comment in comments {
        out.push_str(&format!(
            "[{}]: {}\n",
            comment.author_display(),
            comment.content
        ));
    }

    out.push_str("\n## Instructions\n");
    out.push_str(INSTRUCTION_FOOTER);
    out.push('\n');

    out
}
