//! Data models for Capstan entities.
//!
//! This module defines the core data structures:
//! - `Board` - A kanban board with a resume-mode policy
//! - `Task` - Work items moving through board columns, with history
//! - `Comment` - Immutable discussion entries on a task
//! - `AgentSession` - The link between a task and a resumable AI-tool session
//! - `HistoryEntry` - Append-only transition records on a task

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::tools::{AgentTool, SessionRefKind};
use crate::{Error, Result};

/// Actor name recorded on system-initiated history entries.
pub const SYSTEM_ACTOR: &str = "system";

/// Task lifecycle column within the board workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    #[default]
    Todo,
    InProgress,
    NeedInput,
    Done,
}

impl Column {
    /// Parse a column name as used on the CLI and in storage.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "todo" => Ok(Column::Todo),
            "in_progress" | "in-progress" | "inprogress" => Ok(Column::InProgress),
            "need_input" | "need-input" | "needinput" => Ok(Column::NeedInput),
            "done" => Ok(Column::Done),
            _ => Err(Error::InvalidInput(format!("Invalid column: {}", s))),
        }
    }

    /// Storage/display name of the column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Todo => "todo",
            Column::InProgress => "in_progress",
            Column::NeedInput => "need_input",
            Column::Done => "done",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Board-level policy governing how a blocked task gets resumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeMode {
    /// No automation: the resume command is printed for copy/paste.
    Manual,
    /// A human must explicitly run `cap resume`.
    #[default]
    Command,
    /// A qualifying `@agent` comment resumes the task automatically.
    Auto,
}

impl ResumeMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(ResumeMode::Manual),
            "command" => Ok(ResumeMode::Command),
            "auto" => Ok(ResumeMode::Auto),
            _ => Err(Error::InvalidInput(format!("Invalid resume mode: {}", s))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResumeMode::Manual => "manual",
            ResumeMode::Command => "command",
            ResumeMode::Auto => "auto",
        }
    }
}

impl fmt::Display for ResumeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of who authored a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorKind {
    Human,
    Agent,
}

impl AuthorKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "human" => Ok(AuthorKind::Human),
            "agent" => Ok(AuthorKind::Agent),
            _ => Err(Error::InvalidInput(format!("Invalid author kind: {}", s))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorKind::Human => "human",
            AuthorKind::Agent => "agent",
        }
    }
}

impl fmt::Display for AuthorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A kanban board owning tasks and the resume-mode policy that gates
/// automatic resumption of its blocked tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    /// Unique identifier (UUID)
    pub id: String,

    /// Board name, unique per store
    pub name: String,

    /// How blocked tasks on this board may be resumed
    #[serde(default)]
    pub resume_mode: ResumeMode,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Board {
    /// Create a new board with the given name.
    pub fn new(id: String, name: String, resume_mode: ResumeMode) -> Self {
        Self {
            id,
            name,
            resume_mode,
            created_at: Utc::now(),
        }
    }
}

/// The link between a task and an external AI-tool session that can be
/// resumed. At most one per task; relinking overwrites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSession {
    /// Which tool owns the session
    pub tool: AgentTool,

    /// Opaque external reference; shape depends on the tool
    pub session_ref: String,

    /// Classification of the reference's shape
    pub ref_kind: SessionRefKind,

    /// Working directory the tool should resume in
    pub working_dir: PathBuf,

    /// When the session was linked to the task
    pub linked_at: DateTime<Utc>,
}

impl AgentSession {
    pub fn new(tool: AgentTool, session_ref: String, working_dir: PathBuf) -> Self {
        Self {
            ref_kind: tool.ref_kind(),
            tool,
            session_ref,
            working_dir,
            linked_at: Utc::now(),
        }
    }
}

/// What happened in a single task transition.
///
/// One variant per action kind, carrying only the fields that action needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HistoryAction {
    /// Task was created
    Created,

    /// Task was moved between columns by a human or agent
    Moved { from: Column, to: Column },

    /// Agent blocked the task on a question
    Blocked { from: Column, reason: String },

    /// A qualifying comment auto-resumed the task
    AutoResumed { from: Column, trigger_comment: String },

    /// A human explicitly resumed the task
    Resumed { from: Column },

    /// An agent session was linked to the task
    SessionLinked { tool: AgentTool },
}

/// A single entry in a task's append-only history log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the transition was committed
    pub timestamp: DateTime<Utc>,

    /// Who caused it ("system" for automatic transitions)
    pub actor: String,

    /// The transition itself
    #[serde(flatten)]
    pub action: HistoryAction,
}

impl HistoryEntry {
    pub fn new(actor: impl Into<String>, action: HistoryAction) -> Self {
        Self {
            timestamp: Utc::now(),
            actor: actor.into(),
            action,
        }
    }
}

/// A work item tracked on a board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier (UUID)
    pub id: String,

    /// Human-friendly display reference (e.g., "cap-a1b2")
    pub reference: String,

    /// Owning board ID
    pub board_id: String,

    /// Task title
    pub title: String,

    /// Detailed description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Priority level (0-4, lower is higher priority)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,

    /// Current lifecycle column
    #[serde(default)]
    pub column: Column,

    /// Linked agent session, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<AgentSession>,

    /// Append-only transition log
    #[serde(default)]
    pub history: Vec<HistoryEntry>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task in the `todo` column with a `created` history entry.
    pub fn new(id: String, reference: String, board_id: String, title: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            reference,
            board_id,
            title,
            description: None,
            priority: None,
            column: Column::default(),
            session: None,
            history: vec![HistoryEntry::new(SYSTEM_ACTOR, HistoryAction::Created)],
            created_at: now,
            updated_at: now,
        }
    }
}

/// A discussion entry on a task. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// Unique identifier (UUID)
    pub id: String,

    /// Owning task ID
    pub task_id: String,

    /// Free-text content
    pub content: String,

    /// Who wrote it
    pub author_kind: AuthorKind,

    /// Optional author identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,

    /// Mention tokens extracted from the content, deduplicated and
    /// ordered by first occurrence
    #[serde(default)]
    pub mentions: Vec<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Display name used when rendering the comment in a transcript.
    pub fn author_display(&self) -> &str {
        self.author_id.as_deref().unwrap_or(self.author_kind.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_parse_aliases() {
        assert_eq!(Column::parse("todo").unwrap(), Column::Todo);
        assert_eq!(Column::parse("in-progress").unwrap(), Column::InProgress);
        assert_eq!(Column::parse("need_input").unwrap(), Column::NeedInput);
        assert_eq!(Column::parse("DONE").unwrap(), Column::Done);
        assert!(Column::parse("review").is_err());
    }

    #[test]
    fn test_resume_mode_parse() {
        assert_eq!(ResumeMode::parse("auto").unwrap(), ResumeMode::Auto);
        assert_eq!(ResumeMode::parse("manual").unwrap(), ResumeMode::Manual);
        assert_eq!(ResumeMode::parse("command").unwrap(), ResumeMode::Command);
        assert!(ResumeMode::parse("hybrid").is_err());
    }

    #[test]
    fn test_history_action_serializes_tagged() {
        let entry = HistoryEntry::new(
            SYSTEM_ACTOR,
            HistoryAction::AutoResumed {
                from: Column::NeedInput,
                trigger_comment: "c-123".to_string(),
            },
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["action"], "auto_resumed");
        assert_eq!(json["from"], "need_input");
        assert_eq!(json["trigger_comment"], "c-123");
        assert_eq!(json["actor"], "system");
    }

    #[test]
    fn test_history_roundtrip() {
        let entry = HistoryEntry::new(
            "agent-claude",
            HistoryAction::Blocked {
                from: Column::InProgress,
                reason: "Which auth approach?".to_string(),
            },
        );
        let json = serde_json::to_string(&entry).unwrap();
        let back: HistoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.action, entry.action);
        assert_eq!(back.actor, "agent-claude");
    }

    #[test]
    fn test_new_task_defaults() {
        let task = Task::new(
            "id-1".to_string(),
            "cap-a1b2".to_string(),
            "board-1".to_string(),
            "Write docs".to_string(),
        );
        assert_eq!(task.column, Column::Todo);
        assert!(task.session.is_none());
        assert_eq!(task.history.len(), 1);
        assert_eq!(task.history[0].action, HistoryAction::Created);
    }

    #[test]
    fn test_comment_author_display() {
        let mut comment = Comment {
            id: "c1".to_string(),
            task_id: "t1".to_string(),
            content: "hello".to_string(),
            author_kind: AuthorKind::Human,
            author_id: None,
            mentions: vec![],
            created_at: Utc::now(),
        };
        assert_eq!(comment.author_display(), "human");
        comment.author_id = Some("alice".to_string());
        assert_eq!(comment.author_display(), "alice");
    }
}
