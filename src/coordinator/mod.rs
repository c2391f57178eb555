//! The block/resume coordination engine.
//!
//! The coordinator owns the task state machine around human input: an
//! agent blocks a task on a question, the task sits in `need_input` while
//! discussion accumulates, and a qualifying human reply transitions it
//! back to `in_progress` and relaunches the agent's session.
//!
//! Two writes need atomicity and are delegated to the storage layer:
//! blocking (task transition + question comment, one transaction) and
//! resuming (a compare-and-swap on the column, which is also the guard
//! against duplicate triggers). Everything slow or externally dependent
//! happens behind the [`TriggerExecutor`] so comment creation always
//! acknowledges immediately.

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::executor::{ResumeJob, TriggerExecutor};
use crate::mentions::{extract_mentions, mentions_agent};
use crate::models::{
    AgentSession, AuthorKind, Column, Comment, HistoryAction, HistoryEntry, ResumeMode,
    SYSTEM_ACTOR, Task,
};
use crate::prompt::build_context_prompt;
use crate::storage::Storage;
use crate::tools::AgentTool;
use crate::{Error, Result};

/// Why a trigger evaluation declined to resume. Expected outcomes, not
/// errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Agent-authored comments never trigger (no self-resume loops)
    AgentAuthor,
    /// The comment does not mention `@agent`
    NoAgentMention,
    /// The task is not waiting for input
    NotAwaitingInput,
    /// Nothing to resume: no session linked
    NoLinkedSession,
    /// The board's resume mode is not `auto`
    ModeNotAuto,
    /// Another trigger transitioned the task first
    Superseded,
    /// Evaluation itself failed; details are in the logs
    EvaluationFailed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::AgentAuthor => "comment author is an agent",
            SkipReason::NoAgentMention => "comment does not mention @agent",
            SkipReason::NotAwaitingInput => "task is not in need_input",
            SkipReason::NoLinkedSession => "task has no linked session",
            SkipReason::ModeNotAuto => "board resume mode is not auto",
            SkipReason::Superseded => "task was already resumed",
            SkipReason::EvaluationFailed => "trigger evaluation failed",
        };
        f.write_str(s)
    }
}

/// Outcome of evaluating a comment against the resume guards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "trigger")]
pub enum TriggerDecision {
    /// All guards held; the resume was committed and the launch queued
    Fired { task_id: String },
    /// A guard failed; nothing happened
    Skipped { reason: SkipReason },
}

/// Result of a successful `block`.
#[derive(Debug, Clone, Serialize)]
pub struct BlockOutcome {
    pub task_id: String,
    pub reference: String,
    pub comment_id: String,
    pub column: Column,
}

/// Result of a successful `add_comment`.
#[derive(Debug, Clone, Serialize)]
pub struct CommentOutcome {
    pub comment_id: String,
    pub task_id: String,
    pub reference: String,
    pub mentions: Vec<String>,
    #[serde(flatten)]
    pub trigger: TriggerDecision,
}

/// Result of a successful explicit `resume`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ResumeOutcome {
    /// Task transitioned and the launch was queued
    Resumed { reference: String, column: Column },
    /// Manual mode: no state change, command returned for copy/paste
    CommandPrinted { reference: String, command: String },
}

/// The block/resume coordinator. Borrows storage and the trigger executor
/// for the duration of one operation batch.
pub struct Coordinator<'a> {
    storage: &'a mut Storage,
    executor: &'a TriggerExecutor,
}

impl<'a> Coordinator<'a> {
    pub fn new(storage: &'a mut Storage, executor: &'a TriggerExecutor) -> Self {
        Self { storage, executor }
    }

    /// Block a task on a question for a human.
    ///
    /// Atomically moves the task to `need_input` and records the question
    /// as an agent-authored comment; neither write is visible without the
    /// other. Fails with `InvalidTransition` if the task is already
    /// blocked or done.
    pub fn block(&mut self, task_ref: &str, question: &str, actor: &str) -> Result<BlockOutcome> {
        if question.trim().is_empty() {
            return Err(Error::EmptyContent);
        }

        let task = self.storage.resolve_task(task_ref)?;
        if task.column == Column::NeedInput || task.column == Column::Done {
            return Err(Error::InvalidTransition {
                column: task.column,
            });
        }

        let comment = new_comment(
            &task,
            question,
            AuthorKind::Agent,
            Some(actor.to_string()),
        );

        let mut updated = task.clone();
        updated.history.push(HistoryEntry::new(
            actor,
            HistoryAction::Blocked {
                from: task.column,
                reason: question.to_string(),
            },
        ));
        updated.column = Column::NeedInput;
        updated.updated_at = Utc::now();

        self.storage.apply_block(&updated, &comment)?;

        // Same post-persist hook as every other comment. The author guard
        // makes this a no-op, but the evaluation still happens exactly once
        // per comment regardless of origin.
        self.evaluate_trigger_detached(&comment);

        Ok(BlockOutcome {
            task_id: updated.id,
            reference: updated.reference,
            comment_id: comment.id,
            column: Column::NeedInput,
        })
    }

    /// Add a comment to a task.
    ///
    /// The single entry point for comment creation: mention extraction and
    /// resume-trigger evaluation happen here exactly once per comment.
    /// Trigger failures are logged, never surfaced to the commenter.
    pub fn add_comment(
        &mut self,
        task_ref: &str,
        content: &str,
        author_kind: AuthorKind,
        author_id: Option<String>,
    ) -> Result<CommentOutcome> {
        if content.trim().is_empty() {
            return Err(Error::EmptyContent);
        }

        let task = self.storage.resolve_task(task_ref)?;
        let comment = new_comment(&task, content, author_kind, author_id);
        self.storage.create_comment(&comment)?;

        let trigger = self.evaluate_trigger_detached(&comment);

        Ok(CommentOutcome {
            comment_id: comment.id.clone(),
            task_id: task.id,
            reference: task.reference,
            mentions: comment.mentions,
            trigger,
        })
    }

    /// Link an external agent session to a task (last-write-wins).
    pub fn link_session(
        &mut self,
        task_ref: &str,
        tool: &str,
        session_ref: &str,
        working_dir: PathBuf,
        actor: &str,
    ) -> Result<Task> {
        let tool = AgentTool::parse(tool)?;
        if session_ref.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Session reference must not be empty".to_string(),
            ));
        }

        let mut task = self.storage.resolve_task(task_ref)?;
        task.session = Some(AgentSession::new(
            tool,
            session_ref.to_string(),
            working_dir,
        ));
        task.history
            .push(HistoryEntry::new(actor, HistoryAction::SessionLinked { tool }));
        task.updated_at = Utc::now();
        self.storage.update_task(&task)?;

        Ok(task)
    }

    /// Move a task between columns by hand.
    ///
    /// Entering `need_input` is reserved for `block`, which records the
    /// question alongside the transition.
    pub fn move_task(&mut self, task_ref: &str, to: Column, actor: &str) -> Result<Task> {
        if to == Column::NeedInput {
            return Err(Error::InvalidInput(
                "Use `cap block` to move a task into need_input".to_string(),
            ));
        }

        let mut task = self.storage.resolve_task(task_ref)?;
        if task.column == to {
            return Ok(task);
        }

        task.history.push(HistoryEntry::new(
            actor,
            HistoryAction::Moved {
                from: task.column,
                to,
            },
        ));
        task.column = to;
        task.updated_at = Utc::now();
        self.storage.update_task(&task)?;

        Ok(task)
    }

    /// Explicitly resume a blocked task (`command` mode, or `auto` when a
    /// human prefers not to wait for a comment trigger).
    ///
    /// On a `manual`-mode board nothing changes: the resume command is
    /// returned for copy/paste instead.
    pub fn resume(&mut self, task_ref: &str, actor: &str) -> Result<ResumeOutcome> {
        let task = self.storage.resolve_task(task_ref)?;
        if task.column != Column::NeedInput {
            return Err(Error::InvalidTransition {
                column: task.column,
            });
        }
        let Some(session) = task.session.clone() else {
            return Err(Error::InvalidInput(format!(
                "Task {} has no linked session to resume",
                task.reference
            )));
        };

        let board = self.storage.get_board(&task.board_id)?;
        let comments = self.storage.list_comments(&task.id)?;
        let prompt = build_context_prompt(&task, &comments);
        let invocation =
            session
                .tool
                .build_resume_command(&session.session_ref, &session.working_dir, &prompt);

        if board.resume_mode == ResumeMode::Manual {
            return Ok(ResumeOutcome::CommandPrinted {
                reference: task.reference,
                command: invocation.to_shell_string(),
            });
        }

        let mut updated = task.clone();
        updated.history.push(HistoryEntry::new(
            actor,
            HistoryAction::Resumed { from: task.column },
        ));
        updated.column = Column::InProgress;
        updated.updated_at = Utc::now();

        if !self.storage.apply_resume(&updated)? {
            // Lost a race with a concurrent trigger; re-read for the error
            let current = self.storage.get_task(&task.id)?;
            return Err(Error::InvalidTransition {
                column: current.column,
            });
        }

        self.executor.submit(ResumeJob {
            task_id: updated.id,
            reference: updated.reference.clone(),
            invocation,
        });

        Ok(ResumeOutcome::Resumed {
            reference: updated.reference,
            column: Column::InProgress,
        })
    }

    /// Evaluate the resume trigger for a freshly persisted comment,
    /// swallowing evaluation errors (logged, never propagated to the
    /// comment-creation caller).
    pub fn evaluate_trigger_detached(&mut self, comment: &Comment) -> TriggerDecision {
        match self.evaluate_trigger(comment) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(
                    comment_id = %comment.id,
                    task_id = %comment.task_id,
                    error = %e,
                    "resume trigger evaluation failed"
                );
                TriggerDecision::Skipped {
                    reason: SkipReason::EvaluationFailed,
                }
            }
        }
    }

    /// Run the guard chain for a persisted comment and, if every guard
    /// holds, commit the resume and queue the launch.
    ///
    /// Guards, short-circuiting, no side effects on failure:
    /// 1. human author, 2. `@agent` mentioned, 3. task in `need_input`,
    /// 4. session linked, 5. board mode `auto`.
    pub fn evaluate_trigger(&mut self, comment: &Comment) -> Result<TriggerDecision> {
        if comment.author_kind != AuthorKind::Human {
            return Ok(self.skip(comment, SkipReason::AgentAuthor));
        }
        if !mentions_agent(&comment.mentions) {
            return Ok(self.skip(comment, SkipReason::NoAgentMention));
        }

        let task = self.storage.get_task(&comment.task_id)?;
        if task.column != Column::NeedInput {
            return Ok(self.skip(comment, SkipReason::NotAwaitingInput));
        }
        if task.session.is_none() {
            return Ok(self.skip(comment, SkipReason::NoLinkedSession));
        }

        let board = self.storage.get_board(&task.board_id)?;
        if board.resume_mode != ResumeMode::Auto {
            return Ok(self.skip(comment, SkipReason::ModeNotAuto));
        }

        self.trigger_resume(&task, comment)
    }

    /// Commit the auto-resume transition and hand the launch to the
    /// executor.
    ///
    /// The conditional column write is the idempotency guard: once one
    /// trigger applies it, later qualifying comments fail guard 3 (or the
    /// compare-and-swap here, if they raced past the read).
    fn trigger_resume(&mut self, task: &Task, comment: &Comment) -> Result<TriggerDecision> {
        let mut updated = task.clone();
        updated.history.push(HistoryEntry::new(
            SYSTEM_ACTOR,
            HistoryAction::AutoResumed {
                from: task.column,
                trigger_comment: comment.id.clone(),
            },
        ));
        updated.column = Column::InProgress;
        updated.updated_at = Utc::now();

        if !self.storage.apply_resume(&updated)? {
            return Ok(self.skip(comment, SkipReason::Superseded));
        }

        let Some(session) = task.session.as_ref() else {
            return Ok(self.skip(comment, SkipReason::NoLinkedSession));
        };

        let comments = self.storage.list_comments(&task.id)?;
        let prompt = build_context_prompt(&updated, &comments);
        let invocation =
            session
                .tool
                .build_resume_command(&session.session_ref, &session.working_dir, &prompt);

        self.executor.submit(ResumeJob {
            task_id: updated.id.clone(),
            reference: updated.reference.clone(),
            invocation,
        });

        Ok(TriggerDecision::Fired {
            task_id: updated.id,
        })
    }

    fn skip(&self, comment: &Comment, reason: SkipReason) -> TriggerDecision {
        tracing::debug!(
            comment_id = %comment.id,
            task_id = %comment.task_id,
            %reason,
            "resume trigger skipped"
        );
        TriggerDecision::Skipped { reason }
    }
}

/// Build a comment for a task, extracting mentions from the content.
fn new_comment(
    task: &Task,
    content: &str,
    author_kind: AuthorKind,
    author_id: Option<String>,
) -> Comment {
    Comment {
        id: uuid::Uuid::new_v4().to_string(),
        task_id: task.id.clone(),
        content: content.to_string(),
        author_kind,
        author_id,
        mentions: extract_mentions(content),
        created_at: Utc::now(),
    }
}
