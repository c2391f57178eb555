//! Command implementations for the Capstan CLI.
//!
//! This module contains the business logic for each CLI command. Each
//! function opens storage for the repository, performs the operation via
//! the coordinator or storage layer, and returns an [`Output`] carrying
//! both JSON and human-readable renderings.

use serde_json::json;
use std::path::{Path, PathBuf};

use crate::coordinator::{Coordinator, ResumeOutcome, TriggerDecision};
use crate::executor::TriggerExecutor;
use crate::models::{AuthorKind, Board, Column, ResumeMode, Task};
use crate::storage::{Storage, generate_reference};
use crate::{Error, Result};

/// Config key holding the board used when `--board` is omitted.
const DEFAULT_BOARD_KEY: &str = "default_board";

/// A command result in both output formats.
pub struct Output {
    pub json: serde_json::Value,
    pub human: String,
}

impl Output {
    fn new(json: serde_json::Value, human: impl Into<String>) -> Self {
        Self {
            json,
            human: human.into(),
        }
    }

    /// Print to stdout in the selected format.
    pub fn print(&self, human: bool) {
        if human {
            println!("{}", self.human);
        } else {
            println!("{}", self.json);
        }
    }
}

/// Initialize capstan for a repository, creating the default board.
pub fn system_init(repo_path: &Path) -> Result<Output> {
    if Storage::exists(repo_path)? {
        return Ok(Output::new(
            json!({"initialized": false, "reason": "already initialized"}),
            "Capstan is already initialized for this repository",
        ));
    }

    let mut storage = Storage::init(repo_path)?;
    let board = Board::new(
        uuid::Uuid::new_v4().to_string(),
        "default".to_string(),
        ResumeMode::default(),
    );
    storage.create_board(&board)?;
    storage.set_config(DEFAULT_BOARD_KEY, &board.id)?;

    Ok(Output::new(
        json!({
            "initialized": true,
            "board": board.name,
            "resume_mode": board.resume_mode,
            "path": storage.root,
        }),
        format!(
            "Initialized capstan (board \"{}\", resume mode {})",
            board.name, board.resume_mode
        ),
    ))
}

/// Create a new board.
pub fn board_create(repo_path: &Path, name: &str, resume_mode: Option<&str>) -> Result<Output> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("Board name must not be empty".to_string()));
    }
    let resume_mode = match resume_mode {
        Some(s) => ResumeMode::parse(s)?,
        None => ResumeMode::default(),
    };

    let mut storage = Storage::open(repo_path)?;
    let board = Board::new(uuid::Uuid::new_v4().to_string(), name.to_string(), resume_mode);
    storage.create_board(&board)?;

    Ok(Output::new(
        json!({"id": board.id, "name": board.name, "resume_mode": board.resume_mode}),
        format!(
            "Created board \"{}\" (resume mode {})",
            board.name, board.resume_mode
        ),
    ))
}

/// List all boards.
pub fn board_list(repo_path: &Path) -> Result<Output> {
    let storage = Storage::open(repo_path)?;
    let boards = storage.list_boards()?;

    let human = if boards.is_empty() {
        "No boards".to_string()
    } else {
        boards
            .iter()
            .map(|b| format!("{}  (resume mode {})", b.name, b.resume_mode))
            .collect::<Vec<_>>()
            .join("\n")
    };

    Ok(Output::new(json!({"boards": boards}), human))
}

/// Show one board.
pub fn board_show(repo_path: &Path, board_ref: &str) -> Result<Output> {
    let storage = Storage::open(repo_path)?;
    let board = storage.resolve_board(board_ref)?;
    let tasks = storage.list_tasks(Some(&board.id), None)?;

    Ok(Output::new(
        json!({"board": board, "task_count": tasks.len()}),
        format!(
            "{}: resume mode {}, {} task(s)",
            board.name,
            board.resume_mode,
            tasks.len()
        ),
    ))
}

/// Change a board's resume mode.
pub fn board_set_mode(repo_path: &Path, board_ref: &str, mode: &str) -> Result<Output> {
    let mode = ResumeMode::parse(mode)?;
    let mut storage = Storage::open(repo_path)?;
    let mut board = storage.resolve_board(board_ref)?;
    board.resume_mode = mode;
    storage.update_board(&board)?;

    Ok(Output::new(
        json!({"name": board.name, "resume_mode": board.resume_mode}),
        format!("Board \"{}\" resume mode set to {}", board.name, mode),
    ))
}

/// Create a new task.
pub fn task_create(
    repo_path: &Path,
    title: &str,
    board_ref: Option<&str>,
    priority: Option<u8>,
    description: Option<String>,
) -> Result<Output> {
    if title.trim().is_empty() {
        return Err(Error::InvalidInput("Task title must not be empty".to_string()));
    }
    if let Some(p) = priority {
        if p > 4 {
            return Err(Error::InvalidInput(format!(
                "Priority must be 0-4, got {}",
                p
            )));
        }
    }

    let mut storage = Storage::open(repo_path)?;
    let board = resolve_board_or_default(&storage, board_ref)?;

    let id = uuid::Uuid::new_v4().to_string();
    let reference = generate_reference("cap", &id);
    let mut task = Task::new(id, reference, board.id.clone(), title.to_string());
    task.priority = priority;
    task.description = description;
    storage.create_task(&task)?;

    Ok(Output::new(
        json!({
            "id": task.id,
            "reference": task.reference,
            "title": task.title,
            "board": board.name,
            "column": task.column,
        }),
        format!("Created task {}: \"{}\"", task.reference, task.title),
    ))
}

/// List tasks, optionally filtered by board and column.
pub fn task_list(
    repo_path: &Path,
    board_ref: Option<&str>,
    column: Option<&str>,
) -> Result<Output> {
    let storage = Storage::open(repo_path)?;
    let board_id = match board_ref {
        Some(b) => Some(storage.resolve_board(b)?.id),
        None => None,
    };
    let column = match column {
        Some(c) => Some(Column::parse(c)?),
        None => None,
    };

    let tasks = storage.list_tasks(board_id.as_deref(), column)?;
    let human = if tasks.is_empty() {
        "No tasks".to_string()
    } else {
        tasks
            .iter()
            .map(|t| format!("{}  [{}]  {}", t.reference, t.column, t.title))
            .collect::<Vec<_>>()
            .join("\n")
    };

    Ok(Output::new(json!({"tasks": tasks}), human))
}

/// Show a task with its comments and history.
pub fn task_show(repo_path: &Path, task_ref: &str) -> Result<Output> {
    let storage = Storage::open(repo_path)?;
    let task = storage.resolve_task(task_ref)?;
    let comments = storage.list_comments(&task.id)?;

    let mut human = format!("{}  [{}]  {}\n", task.reference, task.column, task.title);
    if let Some(description) = &task.description {
        human.push_str(&format!("  {}\n", description));
    }
    if let Some(session) = &task.session {
        human.push_str(&format!(
            "  session: {} ({})\n",
            session.tool, session.session_ref
        ));
    }
    if !comments.is_empty() {
        human.push_str("Comments:\n");
        for comment in &comments {
            human.push_str(&format!(
                "  [{}]: {}\n",
                comment.author_display(),
                comment.content
            ));
        }
    }

    Ok(Output::new(json!({"task": task, "comments": comments}), human))
}

/// Move a task to another column.
pub fn task_move(repo_path: &Path, task_ref: &str, column: &str, actor: &str) -> Result<Output> {
    let column = Column::parse(column)?;
    let mut storage = Storage::open(repo_path)?;
    let executor = TriggerExecutor::spawn_default();
    let task = Coordinator::new(&mut storage, &executor).move_task(task_ref, column, actor)?;
    executor.shutdown();

    Ok(Output::new(
        json!({"reference": task.reference, "column": task.column}),
        format!("Moved {} to {}", task.reference, task.column),
    ))
}

/// Block a task on a question for a human.
pub fn block(repo_path: &Path, task_ref: &str, question: &str, actor: &str) -> Result<Output> {
    let mut storage = Storage::open(repo_path)?;
    let executor = TriggerExecutor::spawn_default();
    let outcome = Coordinator::new(&mut storage, &executor).block(task_ref, question, actor)?;
    executor.shutdown();

    Ok(Output::new(
        json!({
            "reference": outcome.reference,
            "comment_id": outcome.comment_id,
            "column": outcome.column,
        }),
        format!(
            "Blocked {} awaiting input: \"{}\"",
            outcome.reference, question
        ),
    ))
}

/// Add a comment to a task (and evaluate the resume trigger).
pub fn comment(
    repo_path: &Path,
    task_ref: &str,
    content: &str,
    author_kind: &str,
    author_id: Option<String>,
) -> Result<Output> {
    let author_kind = AuthorKind::parse(author_kind)?;
    let mut storage = Storage::open(repo_path)?;
    let executor = TriggerExecutor::spawn_default();
    let outcome = Coordinator::new(&mut storage, &executor)
        .add_comment(task_ref, content, author_kind, author_id)?;
    executor.shutdown();

    let human = match &outcome.trigger {
        TriggerDecision::Fired { .. } => format!(
            "Added comment to {} (task resumed automatically)",
            outcome.reference
        ),
        TriggerDecision::Skipped { .. } => format!("Added comment to {}", outcome.reference),
    };

    Ok(Output::new(serde_json::to_value(&outcome)?, human))
}

/// Link an agent session to a task.
pub fn session_link(
    repo_path: &Path,
    task_ref: &str,
    tool: &str,
    session_ref: &str,
    working_dir: Option<PathBuf>,
    actor: &str,
) -> Result<Output> {
    let working_dir = working_dir.unwrap_or_else(|| repo_path.to_path_buf());
    let mut storage = Storage::open(repo_path)?;
    let executor = TriggerExecutor::spawn_default();
    let task = Coordinator::new(&mut storage, &executor).link_session(
        task_ref,
        tool,
        session_ref,
        working_dir,
        actor,
    )?;
    executor.shutdown();

    let session = task.session.as_ref().ok_or_else(|| {
        Error::Other("Session missing after link".to_string())
    })?;

    Ok(Output::new(
        json!({
            "reference": task.reference,
            "tool": session.tool,
            "session_ref": session.session_ref,
            "ref_kind": session.ref_kind,
        }),
        format!(
            "Linked {} session to {} ({})",
            session.tool, task.reference, session.session_ref
        ),
    ))
}

/// Show a task's linked session.
pub fn session_show(repo_path: &Path, task_ref: &str) -> Result<Output> {
    let storage = Storage::open(repo_path)?;
    let task = storage.resolve_task(task_ref)?;

    match &task.session {
        Some(session) => Ok(Output::new(
            json!({"reference": task.reference, "session": session}),
            format!(
                "{}: {} session {} (linked {})",
                task.reference,
                session.tool,
                session.session_ref,
                session.linked_at.format("%Y-%m-%d %H:%M UTC")
            ),
        )),
        None => Ok(Output::new(
            json!({"reference": task.reference, "session": null}),
            format!("{}: no linked session", task.reference),
        )),
    }
}

/// Explicitly resume a blocked task.
pub fn resume(repo_path: &Path, task_ref: &str, actor: &str) -> Result<Output> {
    let mut storage = Storage::open(repo_path)?;
    let executor = TriggerExecutor::spawn_default();
    let outcome = Coordinator::new(&mut storage, &executor).resume(task_ref, actor)?;
    executor.shutdown();

    let output = match &outcome {
        ResumeOutcome::Resumed { reference, column } => Output::new(
            serde_json::to_value(&outcome)?,
            format!("Resumed {} ({})", reference, column),
        ),
        ResumeOutcome::CommandPrinted { reference, command } => Output::new(
            serde_json::to_value(&outcome)?,
            format!(
                "Manual resume mode; run this to resume {}:\n{}",
                reference, command
            ),
        ),
    };

    Ok(output)
}

/// Resolve the board to use: explicit reference, configured default, or
/// the only board in the store.
fn resolve_board_or_default(storage: &Storage, board_ref: Option<&str>) -> Result<Board> {
    if let Some(reference) = board_ref {
        return storage.resolve_board(reference);
    }
    if let Some(id) = storage.get_config(DEFAULT_BOARD_KEY)? {
        if let Ok(board) = storage.get_board(&id) {
            return Ok(board);
        }
    }

    let mut boards = storage.list_boards()?;
    match boards.len() {
        0 => Err(Error::NotFound("No boards exist; run `cap system init`".to_string())),
        1 => Ok(boards.remove(0)),
        _ => Err(Error::Ambiguous(
            "Multiple boards exist; pass --board".to_string(),
        )),
    }
}
