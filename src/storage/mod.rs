//! Storage layer for Capstan data.
//!
//! Persistence lives in a per-repository SQLite database at
//! `<data-dir>/capstan/<repo-hash>/board.db`. SQLite serializes writes to a
//! single row, which is the single-writer-per-record assumption the
//! coordinator's atomicity and idempotency contracts rest on.
//!
//! Two operations need multi-field atomicity and are owned here:
//! [`Storage::apply_block`] (task transition + question comment, one
//! transaction) and [`Storage::apply_resume`] (conditional column update,
//! which doubles as the resume idempotency guard).

use crate::models::{Board, Column, Comment, Task};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Storage manager for a single repository.
pub struct Storage {
    /// Root directory for this repository's data
    pub root: PathBuf,
    /// SQLite connection
    conn: Connection,
}

impl Storage {
    /// Open existing storage for the given repository path.
    pub fn open(repo_path: &Path) -> Result<Self> {
        let data_dir = resolve_data_dir()?;
        Self::open_with_data_dir(repo_path, &data_dir)
    }

    /// Initialize storage for a new repository.
    pub fn init(repo_path: &Path) -> Result<Self> {
        let data_dir = resolve_data_dir()?;
        Self::init_with_data_dir(repo_path, &data_dir)
    }

    /// Check if storage exists for the given repository.
    pub fn exists(repo_path: &Path) -> Result<bool> {
        let data_dir = resolve_data_dir()?;
        Self::exists_with_data_dir(repo_path, &data_dir)
    }

    /// Open existing storage under an explicit data directory (DI for tests).
    pub fn open_with_data_dir(repo_path: &Path, data_dir: &Path) -> Result<Self> {
        let root = storage_dir_under(data_dir, repo_path)?;
        if !root.join("board.db").exists() {
            return Err(Error::NotInitialized);
        }

        let conn = Connection::open(root.join("board.db"))?;
        Self::init_schema(&conn)?;

        Ok(Self { root, conn })
    }

    /// Initialize storage under an explicit data directory (DI for tests).
    pub fn init_with_data_dir(repo_path: &Path, data_dir: &Path) -> Result<Self> {
        let root = storage_dir_under(data_dir, repo_path)?;
        fs::create_dir_all(&root)?;

        let conn = Connection::open(root.join("board.db"))?;
        Self::init_schema(&conn)?;

        Ok(Self { root, conn })
    }

    /// Check if storage exists under an explicit data directory.
    pub fn exists_with_data_dir(repo_path: &Path, data_dir: &Path) -> Result<bool> {
        let root = storage_dir_under(data_dir, repo_path)?;
        Ok(root.join("board.db").exists())
    }

    /// Initialize the SQLite schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS boards (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                resume_mode TEXT NOT NULL DEFAULT 'command',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                reference TEXT NOT NULL UNIQUE,
                board_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                priority INTEGER,
                status TEXT NOT NULL DEFAULT 'todo',
                session TEXT,
                history TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (board_id) REFERENCES boards(id)
            );

            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                content TEXT NOT NULL,
                author_kind TEXT NOT NULL,
                author_id TEXT,
                mentions TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_tasks_board ON tasks(board_id);
            CREATE INDEX IF NOT EXISTS idx_comments_task ON comments(task_id);

            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    // === Board Operations ===

    /// Create a new board.
    pub fn create_board(&mut self, board: &Board) -> Result<()> {
        self.conn.execute(
            "INSERT INTO boards (id, name, resume_mode, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                board.id,
                board.name,
                board.resume_mode.as_str(),
                board.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a board by ID.
    pub fn get_board(&self, id: &str) -> Result<Board> {
        self.conn
            .query_row(
                "SELECT id, name, resume_mode, created_at FROM boards WHERE id = ?1",
                [id],
                row_to_board,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Board not found: {}", id)))
    }

    /// Resolve a board reference (ID or name) to a board.
    pub fn resolve_board(&self, reference: &str) -> Result<Board> {
        let board = self
            .conn
            .query_row(
                "SELECT id, name, resume_mode, created_at FROM boards WHERE id = ?1 OR name = ?1",
                [reference],
                row_to_board,
            )
            .optional()?;

        board.ok_or_else(|| Error::NotFound(format!("Board not found: {}", reference)))
    }

    /// Update a board.
    pub fn update_board(&mut self, board: &Board) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE boards SET name = ?2, resume_mode = ?3 WHERE id = ?1",
            params![board.id, board.name, board.resume_mode.as_str()],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Board not found: {}", board.id)));
        }
        Ok(())
    }

    /// List all boards ordered by name.
    pub fn list_boards(&self) -> Result<Vec<Board>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, resume_mode, created_at FROM boards ORDER BY name")?;
        let boards: Vec<Board> = stmt
            .query_map([], row_to_board)?
            .collect::<std::result::Result<_, _>>()?;
        Ok(boards)
    }

    // === Task Operations ===

    /// Create a new task.
    pub fn create_task(&mut self, task: &Task) -> Result<()> {
        let session_json = match &task.session {
            Some(session) => Some(serde_json::to_string(session)?),
            None => None,
        };
        self.conn.execute(
            r#"
            INSERT INTO tasks
            (id, reference, board_id, title, description, priority, status,
             session, history, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                task.id,
                task.reference,
                task.board_id,
                task.title,
                task.description,
                task.priority,
                task.column.as_str(),
                session_json,
                serde_json::to_string(&task.history)?,
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a task by ID.
    pub fn get_task(&self, id: &str) -> Result<Task> {
        self.conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_TASK),
                [id],
                row_to_task,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Task not found: {}", id)))
    }

    /// Resolve a task reference to a task.
    ///
    /// Accepts a task UUID, a full display reference ("cap-a1b2"), or a
    /// unique prefix of one. Zero matches is `NotFound`; several is
    /// `Ambiguous`.
    pub fn resolve_task(&self, reference: &str) -> Result<Task> {
        // Exact ID or reference match first
        let exact = self
            .conn
            .query_row(
                &format!("{} WHERE id = ?1 OR reference = ?1", SELECT_TASK),
                [reference],
                row_to_task,
            )
            .optional()?;
        if let Some(task) = exact {
            return Ok(task);
        }

        // Prefix match on the display reference
        let pattern = format!("{}%", like_escape(reference));
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{} WHERE reference LIKE ?1 ESCAPE '\\' LIMIT 3",
                SELECT_TASK
            ))?;
        let matches: Vec<Task> = stmt
            .query_map([pattern], row_to_task)?
            .collect::<std::result::Result<_, _>>()?;

        match matches.len() {
            0 => Err(Error::NotFound(format!("Task not found: {}", reference))),
            1 => Ok(matches.into_iter().next().unwrap()),
            _ => Err(Error::Ambiguous(format!(
                "'{}' matches multiple tasks",
                reference
            ))),
        }
    }

    /// Update a task.
    pub fn update_task(&mut self, task: &Task) -> Result<()> {
        let session_json = match &task.session {
            Some(session) => Some(serde_json::to_string(session)?),
            None => None,
        };
        let changed = self.conn.execute(
            r#"
            UPDATE tasks SET
                reference = ?2, board_id = ?3, title = ?4, description = ?5,
                priority = ?6, status = ?7, session = ?8, history = ?9,
                created_at = ?10, updated_at = ?11
            WHERE id = ?1
            "#,
            params![
                task.id,
                task.reference,
                task.board_id,
                task.title,
                task.description,
                task.priority,
                task.column.as_str(),
                session_json,
                serde_json::to_string(&task.history)?,
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Task not found: {}", task.id)));
        }
        Ok(())
    }

    /// List tasks, optionally filtered by board and column.
    pub fn list_tasks(
        &self,
        board_id: Option<&str>,
        column: Option<Column>,
    ) -> Result<Vec<Task>> {
        let mut sql = format!("{} WHERE 1=1", SELECT_TASK);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(b) = board_id {
            sql.push_str(" AND board_id = ?");
            params_vec.push(Box::new(b.to_string()));
        }
        if let Some(c) = column {
            sql.push_str(" AND status = ?");
            params_vec.push(Box::new(c.as_str().to_string()));
        }
        sql.push_str(" ORDER BY priority IS NULL, priority ASC, created_at ASC");

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let tasks: Vec<Task> = stmt
            .query_map(params_refs.as_slice(), row_to_task)?
            .collect::<std::result::Result<_, _>>()?;
        Ok(tasks)
    }

    // === Comment Operations ===

    /// Create a new comment.
    pub fn create_comment(&mut self, comment: &Comment) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO comments
            (id, task_id, content, author_kind, author_id, mentions, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                comment.id,
                comment.task_id,
                comment.content,
                comment.author_kind.as_str(),
                comment.author_id,
                serde_json::to_string(&comment.mentions)?,
                comment.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a comment by ID.
    pub fn get_comment(&self, id: &str) -> Result<Comment> {
        self.conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COMMENT),
                [id],
                row_to_comment,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Comment not found: {}", id)))
    }

    /// List a task's comments in ascending creation order.
    pub fn list_comments(&self, task_id: &str) -> Result<Vec<Comment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE task_id = ?1 ORDER BY created_at ASC, rowid ASC",
            SELECT_COMMENT
        ))?;
        let comments: Vec<Comment> = stmt
            .query_map([task_id], row_to_comment)?
            .collect::<std::result::Result<_, _>>()?;
        Ok(comments)
    }

    // === Atomic Coordinator Writes ===

    /// Atomically persist a block: the task's transition to `need_input`
    /// (with its history entry already appended by the caller) plus the
    /// question comment. Both become visible together or not at all.
    pub fn apply_block(&mut self, task: &Task, comment: &Comment) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| Error::TransactionFailure(e.to_string()))?;

        let result: std::result::Result<(), rusqlite::Error> = (|| {
            tx.execute(
                "UPDATE tasks SET status = ?2, history = ?3, updated_at = ?4 WHERE id = ?1",
                params![
                    task.id,
                    task.column.as_str(),
                    serde_json::to_string(&task.history).map_err(json_to_sql_err)?,
                    task.updated_at.to_rfc3339(),
                ],
            )?;
            tx.execute(
                r#"
                INSERT INTO comments
                (id, task_id, content, author_kind, author_id, mentions, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    comment.id,
                    comment.task_id,
                    comment.content,
                    comment.author_kind.as_str(),
                    comment.author_id,
                    serde_json::to_string(&comment.mentions).map_err(json_to_sql_err)?,
                    comment.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })();

        match result {
            Ok(()) => tx
                .commit()
                .map_err(|e| Error::TransactionFailure(e.to_string())),
            // Dropping the transaction rolls it back
            Err(e) => Err(Error::TransactionFailure(e.to_string())),
        }
    }

    /// Conditionally transition a task out of `need_input`.
    ///
    /// The write only applies while the stored column is still
    /// `need_input` (compare-and-swap), which makes a lost race an
    /// observable no-op rather than a duplicate transition. Returns whether
    /// the update applied.
    pub fn apply_resume(&mut self, task: &Task) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE tasks SET status = ?2, history = ?3, updated_at = ?4
                 WHERE id = ?1 AND status = 'need_input'",
                params![
                    task.id,
                    task.column.as_str(),
                    serde_json::to_string(&task.history)?,
                    task.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| Error::TransactionFailure(e.to_string()))?;
        Ok(changed > 0)
    }

    // === Config Operations ===

    /// Get a configuration value.
    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT value FROM config WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a configuration value.
    pub fn set_config(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO config (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

const SELECT_TASK: &str = "SELECT id, reference, board_id, title, description, priority, \
     status, session, history, created_at, updated_at FROM tasks";

const SELECT_COMMENT: &str =
    "SELECT id, task_id, content, author_kind, author_id, mentions, created_at FROM comments";

fn json_to_sql_err(e: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(e))
}

fn row_to_board(row: &rusqlite::Row<'_>) -> rusqlite::Result<Board> {
    let resume_mode: String = row.get(2)?;
    let created_at: String = row.get(3)?;
    Ok(Board {
        id: row.get(0)?,
        name: row.get(1)?,
        resume_mode: serde_json::from_value(serde_json::Value::String(resume_mode))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e)))?,
        created_at: parse_timestamp(&created_at),
    })
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(6)?;
    let session: Option<String> = row.get(7)?;
    let history: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(Task {
        id: row.get(0)?,
        reference: row.get(1)?,
        board_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        priority: row.get(5)?,
        column: serde_json::from_value(serde_json::Value::String(status)).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?,
        session: match session {
            Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    7,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?),
            None => None,
        },
        history: serde_json::from_str(&history).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn row_to_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    let author_kind: String = row.get(3)?;
    let mentions: String = row.get(5)?;
    let created_at: String = row.get(6)?;

    Ok(Comment {
        id: row.get(0)?,
        task_id: row.get(1)?,
        content: row.get(2)?,
        author_kind: serde_json::from_value(serde_json::Value::String(author_kind)).map_err(
            |e| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            },
        )?,
        author_id: row.get(4)?,
        mentions: serde_json::from_str(&mentions).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: parse_timestamp(&created_at),
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Escape LIKE wildcards in a user-supplied prefix.
fn like_escape(s: &str) -> String {
    s.replace('\\', r"\\").replace('%', r"\%").replace('_', r"\_")
}

/// Get the storage directory for a repository.
///
/// Uses a hash of the repository path to create a unique directory under
/// `<data-dir>/capstan/`. The data dir comes from `CAP_DATA_DIR` when set,
/// otherwise the platform data directory.
pub fn get_storage_dir(repo_path: &Path) -> Result<PathBuf> {
    let data_dir = resolve_data_dir()?;
    storage_dir_under(&data_dir, repo_path)
}

fn resolve_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("CAP_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir().ok_or_else(|| Error::Other("Could not determine data directory".to_string()))
}

fn storage_dir_under(data_dir: &Path, repo_path: &Path) -> Result<PathBuf> {
    let repo_canonical = repo_path
        .canonicalize()
        .map_err(|e| Error::Other(format!("Could not canonicalize repo path: {}", e)))?;

    let mut hasher = Sha256::new();
    hasher.update(repo_canonical.to_string_lossy().as_bytes());
    let hash_hex = format!("{:x}", hasher.finalize());

    Ok(data_dir.join("capstan").join(&hash_hex[..12]))
}

/// Generate a display reference.
///
/// Format: `<prefix>-<4 hex chars>`, e.g. "cap-a1b2" for tasks.
pub fn generate_reference(prefix: &str, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(
        chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(0)
            .to_le_bytes(),
    );
    let hash_hex = format!("{:x}", hasher.finalize());
    format!("{}-{}", prefix, &hash_hex[..4])
}

/// Find the git repository root by walking up from a directory.
pub fn find_git_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthorKind, HistoryAction, HistoryEntry, ResumeMode, SYSTEM_ACTOR};
    use crate::test_utils::TestEnv;
    use crate::tools::AgentTool;

    fn make_board(storage: &mut Storage) -> Board {
        let board = Board::new(
            uuid::Uuid::new_v4().to_string(),
            "default".to_string(),
            ResumeMode::Command,
        );
        storage.create_board(&board).unwrap();
        board
    }

    fn make_task(storage: &mut Storage, board: &Board, title: &str) -> Task {
        let id = uuid::Uuid::new_v4().to_string();
        let reference = generate_reference("cap", &id);
        let task = Task::new(id, reference, board.id.clone(), title.to_string());
        storage.create_task(&task).unwrap();
        task
    }

    fn make_comment(task: &Task, content: &str) -> Comment {
        Comment {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task.id.clone(),
            content: content.to_string(),
            author_kind: AuthorKind::Human,
            author_id: None,
            mentions: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_init_and_open() {
        let env = TestEnv::new();
        assert!(!Storage::exists_with_data_dir(env.path(), env.data_path()).unwrap());
        env.init_storage();
        assert!(Storage::exists_with_data_dir(env.path(), env.data_path()).unwrap());
        env.open_storage();
    }

    #[test]
    fn test_open_uninitialized_fails() {
        let env = TestEnv::new();
        match Storage::open_with_data_dir(env.path(), env.data_path()) {
            Err(Error::NotInitialized) => {}
            other => panic!("expected NotInitialized, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_task_roundtrip() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let board = make_board(&mut storage);
        let mut task = make_task(&mut storage, &board, "Write docs");

        task.session = Some(crate::models::AgentSession::new(
            AgentTool::Claude,
            "abc-123".to_string(),
            env.path().to_path_buf(),
        ));
        task.priority = Some(1);
        storage.update_task(&task).unwrap();

        let loaded = storage.get_task(&task.id).unwrap();
        assert_eq!(loaded.title, "Write docs");
        assert_eq!(loaded.priority, Some(1));
        assert_eq!(loaded.session.unwrap().tool, AgentTool::Claude);
        assert_eq!(loaded.history.len(), 1);
    }

    #[test]
    fn test_resolve_task_by_reference_and_prefix() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let board = make_board(&mut storage);
        let task = make_task(&mut storage, &board, "One");

        assert_eq!(storage.resolve_task(&task.id).unwrap().id, task.id);
        assert_eq!(storage.resolve_task(&task.reference).unwrap().id, task.id);
        // Unique prefix works too
        let prefix = &task.reference[..task.reference.len() - 1];
        assert_eq!(storage.resolve_task(prefix).unwrap().id, task.id);
    }

    #[test]
    fn test_resolve_task_not_found_and_ambiguous() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let board = make_board(&mut storage);
        make_task(&mut storage, &board, "One");
        make_task(&mut storage, &board, "Two");

        match storage.resolve_task("cap-zzzz") {
            Err(Error::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other.map(|t| t.id)),
        }
        // "cap" prefixes every reference
        match storage.resolve_task("cap") {
            Err(Error::Ambiguous(_)) => {}
            other => panic!("expected Ambiguous, got {:?}", other.map(|t| t.id)),
        }
    }

    #[test]
    fn test_list_tasks_filters() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let board = make_board(&mut storage);
        let mut blocked = make_task(&mut storage, &board, "Blocked one");
        make_task(&mut storage, &board, "Other");

        blocked.column = Column::NeedInput;
        storage.update_task(&blocked).unwrap();

        let need_input = storage
            .list_tasks(Some(&board.id), Some(Column::NeedInput))
            .unwrap();
        assert_eq!(need_input.len(), 1);
        assert_eq!(need_input[0].id, blocked.id);

        let all = storage.list_tasks(Some(&board.id), None).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_comments_ordered_by_creation() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let board = make_board(&mut storage);
        let task = make_task(&mut storage, &board, "T");

        for i in 0..3 {
            let comment = make_comment(&task, &format!("comment {}", i));
            storage.create_comment(&comment).unwrap();
        }

        let comments = storage.list_comments(&task.id).unwrap();
        assert_eq!(comments.len(), 3);
        assert_eq!(comments[0].content, "comment 0");
        assert_eq!(comments[2].content, "comment 2");
    }

    #[test]
    fn test_apply_block_is_atomic() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let board = make_board(&mut storage);
        let mut task = make_task(&mut storage, &board, "T");

        let comment = make_comment(&task, "Which auth approach?");
        // Pre-insert the comment so the transaction's insert collides
        storage.create_comment(&comment).unwrap();

        task.column = Column::NeedInput;
        let result = storage.apply_block(&task, &comment);
        assert!(matches!(result, Err(Error::TransactionFailure(_))));

        // The task update rolled back with the failed comment insert
        let loaded = storage.get_task(&task.id).unwrap();
        assert_eq!(loaded.column, Column::Todo);
    }

    #[test]
    fn test_apply_resume_requires_need_input() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let board = make_board(&mut storage);
        let mut task = make_task(&mut storage, &board, "T");

        task.column = Column::InProgress;
        task.history.push(HistoryEntry::new(
            SYSTEM_ACTOR,
            HistoryAction::AutoResumed {
                from: Column::NeedInput,
                trigger_comment: "c-1".to_string(),
            },
        ));
        // Stored column is still todo, so the CAS must not apply
        assert!(!storage.apply_resume(&task).unwrap());
        assert_eq!(storage.get_task(&task.id).unwrap().column, Column::Todo);

        // Move it to need_input, then the CAS applies exactly once
        let mut blocked = storage.get_task(&task.id).unwrap();
        blocked.column = Column::NeedInput;
        storage.update_task(&blocked).unwrap();

        assert!(storage.apply_resume(&task).unwrap());
        assert_eq!(
            storage.get_task(&task.id).unwrap().column,
            Column::InProgress
        );
        assert!(!storage.apply_resume(&task).unwrap());
    }

    #[test]
    fn test_board_resolution_and_update() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let mut board = make_board(&mut storage);

        assert_eq!(storage.resolve_board("default").unwrap().id, board.id);
        assert_eq!(storage.resolve_board(&board.id).unwrap().id, board.id);

        board.resume_mode = ResumeMode::Auto;
        storage.update_board(&board).unwrap();
        assert_eq!(
            storage.resolve_board("default").unwrap().resume_mode,
            ResumeMode::Auto
        );

        match storage.resolve_board("missing") {
            Err(Error::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other.map(|b| b.id)),
        }
    }

    #[test]
    fn test_generate_reference_format() {
        let reference = generate_reference("cap", "seed");
        assert!(reference.starts_with("cap-"));
        assert_eq!(reference.len(), 8);
        assert!(reference[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_config_roundtrip() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        assert!(storage.get_config("missing").unwrap().is_none());
        storage.set_config("default_board", "b-1").unwrap();
        assert_eq!(
            storage.get_config("default_board").unwrap().as_deref(),
            Some("b-1")
        );
    }
}
