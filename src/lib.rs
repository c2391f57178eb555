//! Capstan - A kanban tracker for mixed human and AI-agent teams.
//!
//! This library provides the core functionality for the `cap` CLI tool,
//! centered on the block/resume coordination engine: an agent working a
//! task can block on a question for a human, and the task resumes
//! automatically once a qualifying reply arrives.

pub mod cli;
pub mod commands;
pub mod coordinator;
pub mod executor;
pub mod mentions;
pub mod models;
pub mod prompt;
pub mod storage;
pub mod tools;


/// Library-level error type for Capstan operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Not initialized: run `cap system init` first")]
    NotInitialized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ambiguous reference: {0}")]
    Ambiguous(String),

    #[error("Invalid transition: task is already {column}")]
    InvalidTransition { column: crate::models::Column },

    #[error("Content must not be empty")]
    EmptyContent,

    #[error("Unsupported tool: {0}")]
    UnsupportedTool(String),

    #[error("Transaction failed: {0}")]
    TransactionFailure(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Capstan operations.
pub type Result<T> = std::result::Result<T, Error>;
