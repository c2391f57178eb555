//! CLI argument definitions for Capstan.

use clap::{Parser, Subcommand};

/// Version string including build metadata from build.rs.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("CAP_GIT_COMMIT"),
    ", built ",
    env!("CAP_BUILD_TIMESTAMP"),
    ")"
);

/// Capstan - a kanban tracker for humans and AI coding agents.
///
/// Agents block tasks on questions with `cap block`; humans answer with
/// `cap comment`, and on auto-mode boards the agent session resumes by
/// itself.
#[derive(Parser, Debug)]
#[command(name = "cap")]
#[command(author, version, long_version = LONG_VERSION)]
#[command(about = "A kanban tracker that lets AI agents block on human input and resume")]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Run as if cap was started in <path> instead of the current directory.
    /// Bypasses git root detection - uses the path literally.
    #[arg(short = 'C', long = "repo", global = true, env = "CAP_REPO")]
    pub repo_path: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Board management commands
    Board {
        #[command(subcommand)]
        command: BoardCommands,
    },

    /// Task management commands
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Block a task on a question for a human
    Block {
        /// Task reference (ID or cap-xxxx)
        task: String,

        /// The question the agent needs answered
        question: String,

        /// Acting agent identity
        #[arg(long, default_value = "agent")]
        actor: String,
    },

    /// Add a comment to a task
    ///
    /// A human comment mentioning @agent on a blocked task of an auto-mode
    /// board resumes the linked agent session.
    Comment {
        /// Task reference (ID or cap-xxxx)
        task: String,

        /// Comment content
        content: String,

        /// Author kind: human or agent
        #[arg(long, default_value = "human")]
        author: String,

        /// Author identifier (e.g. a username)
        #[arg(long = "as")]
        author_id: Option<String>,
    },

    /// Agent session commands
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Resume a blocked task explicitly
    ///
    /// On manual-mode boards this prints the resume command instead of
    /// running it.
    Resume {
        /// Task reference (ID or cap-xxxx)
        task: String,

        /// Acting identity recorded in history
        #[arg(long, default_value = "human")]
        actor: String,
    },

    /// System administration commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

/// Board subcommands
#[derive(Subcommand, Debug)]
pub enum BoardCommands {
    /// Create a new board
    Create {
        /// Board name
        name: String,

        /// Resume mode: manual, command, or auto
        #[arg(short = 'm', long)]
        resume_mode: Option<String>,
    },

    /// List all boards
    List,

    /// Show a board
    Show {
        /// Board reference (ID or name)
        board: String,
    },

    /// Set a board's resume mode
    SetMode {
        /// Board reference (ID or name)
        board: String,

        /// Resume mode: manual, command, or auto
        mode: String,
    },
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a new task
    Create {
        /// Task title
        title: String,

        /// Board to create the task on (defaults to the default board)
        #[arg(short, long)]
        board: Option<String>,

        /// Priority (0-4, lower is higher priority)
        #[arg(short, long)]
        priority: Option<u8>,

        /// Detailed description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List tasks
    List {
        /// Filter by board (ID or name)
        #[arg(short, long)]
        board: Option<String>,

        /// Filter by column (todo, in_progress, need_input, done)
        #[arg(short, long)]
        column: Option<String>,
    },

    /// Show a task with comments and history
    Show {
        /// Task reference (ID or cap-xxxx)
        task: String,
    },

    /// Move a task to another column
    Move {
        /// Task reference (ID or cap-xxxx)
        task: String,

        /// Target column (todo, in_progress, done)
        column: String,

        /// Acting identity recorded in history
        #[arg(long, default_value = "human")]
        actor: String,
    },
}

/// Session subcommands
#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Link an external agent session to a task
    Link {
        /// Task reference (ID or cap-xxxx)
        task: String,

        /// Tool name: claude, codex, or opencode
        #[arg(short, long)]
        tool: String,

        /// Session reference (UUID or rollout path, per tool)
        #[arg(short, long)]
        session_ref: String,

        /// Working directory for the resumed session (defaults to repo)
        #[arg(short, long)]
        dir: Option<std::path::PathBuf>,

        /// Acting identity recorded in history
        #[arg(long, default_value = "agent")]
        actor: String,
    },

    /// Show a task's linked session
    Show {
        /// Task reference (ID or cap-xxxx)
        task: String,
    },
}

/// System subcommands
#[derive(Subcommand, Debug)]
pub enum SystemCommands {
    /// Initialize capstan for this repository
    Init,
}
