//! Capstan CLI - a kanban tracker for humans and AI coding agents.

use capstan::cli::{BoardCommands, Cli, Commands, SessionCommands, SystemCommands, TaskCommands};
use capstan::commands;
use capstan::storage::find_git_root;
use clap::Parser;
use std::env;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let human = cli.human_readable;

    // Repo path: --repo flag > CAP_REPO env > git root detection > cwd
    let repo_path = resolve_repo_path(cli.repo_path, human);

    if let Err(e) = run_command(cli.command, &repo_path, human) {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({"error": e.to_string()}));
        }
        process::exit(1);
    }
}

/// Resolve the repository path based on explicit flag, environment
/// variable, or auto-detection.
///
/// When an explicit path is provided (via -C/--repo or CAP_REPO), it is
/// used literally without git root detection. Otherwise the git root of
/// the current directory is used so storage is consistent regardless of
/// which subdirectory the user runs from.
fn resolve_repo_path(explicit_path: Option<PathBuf>, human: bool) -> PathBuf {
    match explicit_path {
        Some(path) => {
            if !path.exists() {
                if human {
                    eprintln!("Error: Specified repo path does not exist: {}", path.display());
                } else {
                    eprintln!(
                        "{}",
                        serde_json::json!({
                            "error": format!("Specified repo path does not exist: {}", path.display())
                        })
                    );
                }
                process::exit(1);
            }
            path
        }
        None => {
            let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            find_git_root(&cwd).unwrap_or(cwd)
        }
    }
}

fn run_command(command: Commands, repo_path: &Path, human: bool) -> Result<(), capstan::Error> {
    let output = match command {
        Commands::System { command } => match command {
            SystemCommands::Init => commands::system_init(repo_path)?,
        },

        Commands::Board { command } => match command {
            BoardCommands::Create { name, resume_mode } => {
                commands::board_create(repo_path, &name, resume_mode.as_deref())?
            }
            BoardCommands::List => commands::board_list(repo_path)?,
            BoardCommands::Show { board } => commands::board_show(repo_path, &board)?,
            BoardCommands::SetMode { board, mode } => {
                commands::board_set_mode(repo_path, &board, &mode)?
            }
        },

        Commands::Task { command } => match command {
            TaskCommands::Create {
                title,
                board,
                priority,
                description,
            } => commands::task_create(repo_path, &title, board.as_deref(), priority, description)?,
            TaskCommands::List { board, column } => {
                commands::task_list(repo_path, board.as_deref(), column.as_deref())?
            }
            TaskCommands::Show { task } => commands::task_show(repo_path, &task)?,
            TaskCommands::Move {
                task,
                column,
                actor,
            } => commands::task_move(repo_path, &task, &column, &actor)?,
        },

        Commands::Block {
            task,
            question,
            actor,
        } => commands::block(repo_path, &task, &question, &actor)?,

        Commands::Comment {
            task,
            content,
            author,
            author_id,
        } => commands::comment(repo_path, &task, &content, &author, author_id)?,

        Commands::Session { command } => match command {
            SessionCommands::Link {
                task,
                tool,
                session_ref,
                dir,
                actor,
            } => commands::session_link(repo_path, &task, &tool, &session_ref, dir, &actor)?,
            SessionCommands::Show { task } => commands::session_show(repo_path, &task)?,
        },

        Commands::Resume { task, actor } => commands::resume(repo_path, &task, &actor)?,
    };

    output.print(human);
    Ok(())
}
