//! Integration tests for the block/resume flow via the CLI.
//!
//! Covers the end-to-end scenarios: blocking a task records the question
//! atomically, a qualifying `@agent` comment on an auto-mode board resumes
//! the task, non-qualifying comments do not, and manual mode prints the
//! resume command instead of running it.

use assert_cmd::Command;
use predicates::prelude::*;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct Env {
    repo: TempDir,
    data: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            repo: TempDir::new().unwrap(),
            data: TempDir::new().unwrap(),
        }
    }

    fn cap(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_cap"));
        cmd.current_dir(self.repo.path());
        cmd.env("CAP_DATA_DIR", self.data.path());
        cmd
    }

    fn init(&self) {
        self.cap().args(["system", "init"]).assert().success();
    }

    fn set_mode(&self, mode: &str) {
        self.cap()
            .args(["board", "set-mode", "default", mode])
            .assert()
            .success();
    }

    fn create_task(&self, title: &str) -> String {
        let output = self
            .cap()
            .args(["task", "create", title])
            .output()
            .unwrap();
        assert!(output.status.success());
        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        json["reference"].as_str().unwrap().to_string()
    }

    fn block(&self, task: &str, question: &str) {
        self.cap()
            .args(["block", task, question, "--actor", "agent-claude"])
            .assert()
            .success();
    }

    fn link_session(&self, task: &str, session_ref: &str) {
        self.cap()
            .args([
                "session",
                "link",
                task,
                "--tool",
                "claude",
                "--session-ref",
                session_ref,
            ])
            .assert()
            .success();
    }

    fn column_of(&self, task: &str) -> String {
        let output = self.cap().args(["task", "show", task]).output().unwrap();
        assert!(output.status.success());
        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        json["task"]["column"].as_str().unwrap().to_string()
    }
}

#[test]
fn test_block_moves_task_and_stores_question() {
    let env = Env::new();
    env.init();
    let task = env.create_task("Add login");

    env.cap()
        .args(["block", &task, "Which auth approach?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"column\":\"need_input\""));

    env.cap()
        .args(["task", "show", &task])
        .assert()
        .success()
        .stdout(predicate::str::contains("Which auth approach?"))
        .stdout(predicate::str::contains("\"action\":\"blocked\""));
}

#[test]
fn test_block_twice_fails_without_second_comment() {
    let env = Env::new();
    env.init();
    let task = env.create_task("T");
    env.block(&task, "first?");

    env.cap()
        .args(["block", &task, "second?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("need_input"));

    // Still exactly one comment
    let output = env.cap().args(["task", "show", &task]).output().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["comments"].as_array().unwrap().len(), 1);
}

#[test]
fn test_block_empty_question_rejected() {
    let env = Env::new();
    env.init();
    let task = env.create_task("T");
    env.cap()
        .args(["block", &task, "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not be empty"));
}

#[test]
fn test_auto_mode_comment_resumes_task() {
    let env = Env::new();
    env.init();
    env.set_mode("auto");
    let task = env.create_task("Add login");
    env.block(&task, "Which auth approach?");
    env.link_session(&task, "sess-uuid-1");

    env.cap()
        .args(["comment", &task, "@agent use JWT", "--as", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"trigger\":\"fired\""));

    assert_eq!(env.column_of(&task), "in_progress");
    env.cap()
        .args(["task", "show", &task])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"action\":\"auto_resumed\""));
}

#[test]
fn test_auto_mode_launches_resume_command() {
    let env = Env::new();
    env.init();
    env.set_mode("auto");
    let task = env.create_task("Add login");
    env.block(&task, "Which auth approach?");
    env.link_session(&task, "sess-uuid-1");

    // Stub `claude` on PATH that records its argv
    let bin_dir = env.repo.path().join("bin");
    std::fs::create_dir_all(&bin_dir).unwrap();
    let capture = env.repo.path().join("launched.txt");
    let stub = bin_dir.join("claude");
    std::fs::write(
        &stub,
        format!("#!/bin/sh\necho \"$@\" > {}\n", capture.display()),
    )
    .unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    let path = format!(
        "{}:{}",
        bin_dir.display(),
        std::env::var("PATH").unwrap_or_default()
    );

    env.cap()
        .env("PATH", path)
        .args(["comment", &task, "@agent use JWT"])
        .assert()
        .success();

    // The launch is detached; poll briefly for the stub to have run
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut argv = String::new();
    while Instant::now() < deadline {
        argv = std::fs::read_to_string(&capture).unwrap_or_default();
        if argv.contains("--resume") {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(argv.contains("--resume sess-uuid-1"));
    assert!(argv.contains("Which auth approach?"));
    assert!(argv.contains("use JWT"));
}

#[test]
fn test_manual_mode_comment_does_not_resume() {
    let env = Env::new();
    env.init();
    env.set_mode("manual");
    let task = env.create_task("T");
    env.block(&task, "q?");
    env.link_session(&task, "sess-1");

    env.cap()
        .args(["comment", &task, "@agent go ahead"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"reason\":\"mode_not_auto\""));

    assert_eq!(env.column_of(&task), "need_input");
}

#[test]
fn test_agent_comment_does_not_resume() {
    let env = Env::new();
    env.init();
    env.set_mode("auto");
    let task = env.create_task("T");
    env.block(&task, "q?");
    env.link_session(&task, "sess-1");

    env.cap()
        .args(["comment", &task, "@agent thanks", "--author", "agent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"reason\":\"agent_author\""));

    assert_eq!(env.column_of(&task), "need_input");
}

#[test]
fn test_comment_without_session_does_not_resume() {
    let env = Env::new();
    env.init();
    env.set_mode("auto");
    let task = env.create_task("T");
    env.block(&task, "q?");

    env.cap()
        .args(["comment", &task, "@agent go"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"reason\":\"no_linked_session\""));

    assert_eq!(env.column_of(&task), "need_input");
}

#[test]
fn test_empty_comment_rejected() {
    let env = Env::new();
    env.init();
    let task = env.create_task("T");
    env.cap()
        .args(["comment", &task, "  "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not be empty"));
}

#[test]
fn test_explicit_resume_in_command_mode() {
    let env = Env::new();
    env.init();
    let task = env.create_task("T");
    env.block(&task, "q?");
    env.link_session(&task, "sess-1");

    env.cap()
        .args(["resume", &task, "--actor", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"outcome\":\"resumed\""));

    assert_eq!(env.column_of(&task), "in_progress");
}

#[test]
fn test_explicit_resume_in_manual_mode_prints_command() {
    let env = Env::new();
    env.init();
    env.set_mode("manual");
    let task = env.create_task("T");
    env.block(&task, "q?");
    env.link_session(&task, "sess-1");

    env.cap()
        .args(["-H", "resume", &task])
        .assert()
        .success()
        .stdout(predicate::str::contains("claude --resume sess-1"));

    // No state change in manual mode
    assert_eq!(env.column_of(&task), "need_input");
}

#[test]
fn test_resume_without_session_fails() {
    let env = Env::new();
    env.init();
    let task = env.create_task("T");
    env.block(&task, "q?");

    env.cap()
        .args(["resume", &task])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no linked session"));
}

#[test]
fn test_session_link_unknown_tool() {
    let env = Env::new();
    env.init();
    let task = env.create_task("T");

    env.cap()
        .args([
            "session",
            "link",
            &task,
            "--tool",
            "cursor",
            "--session-ref",
            "x",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported tool: cursor"));
}

#[test]
fn test_session_link_and_show() {
    let env = Env::new();
    env.init();
    let task = env.create_task("T");
    env.link_session(&task, "sess-abc");

    env.cap()
        .args(["session", "show", &task])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"session_ref\":\"sess-abc\""))
        .stdout(predicate::str::contains("\"ref_kind\":\"session_id\""));
}
