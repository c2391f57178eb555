//! Integration tests for board management via the CLI.

use assert_cmd::Command;
use predicates::prelude::*;
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
}

#[test]
fn test_default_board_created_at_init() {
    let env = Env::new();
    env.init();
    env.cap()
        .args(["board", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\":\"default\""))
        .stdout(predicate::str::contains("\"resume_mode\":\"command\""));
}

#[test]
fn test_board_create_with_mode() {
    let env = Env::new();
    env.init();
    env.cap()
        .args(["board", "create", "experiments", "--resume-mode", "auto"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\":\"experiments\""))
        .stdout(predicate::str::contains("\"resume_mode\":\"auto\""));
}

#[test]
fn test_board_create_invalid_mode() {
    let env = Env::new();
    env.init();
    env.cap()
        .args(["board", "create", "bad", "--resume-mode", "hybrid"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid resume mode"));
}

#[test]
fn test_board_set_mode() {
    let env = Env::new();
    env.init();
    env.cap()
        .args(["board", "set-mode", "default", "auto"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"resume_mode\":\"auto\""));

    env.cap()
        .args(["-H", "board", "show", "default"])
        .assert()
        .success()
        .stdout(predicate::str::contains("resume mode auto"));
}

#[test]
fn test_board_show_unknown() {
    let env = Env::new();
    env.init();
    env.cap()
        .args(["board", "show", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Board not found"));
}

#[test]
fn test_task_on_named_board() {
    let env = Env::new();
    env.init();
    env.cap()
        .args(["board", "create", "side"])
        .assert()
        .success();
    env.cap()
        .args(["task", "create", "Side task", "--board", "side"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"board\":\"side\""));

    env.cap()
        .args(["task", "list", "--board", "side"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Side task"));

    env.cap()
        .args(["task", "list", "--board", "default"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Side task").not());
}
