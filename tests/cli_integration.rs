//! Integration tests for the Overseer CLI

use assert_cmd::cargo;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PRD: &str = "# Todo App\n\nA React todo app.\n\n1. Users can add todos\n2. Users can delete todos\n- Todos must persist\n";

/// Get a Command for the overseer binary
fn overseer() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("overseer"));
    cmd.env("NO_COLOR", "1");
    cmd
}

fn project_with_prd() -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("PRD.md"), PRD).unwrap();
    temp
}

#[test]
fn test_help() {
    overseer()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Real-time supervision"));
}

#[test]
fn test_version() {
    overseer()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_classify_json() {
    overseer()
        .args(["classify", "--json", "npm error: command not found"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"category\": \"error\""))
        .stdout(predicate::str::contains("command_not_found"))
        .stdout(predicate::str::contains("\"interventionRequired\": true"));
}

#[test]
fn test_classify_human_output() {
    overseer()
        .args(["classify", "Could you please clarify the requirements?", "Starting session..."])
        .assert()
        .success()
        .stdout(predicate::str::contains("[confusion]"))
        .stdout(predicate::str::contains("no issues"));
}

#[test]
fn test_context_is_read_only() {
    let temp = project_with_prd();

    overseer()
        .arg("--project")
        .arg(temp.path())
        .args(["context", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"requirementCount\": 3"))
        .stdout(predicate::str::contains("react"))
        .stdout(predicate::str::contains("\"has_requirements\": true"))
        .stdout(predicate::str::contains("\"always_review_deletions\": false"));

    assert!(!temp.path().join("CLAUDE.md").exists());
}

#[test]
fn test_context_lists_conditions() {
    let temp = project_with_prd();

    overseer()
        .arg("--project")
        .arg(temp.path())
        .arg("context")
        .assert()
        .success()
        .stdout(predicate::str::contains("Conditions:"))
        .stdout(predicate::str::contains("dependency_install_safe"));
}

#[test]
fn test_init_writes_instructions_once() {
    let temp = project_with_prd();

    overseer()
        .arg("--project")
        .arg(temp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    let content = std::fs::read_to_string(temp.path().join("CLAUDE.md")).unwrap();
    assert!(content.contains("Users can add todos"));

    overseer()
        .arg("--project")
        .arg(temp.path())
        .arg("init")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("already exists"));

    overseer()
        .arg("--project")
        .arg(temp.path())
        .args(["init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_decide_auto_and_escalate() {
    let temp = project_with_prd();

    overseer()
        .arg("--project")
        .arg(temp.path())
        .args(["decide", "Should I proceed with the implementation?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("AUTO"));

    overseer()
        .arg("--project")
        .arg(temp.path())
        .args(["decide", "--mode", "permissive", "May I delete the database?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ESCALATE"))
        .stdout(predicate::str::contains("deletion"));
}

#[test]
fn test_supervise_observe_emits_json_events() {
    let temp = project_with_prd();

    overseer()
        .arg("--project")
        .arg(temp.path())
        .args(["supervise", "--observe"])
        .write_stdin("Working on it\nShould I proceed?\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"event\":\"supervisionStarted\""))
        .stdout(predicate::str::contains("\"event\":\"responseReady\""))
        .stdout(predicate::str::contains("\"event\":\"supervisionComplete\""));

    assert!(temp.path().join("CLAUDE.md").exists());
}

#[cfg(unix)]
#[test]
fn test_supervise_observe_exits_on_interrupt_with_stdin_open() {
    use std::io::{BufRead, BufReader};
    use std::process::{Command as StdCommand, Stdio};
    use std::time::{Duration, Instant};

    let temp = project_with_prd();
    let mut child = StdCommand::new(cargo::cargo_bin!("overseer"))
        .env("NO_COLOR", "1")
        .arg("--project")
        .arg(temp.path())
        .args(["supervise", "--observe"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let _stdin = child.stdin.take().unwrap();

    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let mut first = String::new();
    stdout.read_line(&mut first).unwrap();
    assert!(first.contains("supervisionStarted"));
    std::thread::sleep(Duration::from_millis(500));

    let sent = StdCommand::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(sent.success());

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("overseer did not exit after SIGINT");
        }
        std::thread::sleep(Duration::from_millis(50));
    };
    assert!(status.success());
}

#[test]
fn test_supervise_missing_binary_is_setup_failure() {
    let temp = project_with_prd();
    std::fs::create_dir_all(temp.path().join(".claude")).unwrap();
    std::fs::write(
        temp.path().join(".claude/supervision.json"),
        r#"{"claudeBinary": "overseer-definitely-not-installed-binary"}"#,
    )
    .unwrap();

    overseer()
        .arg("--project")
        .arg(temp.path())
        .arg("supervise")
        .assert()
        .code(6)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_invalid_config_exit_code() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join(".claude")).unwrap();
    std::fs::write(
        temp.path().join(".claude/supervision.json"),
        r#"{"bufferCapacity": 0}"#,
    )
    .unwrap();

    overseer()
        .arg("--project")
        .arg(temp.path())
        .args(["classify", "hello"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("bufferCapacity"));
}

#[test]
fn test_unknown_mode_is_rejected() {
    overseer()
        .args(["decide", "--mode", "yolo", "Should I proceed?"])
        .assert()
        .failure();
}
