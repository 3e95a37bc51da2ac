//! CLI tests for the sleep-timer binary.
//!
//! These tests run the compiled binary without a daemon.

use assert_cmd::Command;
use predicates::prelude::*;

fn sleep_timer() -> Command {
    Command::cargo_bin("sleep-timer").unwrap()
}

#[test]
fn test_help_lists_commands() {
    sleep_timer()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("daemon"))
        .stdout(predicate::str::contains("press"))
        .stdout(predicate::str::contains("watch"));
}

#[test]
fn test_no_args_prints_help() {
    sleep_timer()
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_version() {
    sleep_timer()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_completions_bash() {
    sleep_timer()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sleep-timer"));
}

#[test]
fn test_duration_out_of_range_is_rejected() {
    sleep_timer().args(["duration", "0"]).assert().failure();
    sleep_timer().args(["duration", "1000"]).assert().failure();
}

#[test]
fn test_press_requires_key() {
    sleep_timer().arg("press").assert().failure();
}

#[test]
fn test_unknown_command_fails() {
    sleep_timer().arg("start").assert().failure();
}

#[test]
fn test_status_without_daemon_fails() {
    let dir = tempfile::tempdir().unwrap();
    sleep_timer()
        .arg("--socket")
        .arg(dir.path().join("missing.sock"))
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("エラー"))
        .stderr(predicate::str::contains("sleep-timer daemon"));
}

#[test]
fn test_daemon_with_missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    sleep_timer()
        .arg("--socket")
        .arg(dir.path().join("daemon.sock"))
        .args(["daemon", "--config"])
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("見つかりません"));
}
