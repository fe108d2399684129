//! CLI argument and setup error tests for diagmon.
//!
//! None of these reach the point where samplers are spawned.

use assert_cmd::Command;
use predicates::prelude::*;

fn diagmon() -> Command {
    let mut cmd = Command::cargo_bin("diagmon").expect("diagmon binary should exist");
    cmd.env_remove("RUST_LOG")
        .env_remove("DIAGMON_LOG")
        .env_remove("DIAGMON_CONFIG")
        .env_remove("DIAGMON_OUTPUT_DIR")
        .env_remove("DIAGMON_POLL_TIMEOUT_MS")
        .env_remove("DIAGMON_STOP_GRACE_MS");
    cmd
}

#[test]
fn help_lists_source_flags() {
    diagmon()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--include-network"))
        .stdout(predicate::str::contains("--pid"))
        .stdout(predicate::str::contains("--nvidia-gpu"));
}

#[test]
fn unknown_flag_fails() {
    diagmon()
        .arg("--nonexistent-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn invalid_log_format_fails() {
    diagmon()
        .args(["--log-format", "xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown log format"));
}

#[test]
fn invalid_pid_fails() {
    diagmon()
        .args(["--pid", "not-a-pid"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn config_with_unknown_key_is_an_args_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("diagmon.toml");
    std::fs::write(&config, "poll_timeout_ms = 250\nsurprise = true\n").unwrap();

    diagmon()
        .arg("--config")
        .arg(&config)
        .arg("--output-dir")
        .arg(dir.path().join("run"))
        .assert()
        .code(10)
        .stderr(predicate::str::contains("invalid configuration"));
    assert!(!dir.path().join("run").exists());
}

#[test]
fn missing_config_file_is_an_args_error() {
    let dir = tempfile::tempdir().unwrap();
    diagmon()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .assert()
        .code(10);
}

#[test]
fn zero_poll_timeout_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    diagmon()
        .args(["--poll-timeout-ms", "0", "--output-dir"])
        .arg(dir.path().join("run"))
        .assert()
        .code(10)
        .stderr(predicate::str::contains("poll_timeout_ms"));
}

#[test]
fn existing_output_dir_is_a_session_error() {
    let dir = tempfile::tempdir().unwrap();
    diagmon()
        .arg("--output-dir")
        .arg(dir.path())
        .assert()
        .code(15)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn jsonl_logs_are_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let output = diagmon()
        .args(["--log-format", "jsonl", "--output-dir"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(15));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr.lines().find(|l| !l.trim().is_empty()).unwrap();
    let value: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(value["level"], "ERROR");
}
