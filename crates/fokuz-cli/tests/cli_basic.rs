//! Basic CLI E2E tests.
//!
//! Tests invoke the built `fokuz` binary against a throwaway data
//! directory and verify the JSON it prints.

use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_fokuz"))
        .args(args)
        .env("FOKUZ_DATA_DIR", dir)
        .env("FOKUZ_LOG", "off")
        .output()
        .expect("Failed to execute CLI command");

    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (code, stdout, stderr)
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let (code, stdout, stderr) = run_cli(dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("{args:?} printed non-JSON ({e}): {stdout}"))
}

#[test]
fn test_status_when_idle() {
    let dir = TempDir::new().unwrap();
    let status = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(status["is_active"], false);
    assert_eq!(status["formatted_time"], "00:00");
}

#[test]
fn test_start_pause_resume_reset() {
    let dir = TempDir::new().unwrap();

    let started = run_json(dir.path(), &["timer", "start"]);
    assert_eq!(started["type"], "TimerStarted");
    assert_eq!(started["method_name"], "Pomodoro");
    assert_eq!(started["duration_secs"], 1500);

    let status = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(status["phase"], "work");
    assert_eq!(status["is_running"], true);

    let paused = run_json(dir.path(), &["timer", "pause"]);
    assert_eq!(paused["type"], "TimerPaused");

    let resumed = run_json(dir.path(), &["timer", "toggle"]);
    assert_eq!(resumed["type"], "TimerResumed");

    let reset = run_json(dir.path(), &["timer", "reset"]);
    assert_eq!(reset["type"], "TimerTerminated");

    let history = run_json(dir.path(), &["history", "list", "--all"]);
    let records = history.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["is_completed"], false);
}

#[test]
fn test_second_start_fails() {
    let dir = TempDir::new().unwrap();
    run_json(dir.path(), &["timer", "start", "2"]);

    let (code, _, stderr) = run_cli(dir.path(), &["timer", "start"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"), "stderr: {stderr}");

    let status = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(status["method_name"], "Deep Work");
}

#[test]
fn test_unknown_method_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["timer", "start", "nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown method"));
}

#[test]
fn test_restart_requires_session() {
    let dir = TempDir::new().unwrap();
    let (code, _, _) = run_cli(dir.path(), &["timer", "restart"]);
    assert_eq!(code, 1);

    run_json(dir.path(), &["timer", "start"]);
    let restarted = run_json(dir.path(), &["timer", "restart"]);
    assert_eq!(restarted["type"], "TimerStarted");
}

#[test]
fn test_custom_method_lifecycle() {
    let dir = TempDir::new().unwrap();
    let added = run_json(
        dir.path(),
        &["methods", "add", "Sprint", "--work", "15", "--break", "3"],
    );
    let id = added["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("custom_"));

    let edited = run_json(dir.path(), &["methods", "edit", &id, "--work", "20"]);
    assert_eq!(edited["work_duration_minutes"], 20);
    assert_eq!(edited["break_duration_minutes"], 3);

    let listed = run_json(dir.path(), &["methods", "list"]);
    assert_eq!(listed.as_array().unwrap().len(), 4);

    let started = run_json(dir.path(), &["timer", "start", &id]);
    assert_eq!(started["duration_secs"], 1200);

    let (code, _, _) = run_cli(dir.path(), &["methods", "remove", "1"]);
    assert_eq!(code, 1);
    run_json(dir.path(), &["methods", "remove", &id]);
}

#[test]
fn test_history_summary_and_clear() {
    let dir = TempDir::new().unwrap();
    run_json(dir.path(), &["timer", "start"]);
    run_json(dir.path(), &["timer", "reset"]);

    let summary = run_json(dir.path(), &["history", "summary"]);
    assert_eq!(summary["total_sessions"], 1);
    assert_eq!(summary["today_sessions"], 1);

    let stats = run_json(dir.path(), &["history", "stats"]);
    assert_eq!(stats.as_array().unwrap().len(), 1);
    assert_eq!(stats[0]["total_sessions"], 1);

    let (code, _, _) = run_cli(dir.path(), &["history", "clear"]);
    assert_eq!(code, 1);
    run_json(dir.path(), &["history", "clear", "--yes"]);
    let summary = run_json(dir.path(), &["history", "summary"]);
    assert_eq!(summary["total_sessions"], 0);
}

#[test]
fn test_config_get_set() {
    let dir = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "timer.tick_interval_ms"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "1000");

    let (code, _, _) = run_cli(dir.path(), &["config", "set", "history.recent_days", "14"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(dir.path(), &["config", "get", "history.recent_days"]);
    assert_eq!(stdout.trim(), "14");

    let (code, _, _) = run_cli(dir.path(), &["config", "set", "history.recent_days", "soon"]);
    assert_eq!(code, 1);
    let (code, _, _) = run_cli(dir.path(), &["config", "get", "no.such.key"]);
    assert_eq!(code, 1);

    let config = run_json(dir.path(), &["config", "list"]);
    assert_eq!(config["water_reminder"]["min_minutes"], 2);
}

#[test]
fn test_watch_without_session() {
    let dir = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["timer", "watch"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("no active session"));
}
