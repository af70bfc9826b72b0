//! CLI tests for the lp binary

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("logpipe.yml");
    fs::write(&path, body).expect("Failed to write config");
    path
}

fn lp() -> Command {
    Command::cargo_bin("lp").expect("Failed to find lp binary")
}

#[test]
fn test_help() {
    lp().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("emit"))
        .stdout(predicate::str::contains("threads"))
        .stdout(predicate::str::contains("bench"));
}

#[test]
fn test_emit_to_console() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "console:\n  color: false\n");
    lp().arg("--config")
        .arg(&config)
        .args(["emit", "hello from the cli", "--tag", "user=alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\tinfo\thello from the cli\tuser=alice"));
}

#[test]
fn test_emit_below_configured_level_is_dropped() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "level: warning\nconsole:\n  color: false\n");
    lp().arg("--config")
        .arg(&config)
        .args(["emit", "quiet", "--level", "debug"])
        .assert()
        .success()
        .stdout(predicate::str::contains("quiet").not());
}

#[test]
fn test_emit_to_jsonl_file() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("logs").join("out.jsonl");
    let body = format!(
        "console:\n  enabled: false\nfile:\n  path: {}\n  format: jsonl\ntags:\n  service: cli-test\n",
        log_path.display()
    );
    let config = write_config(&dir, &body);

    lp().arg("--config")
        .arg(&config)
        .args(["emit", "first", "second", "--level", "error"])
        .assert()
        .success();

    let content = fs::read_to_string(&log_path).unwrap();
    let records: Vec<serde_json::Value> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["message"], "first");
    assert_eq!(records[1]["message"], "second");
    assert_eq!(records[1]["level"], "error");
    assert_eq!(records[0]["service"], "cli-test");
}

#[test]
fn test_threads_delivers_everything() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "console:\n  enabled: false\n");
    lp().arg("--config")
        .arg(&config)
        .args(["threads", "--threads", "3", "--messages", "200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Delivered 600 of 600 records from 3 threads"));
}

#[test]
fn test_bench_reports_throughput() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "queue:\n  idle:\n    strategy: park\n");
    lp().arg("--config")
        .arg(&config)
        .args(["bench", "--messages", "500"])
        .assert()
        .success()
        .stdout(predicate::str::contains("500"))
        .stdout(predicate::str::contains("records/s"));
}

#[test]
fn test_missing_config_fails() {
    let dir = TempDir::new().unwrap();
    lp().arg("--config")
        .arg(dir.path().join("nope.yml"))
        .args(["emit", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_invalid_tag_rejected() {
    lp().args(["emit", "x", "--tag", "broken"]).assert().failure();
}
