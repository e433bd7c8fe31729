//! Smoke tests for the sondeo CLI
//!
//! Runs the real binary against the replica engine so no browser or
//! network is needed.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the sondeo binary with a clean environment
fn sondeo() -> Command {
    let mut cmd = Command::cargo_bin("sondeo").expect("sondeo binary should exist");
    cmd.env_remove("SONDEO_ENGINE")
        .env_remove("SONDEO_BASE_URL")
        .env_remove("SONDEO_HEADLESS")
        .env_remove("RUST_LOG");
    cmd
}

/// Fast replica run: no slow motion, short timeouts
fn replica_run(dir: &TempDir) -> Command {
    let mut cmd = sondeo();
    cmd.current_dir(dir.path()).args([
        "test",
        "--engine",
        "mock",
        "--headless",
        "--slow-mo",
        "0",
        "--timeout",
        "500",
        "--color",
        "never",
    ]);
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    sondeo()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.3.0"));
}

#[test]
fn test_help_flag() {
    sondeo()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("test"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_no_args_fails() {
    sondeo().assert().failure();
}

#[test]
fn test_test_subcommand_help() {
    sondeo()
        .args(["test", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--engine"))
        .stdout(predicate::str::contains("--slow-mo"))
        .stdout(predicate::str::contains("--fail-fast"));
}

// ============================================================================
// List
// ============================================================================

#[test]
fn test_list_all() {
    sondeo()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("landing > "))
        .stdout(predicate::str::contains("password toggle > "));
}

#[test]
fn test_list_regex_filter() {
    let output = sondeo().args(["list", "re:^submission"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!stdout.is_empty());
    assert!(stdout.lines().all(|l| l.starts_with("submission > ")));
}

#[test]
fn test_unknown_suite_exits_2() {
    sondeo()
        .args(["list", "--suite", "checkout"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown suite"));
}

// ============================================================================
// Test runs on the replica engine
// ============================================================================

#[test]
fn test_replica_suite_passes() {
    let dir = TempDir::new().unwrap();
    replica_run(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS landing > "))
        .stdout(predicate::str::contains("0 failed"));
}

#[test]
fn test_json_report() {
    let dir = TempDir::new().unwrap();
    let output = replica_run(&dir)
        .args(["toggle", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["suite_name"], "signin");
    assert_eq!(report["engine"], "mock");
    let results = report["results"].as_array().unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r["status"] == "passed"));
}

#[test]
fn test_junit_report_file() {
    let dir = TempDir::new().unwrap();
    replica_run(&dir)
        .args(["landing", "--format", "junit", "-o", "reports/junit.xml"])
        .assert()
        .success();
    let xml = fs::read_to_string(dir.path().join("reports/junit.xml")).unwrap();
    assert!(xml.contains("<testsuite name=\"signin\""));
    assert!(xml.contains("failures=\"0\""));
}

#[test]
fn test_unmatched_filter_runs_nothing() {
    let dir = TempDir::new().unwrap();
    replica_run(&dir)
        .arg("no-such-test")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 passed, 0 failed, 0 skipped"));
}

#[test]
fn test_bad_regex_exits_2() {
    let dir = TempDir::new().unwrap();
    replica_run(&dir).arg("re:(").assert().code(2);
}

#[test]
fn test_failing_run_exits_1() {
    let dir = TempDir::new().unwrap();
    // The replica has no such page, so every landing check fails
    fs::write(dir.path().join("sondeo.yaml"), "timeout_ms: 200\n").unwrap();
    sondeo()
        .current_dir(dir.path())
        .args([
            "test",
            "landing",
            "--engine",
            "mock",
            "--slow-mo",
            "0",
            "--base-url",
            "https://elsewhere.test",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAIL landing > "));
}

#[test]
fn test_missing_config_file_exits_2() {
    let dir = TempDir::new().unwrap();
    replica_run(&dir)
        .args(["--config", "missing.yaml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("missing.yaml"));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_config_shows_layered_values() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("sondeo.yaml"), "timeout_ms: 7000\n").unwrap();
    sondeo()
        .current_dir(dir.path())
        .args(["config", "--headless"])
        .assert()
        .success()
        .stdout(predicate::str::contains("timeout_ms: 7000"))
        .stdout(predicate::str::contains("headless: true"))
        .stdout(predicate::str::contains("slow_mo_ms: 1000"))
        .stdout(predicate::str::contains("https://www.netflix.com"));
}

#[test]
fn test_config_rejects_bad_override() {
    sondeo()
        .args(["config", "--base-url", "not a url"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration error"));
}
