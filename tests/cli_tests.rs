//! Integration tests for the command-line tools

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn leonetem() -> Command {
    Command::cargo_bin("leonetem").expect("Failed to find leonetem binary")
}

fn ping2csv() -> Command {
    Command::cargo_bin("ping2csv").expect("Failed to find ping2csv binary")
}

fn trace_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_missing_latency_flag_is_usage_error() {
    leonetem()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Please specify the latency trace file"));
}

#[test]
fn test_missing_latency_flag_with_other_options() {
    leonetem()
        .args(["--dry-run", "--max-updates", "3"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Please specify the latency trace file"));
}

#[test]
fn test_missing_trace_file_fails_before_scheduling() {
    leonetem()
        .args(["--latency", "/nonexistent/trace.csv", "--dry-run"])
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read latency trace"));
}

#[test]
fn test_malformed_trace_fails_before_scheduling() {
    let trace = trace_file("timestamp,relative,rtt\nx,0.0,40\ny,abc,50\n");
    leonetem()
        .arg("--latency")
        .arg(trace.path())
        .arg("--dry-run")
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed latency trace row at line 3"));
}

#[test]
fn test_dry_run_replays_trace() {
    let trace = trace_file("timestamp,relative,rtt\nx,0.0,40\ny,0.1,60\nz,0.2,80\n");
    leonetem()
        .arg("--latency")
        .arg(trace.path())
        .args(["--dry-run", "--step-ms", "100", "--max-updates", "2", "--duration", "1"])
        .timeout(Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Trace replay done: 2 updates"));
}

#[test]
fn test_ping2csv_converts_and_skips_bad_lines() {
    let input = trace_file(
        "timestamp, rtt\n2024-05-01 12:00:00.000000, 40.5\nnot a sample\n2024-05-01 12:00:02.000000, 45\n",
    );
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("trace.csv");

    ping2csv()
        .arg(input.path())
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Converted data written to"));

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("timestamp,relative,rtt\n"));
    assert!(written.contains(",0.000,40.5\n"));
    assert!(written.contains(",2.000,45.0\n"));
}

#[test]
fn test_non_ascii_delimiter_rejected() {
    let trace = trace_file("timestamp\u{e9}relative\u{e9}rtt\nx\u{e9}0.0\u{e9}40\n");
    leonetem()
        .arg("--latency")
        .arg(trace.path())
        .args(["--dry-run", "--delimiter", "\u{e9}"])
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("trace delimiter must be an ASCII character"));
}

#[test]
fn test_ping2csv_honours_rust_log() {
    let input = trace_file("timestamp, rtt\nnot a sample\n2024-05-01 12:00:00.000000, 40\n");
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("trace.csv");

    ping2csv()
        .env("RUST_LOG", "error")
        .arg(input.path())
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipping line").not());
}

#[test]
fn test_ping2csv_without_valid_rows_writes_nothing() {
    let input = trace_file("timestamp, rtt\nbroken\n");
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("trace.csv");

    ping2csv()
        .arg(input.path())
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("No valid data found."));
    assert!(!output.exists());
}
