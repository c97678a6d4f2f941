//! Trace store and selector tests against real files

use leo_netem::convert::convert_ping_log;
use leo_netem::{closest_latency, LatencyTrace, NetemError};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_trace(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_scenario_nearest_sample() {
    let file = write_trace("timestamp,relative,rtt\na,0.0,100.0\nb,1.0,300.0\nc,2.0,50.0\n");
    let trace = LatencyTrace::load(file.path()).unwrap();

    assert_eq!(trace.len(), 3);
    assert_eq!(closest_latency(&trace, Duration::from_millis(900)), 150);
}

#[test]
fn test_header_styled_as_data_is_skipped() {
    let file = write_trace("0,0.0,999.0\na,5.0,20.0\n");
    let trace = LatencyTrace::load(file.path()).unwrap();

    assert_eq!(trace.len(), 1);
    // Only the 5 s sample exists, so even t=0 maps to it
    assert_eq!(closest_latency(&trace, Duration::ZERO), 10);
}

#[test]
fn test_missing_file() {
    let err = LatencyTrace::load("/definitely/not/here.csv").unwrap_err();
    assert!(matches!(err, NetemError::TraceRead { .. }));
}

#[test]
fn test_empty_trace_names_the_file() {
    let file = write_trace("timestamp,relative,rtt\n");
    match LatencyTrace::load(file.path()) {
        Err(NetemError::EmptyTrace(path)) => assert_eq!(path, file.path()),
        other => panic!("expected EmptyTrace, got {other:?}"),
    }
}

#[test]
fn test_one_bad_row_rejects_whole_file() {
    let file = write_trace("h,h,h\na,0.0,10\nb,1.0,\nc,2.0,30\n");
    assert!(matches!(
        LatencyTrace::load(file.path()),
        Err(NetemError::TraceRow { line: 3, .. })
    ));
}

#[test]
fn test_tab_delimited_trace() {
    let file = write_trace("ts\trel\trtt\nx\t0.5\t64\n");
    let trace = LatencyTrace::load_with_delimiter(file.path(), b'\t').unwrap();
    assert_eq!(trace.get(0.5), Some(64.0));
}

#[test]
fn test_converted_log_loads_as_trace() {
    let log = write_trace(
        "timestamp, rtt\n\
         2024-05-01 12:00:00.000000, 30\n\
         2024-05-01 12:00:00.500000, bad\n\
         2024-05-01 12:00:01.000000, 90\n",
    );
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("trace.csv");

    let report = convert_ping_log(log.path(), &output).unwrap();
    assert_eq!(report.rows_written, 2);
    assert_eq!(report.rows_skipped, 1);

    let trace = LatencyTrace::load(&output).unwrap();
    assert_eq!(closest_latency(&trace, Duration::from_millis(200)), 15);
    assert_eq!(closest_latency(&trace, Duration::from_millis(800)), 45);
}
