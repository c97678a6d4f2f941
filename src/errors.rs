//! Error types for the link emulator

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetemError {
    #[error("Failed to read latency trace {path}: {source}")]
    TraceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed latency trace row at line {line}: {reason}")]
    TraceRow { line: u64, reason: String },

    #[error("Latency trace {0} contains no samples")]
    EmptyTrace(PathBuf),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("No tick received within {0} ms")]
    TickTimeout(u64),

    #[error("Scheduler task error: {0}")]
    Task(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NetemError>;
