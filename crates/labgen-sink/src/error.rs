//! Error types for output sinks.

use thiserror::Error;

/// Errors raised while staging, writing or publishing a batch.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Writing rows of a table failed; the batch must be aborted
    #[error("Sink write failure on table '{table}': {reason}")]
    WriteFailure { table: String, reason: String },

    /// `write` or `commit` called without an open batch
    #[error("Sink '{0}' has no open batch; call begin() first")]
    NotOpen(String),

    /// `begin` called while a batch is still open
    #[error("Sink '{0}' already has an open batch")]
    AlreadyOpen(String),

    /// Unparseable sink target
    #[error("Invalid sink target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// IO error while staging or publishing files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl SinkError {
    /// Wrap any error raised while writing `table` as a write failure.
    pub fn write_failure(table: &str, source: impl std::fmt::Display) -> Self {
        SinkError::WriteFailure {
            table: table.to_string(),
            reason: source.to_string(),
        }
    }
}
