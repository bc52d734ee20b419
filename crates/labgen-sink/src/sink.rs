//! The `Sink` trait and the summary a committed batch produces.

use crate::error::SinkError;
use labgen_core::{Row, TableDefinition};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Destination for a generated batch.
///
/// A batch is bracketed by [`begin`](Sink::begin) and either
/// [`commit`](Sink::commit) or [`abort`](Sink::abort). Nothing written
/// between them is visible to readers until `commit` succeeds; an aborted
/// or dropped batch leaves no output behind.
pub trait Sink: Send {
    /// Short name used in logs and summaries.
    fn name(&self) -> &str;

    /// Open a new batch.
    fn begin(&mut self, batch_id: &str) -> Result<(), SinkError>;

    /// Stage rows of one table. Returns the number of rows written.
    ///
    /// Writing the same table twice within a batch appends.
    fn write(&mut self, table: &TableDefinition, rows: &[Row]) -> Result<usize, SinkError>;

    /// Publish everything staged since `begin`.
    fn commit(&mut self) -> Result<SinkSummary, SinkError>;

    /// Discard everything staged since `begin`. Aborting with no open batch
    /// is a no-op.
    fn abort(&mut self) -> Result<(), SinkError>;
}

/// What a committed batch published.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SinkSummary {
    /// Sink name
    pub sink: String,
    /// Batch identifier passed to `begin`
    pub batch_id: String,
    /// Output directory, for file sinks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
    /// Rows written per table
    pub rows_written: BTreeMap<String, u64>,
    /// Published files
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<PathBuf>,
}

impl SinkSummary {
    /// Total rows across all tables.
    pub fn total_rows(&self) -> u64 {
        self.rows_written.values().sum()
    }
}

/// Batch state shared by every sink implementation.
#[derive(Debug, Default)]
pub(crate) struct BatchState {
    batch_id: Option<String>,
    rows_written: BTreeMap<String, u64>,
}

impl BatchState {
    pub(crate) fn open(&mut self, sink: &str, batch_id: &str) -> Result<(), SinkError> {
        if self.batch_id.is_some() {
            return Err(SinkError::AlreadyOpen(sink.to_string()));
        }
        self.batch_id = Some(batch_id.to_string());
        self.rows_written.clear();
        Ok(())
    }

    pub(crate) fn ensure_open(&self, sink: &str) -> Result<&str, SinkError> {
        self.batch_id
            .as_deref()
            .ok_or_else(|| SinkError::NotOpen(sink.to_string()))
    }

    pub(crate) fn is_open(&self) -> bool {
        self.batch_id.is_some()
    }

    pub(crate) fn record(&mut self, table: &str, rows: usize) {
        *self.rows_written.entry(table.to_string()).or_insert(0) += rows as u64;
    }

    /// Close the batch, returning its identifier and row counts.
    pub(crate) fn close(&mut self) -> (String, BTreeMap<String, u64>) {
        (
            self.batch_id.take().unwrap_or_default(),
            std::mem::take(&mut self.rows_written),
        )
    }
}
