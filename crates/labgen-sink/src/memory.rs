//! In-memory sink, used by tests and dry runs.

use crate::error::SinkError;
use crate::sink::{BatchState, Sink, SinkSummary};
use labgen_core::{Row, TableDefinition};
use std::collections::BTreeMap;
use tracing::debug;

/// Keeps committed rows in memory, keyed by table.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: BatchState,
    staged: BTreeMap<String, Vec<Row>>,
    committed: BTreeMap<String, Vec<Row>>,
}

impl MemorySink {
    /// Create an empty memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of committed tables.
    pub fn tables(&self) -> Vec<&str> {
        self.committed.keys().map(String::as_str).collect()
    }

    /// Committed rows of a table.
    pub fn rows(&self, table: &str) -> Option<&[Row]> {
        self.committed.get(table).map(Vec::as_slice)
    }

    /// Take all committed rows.
    pub fn into_tables(self) -> BTreeMap<String, Vec<Row>> {
        self.committed
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn begin(&mut self, batch_id: &str) -> Result<(), SinkError> {
        self.state.open("memory", batch_id)?;
        self.staged.clear();
        Ok(())
    }

    fn write(&mut self, table: &TableDefinition, rows: &[Row]) -> Result<usize, SinkError> {
        self.state.ensure_open("memory")?;
        self.staged
            .entry(table.name.clone())
            .or_default()
            .extend_from_slice(rows);
        self.state.record(&table.name, rows.len());
        debug!("Staged {} rows for '{}' in memory", rows.len(), table.name);
        Ok(rows.len())
    }

    fn commit(&mut self) -> Result<SinkSummary, SinkError> {
        self.state.ensure_open("memory")?;
        let (batch_id, rows_written) = self.state.close();
        self.committed = std::mem::take(&mut self.staged);
        Ok(SinkSummary {
            sink: "memory".to_string(),
            batch_id,
            rows_written,
            ..Default::default()
        })
    }

    fn abort(&mut self) -> Result<(), SinkError> {
        if self.state.is_open() {
            self.state.close();
            self.staged.clear();
        }
        Ok(())
    }
}
