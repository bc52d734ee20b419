//! JSON Lines sink: one `<table>.jsonl` file per table.

use crate::convert::JsonRow;
use crate::error::SinkError;
use crate::sink::{BatchState, Sink, SinkSummary};
use crate::staging::StagingArea;
use labgen_core::{Row, TableDefinition};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Writes one JSON object per row, fields in declared order.
#[derive(Debug)]
pub struct JsonlSink {
    output_dir: PathBuf,
    state: BatchState,
    staging: Option<StagingArea>,
    writers: BTreeMap<String, BufWriter<File>>,
}

impl JsonlSink {
    /// Create a sink publishing into `output_dir`.
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            state: BatchState::default(),
            staging: None,
            writers: BTreeMap::new(),
        }
    }

    fn writer_for(&mut self, table: &str) -> Result<&mut BufWriter<File>, SinkError> {
        if !self.writers.contains_key(table) {
            let staging = self
                .staging
                .as_mut()
                .ok_or_else(|| SinkError::NotOpen("jsonl".to_string()))?;
            let writer = staging.create_file(&format!("{table}.jsonl"))?;
            self.writers.insert(table.to_string(), writer);
        }
        self.writers
            .get_mut(table)
            .ok_or_else(|| SinkError::write_failure(table, "writer missing"))
    }
}

impl Sink for JsonlSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn begin(&mut self, batch_id: &str) -> Result<(), SinkError> {
        self.state.open("jsonl", batch_id)?;
        match StagingArea::create(&self.output_dir) {
            Ok(staging) => {
                self.staging = Some(staging);
                Ok(())
            }
            Err(e) => {
                self.state.close();
                Err(e)
            }
        }
    }

    fn write(&mut self, table: &TableDefinition, rows: &[Row]) -> Result<usize, SinkError> {
        self.state.ensure_open("jsonl")?;
        let writer = self.writer_for(&table.name)?;
        for row in rows {
            serde_json::to_writer(&mut *writer, &JsonRow { table, row })
                .map_err(|e| SinkError::write_failure(&table.name, e))?;
            writeln!(writer).map_err(|e| SinkError::write_failure(&table.name, e))?;
        }
        self.state.record(&table.name, rows.len());
        debug!("Staged {} rows for '{}'", rows.len(), table.name);
        Ok(rows.len())
    }

    fn commit(&mut self) -> Result<SinkSummary, SinkError> {
        self.state.ensure_open("jsonl")?;
        for (table, mut writer) in std::mem::take(&mut self.writers) {
            writer
                .flush()
                .map_err(|e| SinkError::write_failure(&table, e))?;
        }
        let staging = self
            .staging
            .take()
            .ok_or_else(|| SinkError::NotOpen("jsonl".to_string()))?;
        let files = staging.publish()?;
        let (batch_id, rows_written) = self.state.close();

        let summary = SinkSummary {
            sink: "jsonl".to_string(),
            batch_id,
            location: Some(self.output_dir.clone()),
            rows_written,
            files,
        };
        info!(
            "Published {} rows in {} files to {}",
            summary.total_rows(),
            summary.files.len(),
            self.output_dir.display()
        );
        Ok(summary)
    }

    fn abort(&mut self) -> Result<(), SinkError> {
        self.writers.clear();
        self.state.close();
        match self.staging.take() {
            Some(staging) => staging.discard(),
            None => Ok(()),
        }
    }
}
