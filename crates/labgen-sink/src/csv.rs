//! CSV sink: one `<table>.csv` file per table, with a header row.

use crate::convert::{ordered_values, to_csv_field};
use crate::error::SinkError;
use crate::sink::{BatchState, Sink, SinkSummary};
use crate::staging::StagingArea;
use csv::Writer;
use labgen_core::{Row, TableDefinition};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Writes CSV files with a header row of declared field names.
#[derive(Debug)]
pub struct CsvSink {
    output_dir: PathBuf,
    delimiter: u8,
    state: BatchState,
    staging: Option<StagingArea>,
    writers: BTreeMap<String, Writer<BufWriter<File>>>,
}

impl CsvSink {
    /// Create a sink publishing into `output_dir`.
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            delimiter: b',',
            state: BatchState::default(),
            staging: None,
            writers: BTreeMap::new(),
        }
    }

    /// Use a different field delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn writer_for(
        &mut self,
        table: &TableDefinition,
    ) -> Result<&mut Writer<BufWriter<File>>, SinkError> {
        if !self.writers.contains_key(&table.name) {
            let staging = self
                .staging
                .as_mut()
                .ok_or_else(|| SinkError::NotOpen("csv".to_string()))?;
            let file = staging.create_file(&format!("{}.csv", table.name))?;
            let mut writer = csv::WriterBuilder::new()
                .delimiter(self.delimiter)
                .from_writer(file);
            writer
                .write_record(table.fields.iter().map(|f| f.name.as_str()))
                .map_err(|e| SinkError::write_failure(&table.name, e))?;
            self.writers.insert(table.name.clone(), writer);
        }
        self.writers
            .get_mut(&table.name)
            .ok_or_else(|| SinkError::write_failure(&table.name, "writer missing"))
    }
}

impl Sink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    fn begin(&mut self, batch_id: &str) -> Result<(), SinkError> {
        self.state.open("csv", batch_id)?;
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
        self.state.ensure_open("csv")?;
        let writer = self.writer_for(table)?;
        for row in rows {
            let record = ordered_values(table, row).map(|(_, value)| to_csv_field(value));
            writer
                .write_record(record)
                .map_err(|e| SinkError::write_failure(&table.name, e))?;
        }
        self.state.record(&table.name, rows.len());
        debug!("Staged {} rows for '{}'", rows.len(), table.name);
        Ok(rows.len())
    }

    fn commit(&mut self) -> Result<SinkSummary, SinkError> {
        self.state.ensure_open("csv")?;
        for (table, mut writer) in std::mem::take(&mut self.writers) {
            writer
                .flush()
                .map_err(|e| SinkError::write_failure(&table, e))?;
        }
        let staging = self
            .staging
            .take()
            .ok_or_else(|| SinkError::NotOpen("csv".to_string()))?;
        let files = staging.publish()?;
        let (batch_id, rows_written) = self.state.close();

        let summary = SinkSummary {
            sink: "csv".to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::test_support::{rows, table};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_csv_has_header_and_quoted_values() {
        let out = TempDir::new().unwrap();
        let mut sink = CsvSink::new(out.path());
        sink.begin("batch").unwrap();
        sink.write(&table(), &rows()).unwrap();
        sink.commit().unwrap();

        let content = fs::read_to_string(out.path().join("accounts.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "account_id,name,mrr,active,opened");
        assert_eq!(lines[1], "ACC-1,\"O'Brien, Ltd\",1250.50,true,2024-03-09");
        assert_eq!(lines[2], "ACC-2,Plain Co,,false,");
    }

    #[test]
    fn test_csv_reads_back() {
        let out = TempDir::new().unwrap();
        let mut sink = CsvSink::new(out.path()).with_delimiter(b';');
        sink.begin("batch").unwrap();
        sink.write(&table(), &rows()).unwrap();
        sink.commit().unwrap();

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .from_path(out.path().join("accounts.csv"))
            .unwrap();
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][1], "O'Brien, Ltd");
    }

    #[test]
    fn test_abort_removes_staged_csv() {
        let out = TempDir::new().unwrap();
        let mut sink = CsvSink::new(out.path());
        sink.begin("batch").unwrap();
        sink.write(&table(), &rows()).unwrap();
        sink.abort().unwrap();
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }
}
