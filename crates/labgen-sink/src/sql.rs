//! SQL sink: one `<table>.sql` script per table with DDL and batched INSERTs.

use crate::convert::{ordered_values, quote_ident, to_sql_literal};
use crate::error::SinkError;
use crate::sink::{BatchState, Sink, SinkSummary};
use crate::staging::StagingArea;
use labgen_core::{FieldType, Row, TableDefinition, ToDdl};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default number of rows per INSERT statement
pub const DEFAULT_INSERT_BATCH: usize = 500;

/// ANSI SQL column types.
pub struct AnsiDdl;

impl ToDdl for AnsiDdl {
    fn to_ddl(&self, field_type: &FieldType) -> String {
        match field_type {
            FieldType::Bool => "BOOLEAN".to_string(),
            FieldType::Int => "INTEGER".to_string(),
            FieldType::BigInt => "BIGINT".to_string(),
            FieldType::Double => "DOUBLE PRECISION".to_string(),
            FieldType::Decimal { precision, scale } => format!("NUMERIC({precision},{scale})"),
            FieldType::VarChar { length } => format!("VARCHAR({length})"),
            FieldType::Text => "TEXT".to_string(),
            FieldType::Date => "DATE".to_string(),
        }
    }
}

/// `CREATE TABLE` statement for a table. The primary key column is `NOT NULL`.
pub fn create_table_statement(table: &TableDefinition, ddl: &impl ToDdl) -> String {
    let mut column_defs: Vec<String> = table
        .fields
        .iter()
        .map(|field| {
            let null_clause = if field.name == table.primary_key {
                "NOT NULL"
            } else {
                "NULL"
            };
            format!(
                "  {} {} {}",
                quote_ident(&field.name),
                ddl.to_ddl(&field.field_type),
                null_clause
            )
        })
        .collect();
    column_defs.push(format!("  PRIMARY KEY ({})", quote_ident(&table.primary_key)));

    format!(
        "CREATE TABLE {} (\n{}\n);",
        quote_ident(&table.name),
        column_defs.join(",\n")
    )
}

/// One `INSERT` statement covering `rows`.
pub fn insert_statement(table: &TableDefinition, rows: &[Row]) -> String {
    let columns: Vec<String> = table.fields.iter().map(|f| quote_ident(&f.name)).collect();
    let values: Vec<String> = rows
        .iter()
        .map(|row| {
            let literals: Vec<String> = ordered_values(table, row)
                .map(|(_, value)| to_sql_literal(value))
                .collect();
            format!("  ({})", literals.join(", "))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES\n{};",
        quote_ident(&table.name),
        columns.join(", "),
        values.join(",\n")
    )
}

/// Writes a load script per table.
#[derive(Debug)]
pub struct SqlSink {
    output_dir: PathBuf,
    insert_batch: usize,
    state: BatchState,
    staging: Option<StagingArea>,
    writers: BTreeMap<String, BufWriter<File>>,
}

impl SqlSink {
    /// Create a sink publishing into `output_dir`.
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            insert_batch: DEFAULT_INSERT_BATCH,
            state: BatchState::default(),
            staging: None,
            writers: BTreeMap::new(),
        }
    }

    /// Set the number of rows per INSERT statement (at least 1).
    pub fn with_insert_batch(mut self, rows: usize) -> Self {
        self.insert_batch = rows.max(1);
        self
    }

    fn writer_for(&mut self, table: &TableDefinition) -> Result<&mut BufWriter<File>, SinkError> {
        if !self.writers.contains_key(&table.name) {
            let staging = self
                .staging
                .as_mut()
                .ok_or_else(|| SinkError::NotOpen("sql".to_string()))?;
            let mut writer = staging.create_file(&format!("{}.sql", table.name))?;
            writeln!(writer, "{}\n", create_table_statement(table, &AnsiDdl))
                .map_err(|e| SinkError::write_failure(&table.name, e))?;
            self.writers.insert(table.name.clone(), writer);
        }
        self.writers
            .get_mut(&table.name)
            .ok_or_else(|| SinkError::write_failure(&table.name, "writer missing"))
    }
}

impl Sink for SqlSink {
    fn name(&self) -> &str {
        "sql"
    }

    fn begin(&mut self, batch_id: &str) -> Result<(), SinkError> {
        self.state.open("sql", batch_id)?;
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
        self.state.ensure_open("sql")?;
        let insert_batch = self.insert_batch;
        let writer = self.writer_for(table)?;
        for chunk in rows.chunks(insert_batch) {
            writeln!(writer, "{}", insert_statement(table, chunk))
                .map_err(|e| SinkError::write_failure(&table.name, e))?;
        }
        self.state.record(&table.name, rows.len());
        debug!("Staged {} rows for '{}'", rows.len(), table.name);
        Ok(rows.len())
    }

    fn commit(&mut self) -> Result<SinkSummary, SinkError> {
        self.state.ensure_open("sql")?;
        for (table, mut writer) in std::mem::take(&mut self.writers) {
            writer
                .flush()
                .map_err(|e| SinkError::write_failure(&table, e))?;
        }
        let staging = self
            .staging
            .take()
            .ok_or_else(|| SinkError::NotOpen("sql".to_string()))?;
        let files = staging.publish()?;
        let (batch_id, rows_written) = self.state.close();

        let summary = SinkSummary {
            sink: "sql".to_string(),
            batch_id,
            location: Some(self.output_dir.clone()),
            rows_written,
            files,
        };
        info!(
            "Published {} rows in {} scripts to {}",
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
