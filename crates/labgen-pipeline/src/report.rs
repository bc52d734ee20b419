//! Run report: what was generated, how long it took, what went wrong.

use crate::metrics::{format_duration_ms, format_number, StageMetrics};
use chrono::{DateTime, NaiveDate, Utc};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Final state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Succeeded => write!(f, "succeeded"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Report of one generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Run identifier, also used as the sink batch id
    pub run_id: Uuid,
    /// Run seed
    pub seed: u64,
    /// The run's "today"
    pub as_of: NaiveDate,
    /// Sink name
    pub sink: String,
    /// Final state
    pub status: RunStatus,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// Completion time
    pub completed_at: DateTime<Utc>,
    /// Metrics of every completed stage
    pub stages: Vec<StageMetrics>,
    /// Rows committed per table
    pub rows_written: BTreeMap<String, u64>,
    /// Projections that were built and written
    #[serde(default)]
    pub projections: Vec<String>,
    /// Non-fatal problems
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Errors that aborted the run
    #[serde(default)]
    pub errors: Vec<String>,
}

impl GenerationReport {
    /// Total rows committed.
    pub fn total_rows(&self) -> u64 {
        self.rows_written.values().sum()
    }

    /// Wall-clock duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        (self.completed_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Whether the run committed its batch.
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Write the report as pretty JSON.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }

    /// Human-readable summary with a per-stage table.
    pub fn summary(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "Run {} ({}): seed {}, as_of {}, sink {}\n",
            self.run_id, self.status, self.seed, self.as_of, self.sink
        ));

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Stage", "Rows", "Written", "Duration", "Rows/sec"]);
        for stage in &self.stages {
            let written = self
                .rows_written
                .get(&stage.stage)
                .map(|n| format_number(*n))
                .unwrap_or_else(|| "-".to_string());
            table.add_row(vec![
                Cell::new(&stage.stage),
                Cell::new(format_number(stage.rows)),
                Cell::new(written),
                Cell::new(format_duration_ms(stage.duration_ms)),
                Cell::new(format!("{:.1}", stage.rows_per_second)),
            ]);
        }
        for projection in &self.projections {
            let written = self.rows_written.get(projection).copied().unwrap_or(0);
            table.add_row(vec![
                Cell::new(projection).fg(Color::Cyan),
                Cell::new(format_number(written)),
                Cell::new(format_number(written)),
                Cell::new("-"),
                Cell::new("-"),
            ]);
        }
        let status_cell = match self.status {
            RunStatus::Succeeded => Cell::new("OK").fg(Color::Green),
            RunStatus::Failed => Cell::new("FAILED").fg(Color::Red),
            RunStatus::Cancelled => Cell::new("CANCELLED").fg(Color::Yellow),
        };
        table.add_row(vec![
            Cell::new("TOTAL").fg(Color::Cyan),
            Cell::new(format_number(self.stages.iter().map(|s| s.rows).sum())),
            Cell::new(format_number(self.total_rows())),
            Cell::new(format_duration_ms(self.duration_ms())),
            status_cell,
        ]);
        output.push_str(&table.to_string());
        output.push('\n');

        if !self.warnings.is_empty() {
            output.push_str("\nWarnings:\n");
            for warning in &self.warnings {
                output.push_str(&format!("  {warning}\n"));
            }
        }
        if !self.errors.is_empty() {
            output.push_str("\nErrors:\n");
            for error in &self.errors {
                output.push_str(&format!("  {error}\n"));
            }
        }
        output
    }
}

/// Captures the start of a run and completes its report.
#[derive(Debug)]
pub struct ReportBuilder {
    run_id: Uuid,
    seed: u64,
    as_of: NaiveDate,
    sink: String,
    started_at: DateTime<Utc>,
    stages: Vec<StageMetrics>,
    projections: Vec<String>,
    warnings: Vec<String>,
}

impl ReportBuilder {
    /// Start a run with a fresh run id.
    pub fn start(seed: u64, as_of: NaiveDate, sink: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            seed,
            as_of,
            sink: sink.into(),
            started_at: Utc::now(),
            stages: Vec::new(),
            projections: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// The run id.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Record stage metrics.
    pub fn stages(&mut self, stages: Vec<StageMetrics>) {
        self.stages = stages;
    }

    /// Record a built projection.
    pub fn projection(&mut self, name: impl Into<String>) {
        self.projections.push(name.into());
    }

    /// Record a non-fatal problem.
    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Complete the report of a committed run.
    pub fn finish_success(self, rows_written: BTreeMap<String, u64>) -> GenerationReport {
        self.finish(RunStatus::Succeeded, rows_written, Vec::new())
    }

    /// Complete the report of an aborted run. Nothing was committed.
    pub fn finish_failure(self, status: RunStatus, error: String) -> GenerationReport {
        self.finish(status, BTreeMap::new(), vec![error])
    }

    fn finish(
        self,
        status: RunStatus,
        rows_written: BTreeMap<String, u64>,
        errors: Vec<String>,
    ) -> GenerationReport {
        GenerationReport {
            run_id: self.run_id,
            seed: self.seed,
            as_of: self.as_of,
            sink: self.sink,
            status,
            started_at: self.started_at,
            completed_at: Utc::now(),
            stages: self.stages,
            rows_written,
            projections: self.projections,
            warnings: self.warnings,
            errors,
        }
    }
}
