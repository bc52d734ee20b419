//! Per-stage metrics.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Metrics of one completed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetrics {
    /// Stage name
    pub stage: String,
    /// Rows produced (catalog entries for the reference-data stage)
    pub rows: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Rows per second
    pub rows_per_second: f64,
}

impl StageMetrics {
    /// Metrics for a stage that produced `rows` in `elapsed`.
    pub fn new(stage: impl Into<String>, rows: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        Self {
            stage: stage.into(),
            rows,
            duration_ms: elapsed.as_millis() as u64,
            rows_per_second: if secs > 0.0 { rows as f64 / secs } else { 0.0 },
        }
    }
}

/// Human-readable duration, e.g. `850ms`, `12.3s`, `2m 05s`.
pub fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}m {:02}s", ms / 60_000, (ms % 60_000) / 1000)
    }
}

/// Number with thousands separators.
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
