//! The materialised output of a generation run.

use crate::metrics::StageMetrics;
use chrono::NaiveDate;
use labgen_core::Row;
use std::collections::HashMap;
use std::sync::Arc;

/// Every generated table of one run, in topological order.
#[derive(Debug, Clone)]
pub struct GeneratedBatch {
    /// Run seed
    pub seed: u64,
    /// The run's "today"
    pub as_of: NaiveDate,
    order: Vec<String>,
    tables: HashMap<String, Arc<Vec<Row>>>,
    /// Metrics of every completed stage, in completion order
    pub metrics: Vec<StageMetrics>,
}

impl GeneratedBatch {
    pub(crate) fn new(seed: u64, as_of: NaiveDate) -> Self {
        Self {
            seed,
            as_of,
            order: Vec::new(),
            tables: HashMap::new(),
            metrics: Vec::new(),
        }
    }

    pub(crate) fn set_order(&mut self, order: Vec<String>) {
        self.order = order;
    }

    pub(crate) fn insert(&mut self, table: impl Into<String>, rows: Arc<Vec<Row>>) {
        self.tables.insert(table.into(), rows);
    }

    pub(crate) fn shared(&self, table: &str) -> Option<Arc<Vec<Row>>> {
        self.tables.get(table).cloned()
    }

    /// Rows of `table`.
    pub fn rows(&self, table: &str) -> Option<&[Row]> {
        self.tables.get(table).map(|rows| rows.as_slice())
    }

    /// Whether `table` was generated.
    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Table names in topological order.
    pub fn table_names(&self) -> &[String] {
        &self.order
    }

    /// Tables and their rows in topological order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Row])> {
        self.order
            .iter()
            .filter_map(|name| self.rows(name).map(|rows| (name.as_str(), rows)))
    }

    /// Total rows across all tables.
    pub fn total_rows(&self) -> u64 {
        self.tables.values().map(|rows| rows.len() as u64).sum()
    }
}
