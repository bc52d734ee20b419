//! Run configuration.
//!
//! A [`GenerateConfig`] can be loaded from TOML; the CLI applies its flags on
//! top of the file values.
//!
//! ```toml
//! seed = 7
//! as_of = "2024-06-30"
//! customers = 200
//! usage_days = 30
//! tables = ["customers", "subscriptions"]
//!
//! [row_counts]
//! accounts = 50
//! ```

use chrono::{NaiveDate, Utc};
use labgen_core::GeneratorSchema;
use labgen_generator::GenerationContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default random seed
pub const DEFAULT_SEED: u64 = 42;
/// Default number of customers
pub const DEFAULT_CUSTOMERS: u64 = 500;
/// Default number of leads
pub const DEFAULT_LEADS: u64 = 1000;
/// Default usage window in days
pub const DEFAULT_USAGE_DAYS: u32 = 90;
/// Default health-score window in weeks
pub const DEFAULT_HEALTH_WEEKS: u32 = 12;

/// Errors raised while loading or checking a run configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings of one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerateConfig {
    /// Seed for every random sub-stream
    pub seed: u64,
    /// The date treated as "today"; the current UTC date when unset
    pub as_of: Option<NaiveDate>,
    /// Number of customers
    pub customers: u64,
    /// Number of leads
    pub leads: u64,
    /// Daily usage window
    pub usage_days: u32,
    /// Weekly health-score window
    pub health_weeks: u32,
    /// Maximum stages running at once; available parallelism when unset
    pub workers: Option<usize>,
    /// Tables to write; ancestors are still generated. Empty means all.
    pub tables: Vec<String>,
    /// Row counts for other root tables
    pub row_counts: BTreeMap<String, u64>,
    /// Also build and write the reporting projections
    pub include_projections: bool,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            as_of: None,
            customers: DEFAULT_CUSTOMERS,
            leads: DEFAULT_LEADS,
            usage_days: DEFAULT_USAGE_DAYS,
            health_weeks: DEFAULT_HEALTH_WEEKS,
            workers: None,
            tables: Vec::new(),
            row_counts: BTreeMap::new(),
            include_projections: false,
        }
    }
}

impl GenerateConfig {
    /// Parse a TOML configuration.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: GenerateConfig = toml::from_str(content)?;
        config.check()?;
        Ok(config)
    }

    /// Load a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject settings no run can satisfy.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if let Some(table) = self.tables.iter().find(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("empty table name '{table}'")));
        }
        Ok(())
    }

    /// The effective `as_of` date.
    pub fn as_of_date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// The effective worker count.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Generation context for `schema`.
    ///
    /// `customers` and `leads` apply to root tables of those names;
    /// `row_counts` entries win over both.
    pub fn context(&self, schema: &GeneratorSchema) -> GenerationContext {
        let mut context = GenerationContext::new(self.as_of_date())
            .with_daily_window(self.usage_days)
            .with_weekly_window(self.health_weeks);

        for (table, count) in [("customers", self.customers), ("leads", self.leads)] {
            if schema.get_table(table).is_some_and(|t| t.is_root()) {
                context = context.with_row_count(table, count);
            }
        }
        for (table, count) in &self.row_counts {
            context = context.with_row_count(table.clone(), *count);
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GenerateConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.customers, 500);
        assert_eq!(config.leads, 1000);
        assert_eq!(config.usage_days, 90);
        assert_eq!(config.health_weeks, 12);
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_parse_toml() {
        let config = GenerateConfig::from_toml_str(
            r#"
seed = 7
as_of = "2024-06-30"
customers = 20
tables = ["customers"]

[row_counts]
leads = 3
"#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.as_of, NaiveDate::from_ymd_opt(2024, 6, 30));
        assert_eq!(config.customers, 20);
        assert_eq!(config.leads, DEFAULT_LEADS);
        assert_eq!(config.row_counts.get("leads"), Some(&3));
    }

    #[test]
    fn test_rejects_unknown_keys_and_zero_workers() {
        assert!(matches!(
            GenerateConfig::from_toml_str("sed = 1"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            GenerateConfig::from_toml_str("workers = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_context_row_counts() {
        let schema = GeneratorSchema::builtin().unwrap();
        let config = GenerateConfig {
            as_of: NaiveDate::from_ymd_opt(2024, 6, 30),
            customers: 10,
            row_counts: BTreeMap::from([("leads".to_string(), 4)]),
            ..Default::default()
        };
        let context = config.context(&schema);
        assert_eq!(context.row_counts.get("customers"), Some(&10));
        assert_eq!(context.row_counts.get("leads"), Some(&4));
        assert_eq!(context.daily_window, Some(90));
        assert_eq!(context.weekly_window, Some(12));
    }
}
