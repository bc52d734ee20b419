//! CLI argument definitions.

use anyhow::Context;
use chrono::NaiveDate;
use clap::Args;
use labgen_pipeline::GenerateConfig;
use std::path::PathBuf;

/// Arguments of `labgen generate`.
///
/// Flags override values from `--config`; unset flags keep the file value
/// or the built-in default.
#[derive(Args, Clone, Debug, Default)]
pub struct GenerateArgs {
    /// TOML run configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Schema YAML file (defaults to the built-in lab schema)
    #[arg(long, short = 's')]
    pub schema: Option<PathBuf>,

    /// Random seed (same seed and config = same output)
    #[arg(long, env = "LABGEN_SEED")]
    pub seed: Option<u64>,

    /// Date treated as "today" (YYYY-MM-DD, defaults to the current UTC date)
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Number of customers
    #[arg(long)]
    pub customers: Option<u64>,

    /// Number of leads
    #[arg(long)]
    pub leads: Option<u64>,

    /// Daily usage window in days
    #[arg(long)]
    pub usage_days: Option<u32>,

    /// Health-score window in weeks
    #[arg(long)]
    pub health_weeks: Option<u32>,

    /// Maximum stages generated in parallel
    #[arg(long)]
    pub workers: Option<usize>,

    /// Tables to write (comma-separated, empty = all tables)
    #[arg(long, value_delimiter = ',')]
    pub tables: Vec<String>,

    /// Output target: jsonl:<dir>, csv:<dir>, sql:<dir>, memory, or a directory
    #[arg(long, default_value = "out")]
    pub out: String,

    /// Write the run report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Also build and write the reporting projections
    #[arg(long)]
    pub include_projections: bool,

    /// Generate into memory and only report row counts
    #[arg(long)]
    pub dry_run: bool,
}

impl GenerateArgs {
    /// Load `--config` (or defaults) and apply the flags on top.
    pub fn resolve_config(&self) -> anyhow::Result<GenerateConfig> {
        let base = match &self.config {
            Some(path) => GenerateConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {path:?}"))?,
            None => GenerateConfig::default(),
        };
        let config = self.apply(base);
        config.check().context("Invalid run configuration")?;
        Ok(config)
    }

    /// Override `config` with every flag that was given.
    pub fn apply(&self, mut config: GenerateConfig) -> GenerateConfig {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(as_of) = self.as_of {
            config.as_of = Some(as_of);
        }
        if let Some(customers) = self.customers {
            config.customers = customers;
        }
        if let Some(leads) = self.leads {
            config.leads = leads;
        }
        if let Some(days) = self.usage_days {
            config.usage_days = days;
        }
        if let Some(weeks) = self.health_weeks {
            config.health_weeks = weeks;
        }
        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
        if !self.tables.is_empty() {
            config.tables = self.tables.clone();
        }
        if self.include_projections {
            config.include_projections = true;
        }
        config
    }
}

/// Arguments of `labgen validate`.
#[derive(Args, Clone, Debug, Default)]
pub struct ValidateArgs {
    /// Schema YAML file (defaults to the built-in lab schema)
    #[arg(long, short = 's')]
    pub schema: Option<PathBuf>,
}
