//! Pipeline error types.

use crate::config::ConfigError;
use crate::contract::ContractViolation;
use labgen_core::SchemaError;
use labgen_generator::GeneratorError;
use labgen_sink::SinkError;
use thiserror::Error;

/// Any failure that aborts a generation run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown table '{0}'")]
    UnknownTable(String),

    /// A stage failed; names the stage, its entity and the cause
    #[error("Stage '{stage}' failed for entity '{entity}': {source}")]
    Stage {
        stage: String,
        entity: String,
        #[source]
        source: GeneratorError,
    },

    #[error("{0}")]
    Sink(#[from] SinkError),

    #[error("Generation cancelled before stage '{0}'; batch discarded")]
    Cancelled(String),

    #[error("Reporting contract violated: {}", format_violations(.0))]
    Contract(Vec<ContractViolation>),

    #[error("Stage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Worker pool closed")]
    PoolClosed(#[from] tokio::sync::AcquireError),
}

fn format_violations(violations: &[ContractViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl PipelineError {
    /// Wrap a generator error raised by `stage`.
    pub fn stage(stage: &str, entity: &str, source: GeneratorError) -> Self {
        PipelineError::Stage {
            stage: stage.to_string(),
            entity: entity.to_string(),
            source,
        }
    }

    /// Whether the run stopped because it was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled(_))
    }
}
