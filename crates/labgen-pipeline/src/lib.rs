//! Stage scheduling, reporting and projections for labgen.
//!
//! [`GenerationPipeline`] turns a [`GeneratorSchema`](labgen_core::GeneratorSchema)
//! and a [`GenerateConfig`] into a generated batch and writes it through a
//! [`Sink`](labgen_sink::Sink) as a single all-or-nothing batch.
//!
//! ```text
//! reference-data ──► customers ──► users ──► usage_daily
//!                        │           ├─────► nps_responses
//!                        │           └─────► support_tickets
//!                        ├──────► subscriptions
//!                        └──────► health_scores
//!                leads ──► opportunities
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use labgen_core::GeneratorSchema;
//! use labgen_pipeline::{GenerateConfig, GenerationPipeline};
//! use labgen_sink::MemorySink;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GenerateConfig { customers: 10, ..Default::default() };
//! let pipeline = GenerationPipeline::new(GeneratorSchema::builtin()?, config)?;
//! let mut sink = MemorySink::new();
//! let report = pipeline.run(&mut sink).await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod contract;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod pipeline;
pub mod projection;
pub mod report;

pub use batch::GeneratedBatch;
pub use config::{ConfigError, GenerateConfig};
pub use contract::{ContractViolation, ReportingContract, CUSTOMER_360, REVENUE_SUMMARY};
pub use error::PipelineError;
pub use graph::{StageGraph, REFERENCE_STAGE};
pub use metrics::StageMetrics;
pub use pipeline::{GenerationPipeline, PipelineFailure};
pub use projection::Projection;
pub use report::{GenerationReport, ReportBuilder, RunStatus};
