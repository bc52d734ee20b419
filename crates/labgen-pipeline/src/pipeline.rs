//! Generation pipeline: schedules entity stages and feeds a sink.
//!
//! Stages run on a bounded pool of blocking workers. A stage starts once
//! its parent table is fully materialised, and each stage draws from its own
//! seeded sub-stream, so the output never depends on scheduling. The
//! cancellation token is checked between stages, never inside one.

use crate::batch::GeneratedBatch;
use crate::config::GenerateConfig;
use crate::contract::ReportingContract;
use crate::error::PipelineError;
use crate::graph::{StageGraph, REFERENCE_STAGE};
use crate::metrics::StageMetrics;
use crate::projection;
use crate::report::{GenerationReport, ReportBuilder, RunStatus};
use labgen_core::{Catalogs, GeneratorSchema, Row};
use labgen_generator::{EntityGenerator, GeneratorError};
use labgen_sink::Sink;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A failed run together with its report.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PipelineFailure {
    /// The error that aborted the run
    pub error: PipelineError,
    /// Report of the aborted run
    pub report: Box<GenerationReport>,
}

/// Result of one entity stage.
struct StageOutput {
    stage: String,
    result: Result<Vec<Row>, GeneratorError>,
    elapsed: Duration,
}

/// Runs the stages of a schema and writes the batch to a sink.
#[derive(Debug, Clone)]
pub struct GenerationPipeline {
    schema: Arc<GeneratorSchema>,
    config: GenerateConfig,
    contract: ReportingContract,
    cancel: CancellationToken,
}

impl GenerationPipeline {
    /// Create a pipeline, checking the configuration against the schema.
    pub fn new(schema: GeneratorSchema, config: GenerateConfig) -> Result<Self, PipelineError> {
        config.check()?;
        StageGraph::from_schema(&schema).restricted_to(&config.tables)?;
        Ok(Self {
            schema: Arc::new(schema),
            config,
            contract: ReportingContract::default(),
            cancel: CancellationToken::new(),
        })
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this pipeline.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Get a reference to the schema.
    pub fn schema(&self) -> &GeneratorSchema {
        &self.schema
    }

    /// Get a reference to the run configuration.
    pub fn config(&self) -> &GenerateConfig {
        &self.config
    }

    fn check_cancelled(&self, next_stage: &str) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            warn!("Cancellation requested; stopping before '{}'", next_stage);
            return Err(PipelineError::Cancelled(next_stage.to_string()));
        }
        Ok(())
    }

    fn is_selected(&self, table: &str) -> bool {
        self.config.tables.is_empty() || self.config.tables.iter().any(|t| t == table)
    }

    /// Compile the reference catalogs.
    async fn reference_stage(&self) -> Result<(Arc<Catalogs>, StageMetrics), PipelineError> {
        info!("Stage '{}' started", REFERENCE_STAGE);
        let schema = Arc::clone(&self.schema);
        let started = Instant::now();
        let catalogs = tokio::task::spawn_blocking(move || Catalogs::compile(&schema.catalogs))
            .await?
            .map_err(|e| PipelineError::stage(REFERENCE_STAGE, "catalogs", e.into()))?;

        let entries: usize = self
            .schema
            .catalogs
            .iter()
            .map(|c| c.values.len() + c.entries.len())
            .sum();
        let metrics = StageMetrics::new(REFERENCE_STAGE, entries as u64, started.elapsed());
        info!(
            "Stage '{}' finished: {} catalogs, {} entries in {:?}",
            REFERENCE_STAGE,
            catalogs.len(),
            entries,
            started.elapsed()
        );
        Ok((Arc::new(catalogs), metrics))
    }

    /// Generate every selected table and its ancestors.
    pub async fn generate(&self) -> Result<GeneratedBatch, PipelineError> {
        let graph = StageGraph::from_schema(&self.schema).restricted_to(&self.config.tables)?;
        let order = graph.topological_order()?;
        let seed = self.config.seed;
        let mut batch = GeneratedBatch::new(seed, self.config.as_of_date());
        batch.set_order(order.clone());

        info!(
            "Generating {} tables with seed {} as of {} on {} workers",
            order.len(),
            seed,
            batch.as_of,
            self.config.worker_count()
        );

        self.check_cancelled(REFERENCE_STAGE)?;
        let (catalogs, reference_metrics) = self.reference_stage().await?;
        batch.metrics.push(reference_metrics);

        let generator = Arc::new(EntityGenerator::new(
            Arc::clone(&self.schema),
            catalogs,
            self.config.context(&self.schema),
        ));
        let semaphore = Arc::new(Semaphore::new(self.config.worker_count()));
        let mut pending = order.clone();
        let mut running: JoinSet<StageOutput> = JoinSet::new();

        while !pending.is_empty() || !running.is_empty() {
            let ready: Vec<String> = pending
                .iter()
                .filter(|stage| graph.parent(stage).map_or(true, |p| batch.contains(p)))
                .cloned()
                .collect();
            pending.retain(|stage| !ready.contains(stage));

            for stage in ready {
                self.check_cancelled(&stage)?;
                let parent_rows = graph.parent(&stage).and_then(|p| batch.shared(p));
                let permit = Arc::clone(&semaphore).acquire_owned().await?;
                let generator = Arc::clone(&generator);
                info!("Stage '{}' started", stage);

                running.spawn_blocking(move || {
                    let _permit = permit;
                    let started = Instant::now();
                    let parent_rows = parent_rows.as_deref().map(Vec::as_slice);
                    let result = generator.generate_table_seeded(&stage, parent_rows, seed);
                    StageOutput {
                        stage,
                        result,
                        elapsed: started.elapsed(),
                    }
                });
            }

            let Some(joined) = running.join_next().await else {
                if let Some(stage) = pending.first() {
                    let parent = graph.parent(stage).unwrap_or_default().to_string();
                    return Err(PipelineError::stage(
                        stage,
                        stage,
                        GeneratorError::DependencyMissing {
                            table: stage.clone(),
                            parent,
                        },
                    ));
                }
                break;
            };

            let output = joined?;
            match output.result {
                Ok(rows) => {
                    info!(
                        "Stage '{}' finished: {} rows in {:?}",
                        output.stage,
                        rows.len(),
                        output.elapsed
                    );
                    batch.metrics.push(StageMetrics::new(
                        &output.stage,
                        rows.len() as u64,
                        output.elapsed,
                    ));
                    batch.insert(output.stage, Arc::new(rows));
                }
                Err(source) => {
                    error!("Stage '{}' failed: {}", output.stage, source);
                    running.abort_all();
                    return Err(PipelineError::stage(&output.stage, &output.stage, source));
                }
            }
        }

        // Report stages in schedule order, not completion order
        batch.metrics.sort_by_key(|m| {
            if m.stage == REFERENCE_STAGE {
                0
            } else {
                order.iter().position(|s| *s == m.stage).map_or(usize::MAX, |p| p + 1)
            }
        });
        info!("Generated {} rows across {} tables", batch.total_rows(), order.len());
        Ok(batch)
    }

    /// Generate the batch and write it to `sink` as one all-or-nothing batch.
    ///
    /// On any error or cancellation the sink is aborted and the returned
    /// failure carries the report of the aborted run.
    pub async fn run(&self, sink: &mut dyn Sink) -> Result<GenerationReport, PipelineFailure> {
        let mut report =
            ReportBuilder::start(self.config.seed, self.config.as_of_date(), sink.name());

        match self.write_batch(sink, &mut report).await {
            Ok(rows_written) => {
                let report = report.finish_success(rows_written);
                info!(
                    "Run {} committed {} rows to {}",
                    report.run_id,
                    report.total_rows(),
                    report.sink
                );
                Ok(report)
            }
            Err(error) => {
                error!("Generation aborted: {}", error);
                if let Err(abort_error) = sink.abort() {
                    error!("Failed to abort sink '{}': {}", sink.name(), abort_error);
                }
                let status = if error.is_cancelled() {
                    RunStatus::Cancelled
                } else {
                    RunStatus::Failed
                };
                let report = report.finish_failure(status, error.to_string());
                Err(PipelineFailure {
                    error,
                    report: Box::new(report),
                })
            }
        }
    }

    async fn write_batch(
        &self,
        sink: &mut dyn Sink,
        report: &mut ReportBuilder,
    ) -> Result<BTreeMap<String, u64>, PipelineError> {
        sink.begin(&report.run_id().to_string())?;
        let batch = self.generate().await?;
        report.stages(batch.metrics.clone());

        for (table, rows) in batch.iter() {
            if !self.is_selected(table) {
                debug!("Skipping ancestor table '{}'", table);
                continue;
            }
            self.check_cancelled(table)?;
            let definition = self
                .schema
                .get_table(table)
                .ok_or_else(|| PipelineError::UnknownTable(table.to_string()))?;
            let written = sink.write(definition, rows)?;
            debug!("Wrote {} rows of '{}'", written, table);
        }

        if self.config.include_projections {
            self.write_projections(&batch, sink, report)?;
        }

        self.check_cancelled("commit")?;
        let summary = sink.commit()?;
        Ok(summary.rows_written)
    }

    fn write_projections(
        &self,
        batch: &GeneratedBatch,
        sink: &mut dyn Sink,
        report: &mut ReportBuilder,
    ) -> Result<(), PipelineError> {
        for violation in self.contract.check(&self.schema) {
            warn!("Reporting contract: {}", violation);
            report.warn(format!("reporting contract: {violation}"));
        }

        for name in self.contract.satisfied(&self.schema) {
            self.check_cancelled(name)?;
            match projection::build(name, batch) {
                Some(projection) => {
                    let written = sink.write(&projection.table, &projection.rows)?;
                    info!("Projection '{}' built: {} rows", name, written);
                    report.projection(name);
                }
                None => {
                    let message = format!(
                        "projection '{name}' skipped: input tables were not generated"
                    );
                    warn!("{}", message);
                    report.warn(message);
                }
            }
        }
        Ok(())
    }
}
