//! `generate` command handler.

use crate::args::GenerateArgs;
use crate::schema::load_schema;
use anyhow::Context;
use labgen_pipeline::{GenerationPipeline, GenerationReport};
use labgen_sink::SinkTarget;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;

fn write_report(report: &GenerationReport, path: &Path) -> anyhow::Result<()> {
    report
        .write_json(path)
        .with_context(|| format!("Failed to write report to {path:?}"))?;
    info!("Report written to {}", path.display());
    Ok(())
}

/// Run the generate command.
///
/// The batch is committed only when every stage and write succeeds; on
/// failure or cancellation nothing is published and the error is returned.
pub async fn run_generate(
    args: &GenerateArgs,
    cancel: CancellationToken,
) -> anyhow::Result<GenerationReport> {
    let schema = load_schema(args.schema.as_deref())?;
    let config = args.resolve_config()?;
    let target: SinkTarget = if args.dry_run {
        SinkTarget::Memory
    } else {
        args.out
            .parse()
            .with_context(|| format!("Invalid --out target '{}'", args.out))?
    };

    info!(
        "Generating dataset (seed={}, customers={}, leads={}) into {}",
        config.seed, config.customers, config.leads, target
    );

    let pipeline = GenerationPipeline::new(schema, config)
        .context("Invalid generation settings")?
        .with_cancellation(cancel);
    let mut sink = target.build();

    match pipeline.run(sink.as_mut()).await {
        Ok(report) => {
            if let Some(path) = &args.report {
                write_report(&report, path)?;
            }
            println!("{}", report.summary());
            Ok(report)
        }
        Err(failure) => {
            if let Some(path) = &args.report {
                write_report(&failure.report, path)?;
            }
            eprintln!("{}", failure.report.summary());
            Err(anyhow::Error::new(failure.error)).context("Generation failed; nothing was written")
        }
    }
}
