//! Command-line interface for labgen
//!
//! # Usage Examples
//!
//! ```bash
//! # Default lab dataset (500 customers) as JSONL in ./out
//! labgen generate --seed 42
//!
//! # Fixed "today", SQL load scripts, only two tables
//! labgen generate --as-of 2024-06-30 --tables customers,subscriptions --out sql:./load
//!
//! # Count rows without writing anything
//! labgen generate --customers 50 --dry-run
//! ```
//!
//! Exit code 0 on success, 1 on any failure. Ctrl+C cancels the run between
//! stages and discards the batch.

use clap::{Parser, Subcommand};
use labgen::{run_generate, run_schema, run_validate, GenerateArgs, ValidateArgs};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "labgen")]
#[command(about = "Generate seeded synthetic relational SaaS datasets")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a dataset and write it to a sink
    Generate(GenerateArgs),

    /// Validate a schema against the generator and reporting contract
    Validate(ValidateArgs),

    /// Print the built-in schema as YAML
    Schema,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => {
            let cancel = setup_shutdown_handler();
            run_generate(&args, cancel).await?;
        }
        Commands::Validate(args) => {
            print!("{}", run_validate(&args)?);
        }
        Commands::Schema => {
            print!("{}", run_schema());
        }
    }

    Ok(())
}

/// Cancel the returned token on Ctrl+C.
fn setup_shutdown_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!(
                    "Received interrupt signal (Ctrl+C); cancelling after the current stage"
                );
                cancel.cancel();
            }
            Err(e) => tracing::error!("Failed to install Ctrl+C handler: {}", e),
        }
    });

    token
}
