//! labgen: a seeded generator of synthetic relational SaaS datasets.
//!
//! The binary wires three commands onto the workspace crates:
//!
//! - `generate` - run the pipeline and write the batch to a sink
//! - `validate` - check a schema and the reporting contract
//! - `schema` - print the built-in schema
//!
//! # Crates
//!
//! - `labgen_core` - values, catalogs, weighted sampler, declarative schema
//! - `labgen_generator` - seeded entity generator and constraint pass
//! - `labgen_sink` - staged JSONL / CSV / SQL / memory sinks
//! - `labgen_pipeline` - stage scheduler, report, projections, contract
//!
//! # CLI Usage
//!
//! ```bash
//! # Lab dataset with 10 customers as JSON Lines
//! labgen generate --seed 42 --customers 10 --out ./out
//!
//! # CSV with reporting projections and a JSON report
//! labgen generate --out csv:./warehouse --include-projections --report run.json
//!
//! # Check a custom schema
//! labgen validate --schema my_schema.yaml
//! ```

pub mod args;
pub mod generate;
pub mod schema;

pub use args::{GenerateArgs, ValidateArgs};
pub use generate::run_generate;
pub use schema::{load_schema, run_schema, run_validate};
