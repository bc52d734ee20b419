//! Output sinks for the labgen synthetic dataset generator.
//!
//! Every sink implements [`Sink`]: a batch is opened with `begin`, filled
//! with `write(table, rows)` calls and then either published with `commit`
//! or discarded with `abort`. File sinks stage their output in a hidden
//! directory and rename files into place on commit, so a failed run never
//! leaves partial files behind.
//!
//! # Example
//!
//! ```rust,no_run
//! use labgen_sink::{Sink, SinkTarget};
//!
//! let target: SinkTarget = "csv:./out".parse().unwrap();
//! let mut sink = target.build();
//! sink.begin("batch-1").unwrap();
//! // sink.write(&table, &rows)?;
//! let summary = sink.commit().unwrap();
//! println!("{} rows", summary.total_rows());
//! ```

pub mod convert;
pub mod csv;
pub mod error;
pub mod jsonl;
pub mod memory;
pub mod sink;
pub mod sql;
pub mod staging;
pub mod target;

pub use crate::csv::CsvSink;
pub use error::SinkError;
pub use jsonl::JsonlSink;
pub use memory::MemorySink;
pub use sink::{Sink, SinkSummary};
pub use sql::{AnsiDdl, SqlSink};
pub use target::SinkTarget;
