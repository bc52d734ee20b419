//! Entity generator for the labgen synthetic dataset generator.
//!
//! This crate provides the `EntityGenerator`, which produces the rows of one
//! table at a time from a declarative [`GeneratorSchema`](labgen_core::GeneratorSchema).
//! Generation is deterministic: the same schema, context and seed always
//! produce the same rows.
//!
//! # Architecture
//!
//! ```text
//! GeneratorSchema (YAML)      parent rows
//!        │                        │
//!        ▼                        ▼
//! ┌──────────────────────────────────────┐
//! │            EntityGenerator           │
//! │                                      │
//! │  plan rows (cardinality, periods)    │
//! │  generate fields in declared order   │
//! │  coerce to field types               │
//! │  constraint pass (check / clamp)     │
//! └──────────────────┬───────────────────┘
//!                    │
//!                    ▼
//!        Row { table, index, fields }
//! ```
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use labgen_core::GeneratorSchema;
//! use labgen_generator::{EntityGenerator, GenerationContext};
//!
//! let schema = GeneratorSchema::builtin().unwrap();
//! let context = GenerationContext::new(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap())
//!     .with_row_count("customers", 5);
//! let generator = EntityGenerator::from_schema(schema, context).unwrap();
//!
//! let customers = generator.generate_table_seeded("customers", None, 42).unwrap();
//! let users = generator
//!     .generate_table_seeded("users", Some(customers.as_slice()), 42)
//!     .unwrap();
//! assert_eq!(customers.len(), 5);
//! assert!(users.len() >= 10);
//! ```
//!
//! # Generators
//!
//! - `sequence` - Zero-padded identifiers (`CUST-000001`)
//! - `pattern` - Strings with placeholders (`{index}`, `{rand:N}`, `{field}`, `{pick:catalog}`)
//! - `int_range` / `float_range` / `decimal_range` - Uniform numbers
//! - `weighted_bool`, `one_of`, `weighted` - Random picks
//! - `catalog` - Catalog columns, consistent within a row per draw key
//! - `date_between`, `period` - Dates relative to anchors
//! - `copy`, `first_child`, `switch`, `maybe` - Structural rules
//! - `weighted_sum`, `bucket`, `discount` - Values derived from earlier fields
//! - `static`, `null` - Constants

pub mod constraints;
pub mod error;
pub mod generator;
pub mod generators;

// Re-exports for convenience
pub use constraints::ConstraintOutcome;
pub use error::{GeneratorError, RuleError};
pub use generator::{stage_seed, EntityGenerator, GenerationContext};
