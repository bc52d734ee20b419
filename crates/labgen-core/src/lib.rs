//! Core types for the labgen synthetic dataset generator.
//!
//! This crate provides the foundational types used by every other labgen
//! crate:
//!
//! - [`FieldType`] - Column types, with [`ToDdl`] for SQL dialects
//! - [`Value`] / [`Row`] - Generated scalars and rows
//! - [`WeightedSampler`] - Weighted categorical sampling
//! - [`Catalogs`] - Compiled reference-data catalogs
//! - [`GeneratorSchema`] - Declarative table/field schema loaded from YAML
//!
//! # Architecture
//!
//! ```text
//! labgen-core (this crate)
//!    │
//!    ├─── labgen-generator  (turns a schema into rows)
//!    ├─── labgen-sink       (writes rows as JSONL / CSV / SQL)
//!    └─── labgen-pipeline   (schedules generation stages, reports)
//! ```
//!
//! # Example
//!
//! ```rust
//! use labgen_core::GeneratorSchema;
//!
//! let schema = GeneratorSchema::builtin().unwrap();
//! assert!(schema.get_table("customers").is_some());
//! ```

pub mod catalog;
pub mod pattern;
pub mod sampler;
pub mod schema;
pub mod types;
pub mod values;

// Re-exports for convenience
pub use catalog::{Catalog, CatalogDefinition, CatalogEntry, CatalogError, Catalogs};
pub use sampler::{SamplerError, WeightedSampler};
pub use schema::{
    Anchor, Cardinality, Constraint, CountRange, DateBound, FieldDefinition, FieldRef,
    GeneratorConfig, GeneratorSchema, ParentLink, Repair, RowFilter, SchemaError, Scope,
    TableDefinition, Threshold, WeightedChoice, WeightedTerm,
};
pub use types::{FieldType, ToDdl};
pub use values::{fixed_scale, Row, Value, DATE_FORMAT};
