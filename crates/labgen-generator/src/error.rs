//! Generator error types.

use labgen_core::{CatalogError, SamplerError};

/// Error type for generator operations.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// Table not found in schema
    #[error("Table not found: {0}")]
    UnknownTable(String),

    /// A catalog or inline weighted choice list cannot be sampled
    #[error("Invalid catalog '{catalog}': {reason}")]
    InvalidCatalog { catalog: String, reason: String },

    /// A child table was requested before its parent was generated
    #[error("Table '{table}' depends on '{parent}', which has not been generated")]
    DependencyMissing { table: String, parent: String },

    /// A generated row breaks a declared invariant
    #[error("Constraint '{constraint}' violated in table '{table}' at row {row}: {detail}")]
    ConstraintViolation {
        table: String,
        constraint: String,
        row: String,
        detail: String,
    },

    /// A field rule could not produce a value
    #[error("Cannot generate '{table}.{field}': {reason}")]
    Field {
        table: String,
        field: String,
        reason: String,
    },
}

impl From<CatalogError> for GeneratorError {
    fn from(err: CatalogError) -> Self {
        let catalog = match &err {
            CatalogError::InvalidCatalog { catalog, .. }
            | CatalogError::InvalidEntry { catalog, .. } => catalog.clone(),
        };
        GeneratorError::InvalidCatalog {
            catalog,
            reason: err.to_string(),
        }
    }
}

/// Failure of a single value rule, before table/field context is attached.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Inline weighted choices cannot be sampled
    #[error("invalid weighted choices: {0}")]
    InvalidChoices(SamplerError),

    /// Named catalog missing from the compiled set
    #[error("catalog '{0}' is not loaded")]
    MissingCatalog(String),

    /// Any other rule failure
    #[error("{0}")]
    Other(String),
}

impl From<String> for RuleError {
    fn from(message: String) -> Self {
        RuleError::Other(message)
    }
}

impl RuleError {
    /// Attach table and field context.
    pub fn in_field(self, table: &str, field: &str) -> GeneratorError {
        match self {
            RuleError::InvalidChoices(reason) => GeneratorError::InvalidCatalog {
                catalog: format!("{table}.{field}"),
                reason: reason.to_string(),
            },
            RuleError::MissingCatalog(catalog) => GeneratorError::InvalidCatalog {
                catalog,
                reason: "catalog is not loaded".to_string(),
            },
            RuleError::Other(reason) => GeneratorError::Field {
                table: table.to_string(),
                field: field.to_string(),
                reason,
            },
        }
    }
}
