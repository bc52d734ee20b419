//! Consumer contract of the reporting views.
//!
//! Reporting consumers query a handful of tables by `customer_id`. A
//! [`ReportingContract`] lists what each projection reads so a schema can be
//! checked before any rows are generated.

use crate::error::PipelineError;
use labgen_core::{FieldType, GeneratorSchema};
use serde::Serialize;
use std::fmt;

/// Projection that summarises each customer
pub const CUSTOMER_360: &str = "customer_360";
/// Projection that summarises revenue per segment
pub const REVENUE_SUMMARY: &str = "revenue_summary";

/// What kind of column a consumer expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Any,
    Text,
    Numeric,
    Date,
}

impl FieldKind {
    fn accepts(self, field_type: &FieldType) -> bool {
        match self {
            FieldKind::Any => true,
            FieldKind::Text => field_type.is_textual(),
            FieldKind::Numeric => field_type.is_numeric(),
            FieldKind::Date => matches!(field_type, FieldType::Date),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Any => write!(f, "any"),
            FieldKind::Text => write!(f, "text"),
            FieldKind::Numeric => write!(f, "numeric"),
            FieldKind::Date => write!(f, "date"),
        }
    }
}

/// Fields a projection needs from one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRequirement {
    pub table: String,
    pub fields: Vec<(String, FieldKind)>,
}

impl TableRequirement {
    fn new(table: &str, fields: &[(&str, FieldKind)]) -> Self {
        Self {
            table: table.to_string(),
            fields: fields
                .iter()
                .map(|(name, kind)| (name.to_string(), *kind))
                .collect(),
        }
    }
}

/// The tables and fields one projection reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionRequirements {
    pub projection: String,
    pub tables: Vec<TableRequirement>,
}

/// One unmet requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractViolation {
    pub projection: String,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub reason: String,
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(
                f,
                "{}: {}.{} {}",
                self.projection, self.table, field, self.reason
            ),
            None => write!(f, "{}: {} {}", self.projection, self.table, self.reason),
        }
    }
}

/// Requirements of every reporting projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportingContract {
    pub projections: Vec<ProjectionRequirements>,
}

impl Default for ReportingContract {
    fn default() -> Self {
        use FieldKind::*;

        let customers = TableRequirement::new(
            "customers",
            &[
                ("customer_id", Text),
                ("company_name", Text),
                ("segment", Text),
                ("status", Text),
            ],
        );
        let subscriptions = TableRequirement::new(
            "subscriptions",
            &[
                ("customer_id", Text),
                ("status", Text),
                ("mrr_amount", Numeric),
                ("arr_amount", Numeric),
            ],
        );

        Self {
            projections: vec![
                ProjectionRequirements {
                    projection: CUSTOMER_360.to_string(),
                    tables: vec![
                        customers.clone(),
                        subscriptions.clone(),
                        TableRequirement::new("users", &[("customer_id", Text), ("status", Text)]),
                        TableRequirement::new(
                            "health_scores",
                            &[
                                ("customer_id", Text),
                                ("snapshot_date", Date),
                                ("overall_score", Numeric),
                                ("churn_risk", Text),
                            ],
                        ),
                        TableRequirement::new(
                            "support_tickets",
                            &[("customer_id", Text), ("created_date", Date)],
                        ),
                    ],
                },
                ProjectionRequirements {
                    projection: REVENUE_SUMMARY.to_string(),
                    tables: vec![customers, subscriptions],
                },
            ],
        }
    }
}

impl ReportingContract {
    /// Every requirement `schema` does not meet.
    pub fn check(&self, schema: &GeneratorSchema) -> Vec<ContractViolation> {
        let mut violations = Vec::new();
        for projection in &self.projections {
            violations.extend(Self::check_projection(projection, schema));
        }
        violations
    }

    /// Fail with every violation when `schema` does not meet the contract.
    pub fn ensure(&self, schema: &GeneratorSchema) -> Result<(), PipelineError> {
        let violations = self.check(schema);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Contract(violations))
        }
    }

    /// Projections whose requirements `schema` meets.
    pub fn satisfied(&self, schema: &GeneratorSchema) -> Vec<&str> {
        self.projections
            .iter()
            .filter(|p| Self::check_projection(p, schema).is_empty())
            .map(|p| p.projection.as_str())
            .collect()
    }

    /// Tables a projection reads.
    pub fn tables_of(&self, projection: &str) -> Vec<&str> {
        self.projections
            .iter()
            .filter(|p| p.projection == projection)
            .flat_map(|p| p.tables.iter().map(|t| t.table.as_str()))
            .collect()
    }

    fn check_projection(
        projection: &ProjectionRequirements,
        schema: &GeneratorSchema,
    ) -> Vec<ContractViolation> {
        let violation = |table: &str, field: Option<&str>, reason: String| ContractViolation {
            projection: projection.projection.clone(),
            table: table.to_string(),
            field: field.map(str::to_string),
            reason,
        };

        let mut violations = Vec::new();
        for requirement in &projection.tables {
            let Some(table) = schema.get_table(&requirement.table) else {
                violations.push(violation(&requirement.table, None, "is missing".to_string()));
                continue;
            };
            for (field, kind) in &requirement.fields {
                match table.get_field_type(field) {
                    None => violations.push(violation(
                        &table.name,
                        Some(field),
                        "is missing".to_string(),
                    )),
                    Some(field_type) if !kind.accepts(field_type) => violations.push(violation(
                        &table.name,
                        Some(field),
                        format!("must be {kind}, found {field_type:?}"),
                    )),
                    Some(_) => {}
                }
            }
        }
        violations
    }
}
