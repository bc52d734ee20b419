//! Declarative generation schema.
//!
//! A schema lists reference catalogs and entity tables. Each table declares
//! its parent (if any), how many rows to produce per parent, a rule for
//! every field, and invariants checked after generation. Adding an entity
//! means adding a table block, not code.
//!
//! ## Type Hierarchy
//!
//! - `GeneratorSchema` - catalogs plus tables, loaded from YAML
//! - `TableDefinition` - one entity: parent link, cardinality, fields, constraints
//! - `FieldDefinition` - one column with its `GeneratorConfig`
//! - `GeneratorConfig` - the rule producing a field value

use crate::catalog::{CatalogDefinition, DEFAULT_COLUMN};
use crate::pattern::{parse_pattern, pattern_catalogs, pattern_references};
use crate::sampler::WeightedSampler;
use crate::types::FieldType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Built-in schema reproducing the hands-on lab dataset.
const BUILTIN_SCHEMA: &str = include_str!("../schemas/saas_lab.yaml");

// ============================================================================
// Error Types
// ============================================================================

/// Error type for schema operations.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Error reading schema file
    #[error("Failed to read schema file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Table not found in schema
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Field not found in table schema
    #[error("Field '{field}' not found in table '{table}'")]
    FieldNotFound { table: String, field: String },

    /// Two tables share a name
    #[error("Duplicate table: {0}")]
    DuplicateTable(String),

    /// Two catalogs share a name
    #[error("Duplicate catalog: {0}")]
    DuplicateCatalog(String),

    /// Two fields of one table share a name
    #[error("Duplicate field '{field}' in table '{table}'")]
    DuplicateField { table: String, field: String },

    /// Parent table does not exist
    #[error("Table '{table}' references unknown parent table '{parent}'")]
    UnknownParent { table: String, parent: String },

    /// Catalog does not exist
    #[error("Field '{table}.{field}' references unknown catalog '{catalog}'")]
    UnknownCatalog {
        table: String,
        field: String,
        catalog: String,
    },

    /// Catalog exists but has no such column
    #[error("Field '{table}.{field}' references unknown column '{column}' of catalog '{catalog}'")]
    UnknownCatalogColumn {
        table: String,
        field: String,
        catalog: String,
        column: String,
    },

    /// Reference to a field that is not declared earlier in the row
    #[error("Field '{table}.{field}' references '{reference}', which is not declared before it")]
    ForwardReference {
        table: String,
        field: String,
        reference: String,
    },

    /// Generator rule is malformed or unusable in this position
    #[error("Invalid generator for '{table}.{field}': {reason}")]
    InvalidGenerator {
        table: String,
        field: String,
        reason: String,
    },

    /// Row cardinality is malformed or unusable for this table
    #[error("Invalid row cardinality for table '{table}': {reason}")]
    InvalidCardinality { table: String, reason: String },

    /// Constraint is malformed
    #[error("Invalid constraint on table '{table}': {reason}")]
    InvalidConstraint { table: String, reason: String },

    /// Parent links form a cycle
    #[error("Dependency cycle between tables: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

// ============================================================================
// References
// ============================================================================

/// Where a referenced field lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Earlier field of the row being generated
    Row,
    /// Field of the parent row
    Parent,
}

/// Reference to a field, written `name` or `parent.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldRef {
    /// Row or parent
    pub scope: Scope,
    /// Field name
    pub field: String,
}

impl FieldRef {
    /// Reference to a field of the current row.
    pub fn row(field: impl Into<String>) -> Self {
        Self {
            scope: Scope::Row,
            field: field.into(),
        }
    }

    /// Reference to a field of the parent row.
    pub fn parent(field: impl Into<String>) -> Self {
        Self {
            scope: Scope::Parent,
            field: field.into(),
        }
    }
}

impl FromStr for FieldRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scope, field) = match s.split_once('.') {
            Some(("parent", field)) => (Scope::Parent, field),
            Some((prefix, _)) => return Err(format!("unknown reference scope '{prefix}' in '{s}'")),
            None => (Scope::Row, s),
        };
        if field.is_empty() || field.contains('.') {
            return Err(format!("invalid field reference '{s}'"));
        }
        Ok(Self {
            scope,
            field: field.to_string(),
        })
    }
}

impl TryFrom<String> for FieldRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldRef> for String {
    fn from(value: FieldRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Scope::Row => f.write_str(&self.field),
            Scope::Parent => write!(f, "parent.{}", self.field),
        }
    }
}

/// Date a relative date is measured from: `as_of`, `period`, or a field reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Anchor {
    /// The run's reference date ("today")
    AsOf,
    /// The period (day or week start) a time-series row belongs to
    Period,
    /// A date field
    Field(FieldRef),
}

impl FromStr for Anchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "as_of" | "today" => Ok(Anchor::AsOf),
            "period" => Ok(Anchor::Period),
            other => other.parse().map(Anchor::Field),
        }
    }
}

impl TryFrom<String> for Anchor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Anchor> for String {
    fn from(value: Anchor) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::AsOf => f.write_str("as_of"),
            Anchor::Period => f.write_str("period"),
            Anchor::Field(field) => field.fmt(f),
        }
    }
}

/// An anchor shifted by a number of days.
///
/// Written either as a bare anchor (`parent.created_date`) or as a map
/// (`{ anchor: as_of, offset_days: -1095 }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DateBoundRepr")]
pub struct DateBound {
    /// Base date
    pub anchor: Anchor,
    /// Days added to the anchor
    #[serde(default)]
    pub offset_days: i64,
}

impl DateBound {
    /// Bound at the anchor itself.
    pub fn at(anchor: Anchor) -> Self {
        Self {
            anchor,
            offset_days: 0,
        }
    }

    /// Bound shifted from the anchor.
    pub fn offset(anchor: Anchor, offset_days: i64) -> Self {
        Self {
            anchor,
            offset_days,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DateBoundRepr {
    Anchor(Anchor),
    Full {
        anchor: Anchor,
        #[serde(default)]
        offset_days: i64,
    },
}

impl From<DateBoundRepr> for DateBound {
    fn from(repr: DateBoundRepr) -> Self {
        match repr {
            DateBoundRepr::Anchor(anchor) => DateBound::at(anchor),
            DateBoundRepr::Full {
                anchor,
                offset_days,
            } => DateBound::offset(anchor, offset_days),
        }
    }
}

// ============================================================================
// Field Generators
// ============================================================================

/// Weighted choice for the `weighted` generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightedChoice {
    /// Value produced when chosen
    pub value: serde_yaml::Value,
    /// Relative weight
    pub weight: f64,
}

/// Term of a `weighted_sum`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightedTerm {
    /// Numeric field
    pub field: FieldRef,
    /// Multiplier
    pub weight: f64,
}

/// Step of a `bucket` rule: values `>= min` get `label`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Threshold {
    /// Inclusive lower bound
    pub min: f64,
    /// Label assigned
    pub label: String,
}

/// Generator configuration for a field.
///
/// This enum defines the rules available for producing field values.
/// Rules that read other fields (`copy`, `switch`, `weighted_sum`, `bucket`,
/// `discount`, `pattern`) see the values already generated for the row;
/// they never re-draw them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneratorConfig {
    /// Zero-padded sequential identifiers, e.g. `CUST-000001`
    Sequence {
        /// Text before the number
        #[serde(default)]
        prefix: String,
        /// Minimum digit count
        #[serde(default = "default_sequence_width")]
        width: usize,
        /// First number
        #[serde(default = "default_sequence_start")]
        start: u64,
    },

    /// String built from a pattern with placeholders
    Pattern {
        /// Pattern string (see [`crate::pattern`])
        pattern: String,
    },

    /// Uniform integer in `[min, max]`
    IntRange {
        /// Minimum value (inclusive)
        min: i64,
        /// Maximum value (inclusive)
        max: i64,
    },

    /// Uniform float in `[min, max]`
    FloatRange {
        /// Minimum value (inclusive)
        min: f64,
        /// Maximum value (inclusive)
        max: f64,
        /// Round to this many decimals
        #[serde(default)]
        decimals: Option<u32>,
    },

    /// Uniform exact decimal in `[min, max]`
    DecimalRange {
        /// Minimum value (inclusive)
        min: f64,
        /// Maximum value (inclusive)
        max: f64,
        /// Digits after the decimal point
        #[serde(default = "default_decimal_scale")]
        scale: u32,
    },

    /// Boolean that is true with the given probability
    WeightedBool {
        /// Probability of true (0.0 to 1.0)
        true_weight: f64,
    },

    /// Uniform pick from a list of values
    OneOf {
        /// Pool of values to select from
        values: Vec<serde_yaml::Value>,
    },

    /// Weighted pick from a list of values
    Weighted {
        /// Choices with weights
        choices: Vec<WeightedChoice>,
    },

    /// Column of a catalog entry
    ///
    /// Catalog fields of one row sharing a draw key (by default the catalog
    /// name) read the same entry, so product/tier/price stay consistent.
    Catalog {
        /// Catalog name
        catalog: String,
        /// Column to read
        #[serde(default = "default_catalog_column")]
        column: String,
        /// Draw key; fields with different keys draw independently
        #[serde(default)]
        draw: Option<String>,
    },

    /// Uniform date between two bounds (inclusive); `from` when `to < from`
    DateBetween {
        /// Lower bound
        from: DateBound,
        /// Upper bound
        to: DateBound,
    },

    /// Date of the period a time-series row belongs to
    Period,

    /// Copy of another field
    Copy {
        /// Source field
        from: FieldRef,
    },

    /// True for the first child of each parent, false otherwise
    FirstChild,

    /// Rule chosen by the value of another field
    Switch {
        /// Field whose value selects the case
        on: FieldRef,
        /// Rule per value
        cases: BTreeMap<String, GeneratorConfig>,
        /// Rule when no case matches
        #[serde(default = "default_null_generator")]
        default: Box<GeneratorConfig>,
    },

    /// Inner rule with the given probability, null otherwise
    Maybe {
        /// Probability the value is present
        probability: f64,
        /// Rule used when present
        generator: Box<GeneratorConfig>,
    },

    /// Sum of weighted numeric fields
    WeightedSum {
        /// Terms of the sum
        terms: Vec<WeightedTerm>,
        /// Round to the nearest integer
        #[serde(default)]
        round: bool,
    },

    /// Label from ordered thresholds over a numeric field
    Bucket {
        /// Numeric field
        field: FieldRef,
        /// Thresholds, checked in order
        thresholds: Vec<Threshold>,
        /// Label when no threshold matches
        default: String,
    },

    /// `base * multiplier * (1 - percent / 100)`, rounded to cents
    Discount {
        /// Price field
        base: FieldRef,
        /// Discount percentage field
        percent: FieldRef,
        /// Extra multiplier (12 for annual amounts)
        #[serde(default = "default_multiplier")]
        multiplier: f64,
    },

    /// Static value
    Static {
        /// The static value to use
        value: serde_yaml::Value,
    },

    /// Always null
    Null,
}

fn default_sequence_width() -> usize {
    6
}

fn default_sequence_start() -> u64 {
    1
}

fn default_decimal_scale() -> u32 {
    2
}

fn default_catalog_column() -> String {
    DEFAULT_COLUMN.to_string()
}

fn default_null_generator() -> Box<GeneratorConfig> {
    Box::new(GeneratorConfig::Null)
}

fn default_multiplier() -> f64 {
    1.0
}

impl GeneratorConfig {
    /// Visit this rule and every nested rule.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a GeneratorConfig)) {
        f(self);
        match self {
            GeneratorConfig::Switch { cases, default, .. } => {
                for case in cases.values() {
                    case.visit(f);
                }
                default.visit(f);
            }
            GeneratorConfig::Maybe { generator, .. } => generator.visit(f),
            _ => {}
        }
    }

    /// Field references read directly by this rule (not nested rules).
    pub fn direct_references(&self) -> Result<Vec<FieldRef>, String> {
        Ok(match self {
            GeneratorConfig::Pattern { pattern } => {
                let parts = parse_pattern(pattern)?;
                pattern_references(&parts).cloned().collect()
            }
            GeneratorConfig::DateBetween { from, to } => [&from.anchor, &to.anchor]
                .into_iter()
                .filter_map(|a| match a {
                    Anchor::Field(f) => Some(f.clone()),
                    _ => None,
                })
                .collect(),
            GeneratorConfig::Copy { from } => vec![from.clone()],
            GeneratorConfig::Switch { on, .. } => vec![on.clone()],
            GeneratorConfig::WeightedSum { terms, .. } => {
                terms.iter().map(|t| t.field.clone()).collect()
            }
            GeneratorConfig::Bucket { field, .. } => vec![field.clone()],
            GeneratorConfig::Discount { base, percent, .. } => vec![base.clone(), percent.clone()],
            _ => Vec::new(),
        })
    }

    /// Whether this rule (or a nested one) uses the time-series period.
    pub fn uses_period(&self) -> bool {
        let mut uses = false;
        self.visit(&mut |g| match g {
            GeneratorConfig::Period => uses = true,
            GeneratorConfig::DateBetween { from, to } => {
                if from.anchor == Anchor::Period || to.anchor == Anchor::Period {
                    uses = true;
                }
            }
            _ => {}
        });
        uses
    }
}

// ============================================================================
// Tables
// ============================================================================

/// Inclusive range of child rows per parent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountRange {
    /// Minimum rows
    pub min: u64,
    /// Maximum rows
    pub max: u64,
}

/// How many rows a table produces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Cardinality {
    /// Fixed row count (root tables only)
    Fixed {
        /// Number of rows
        count: u64,
    },

    /// Uniform count per parent row
    PerParent {
        /// Minimum per parent
        min: u64,
        /// Maximum per parent
        max: u64,
    },

    /// Count range chosen by a parent field value
    PerParentBy {
        /// Parent field selecting the range
        on: String,
        /// Range per value
        cases: BTreeMap<String, CountRange>,
        /// Range when no case matches
        default: CountRange,
    },

    /// Zero or one row per parent
    Chance {
        /// Probability of one row
        probability: f64,
    },

    /// One row per parent per day in a trailing window, kept with `density`
    Daily {
        /// Window length in days, ending at `as_of`
        days: u32,
        /// Probability each day has a row
        #[serde(default = "default_density")]
        density: f64,
        /// Parent date field; earlier days are skipped
        #[serde(default)]
        not_before: Option<String>,
    },

    /// One row per parent per week in a trailing window
    Weekly {
        /// Window length in weeks, ending with the week containing `as_of`
        weeks: u32,
        /// Parent date field; earlier weeks are skipped
        #[serde(default)]
        not_before: Option<String>,
    },
}

fn default_density() -> f64 {
    1.0
}

impl Cardinality {
    /// Whether rows are expanded over time periods.
    pub fn is_time_series(&self) -> bool {
        matches!(self, Cardinality::Daily { .. } | Cardinality::Weekly { .. })
    }
}

/// Row filter on parent rows: keep rows whose `field` is one of `values`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RowFilter {
    /// Field to test
    pub field: String,
    /// Accepted values (compared as text)
    #[serde(rename = "in")]
    pub values: Vec<String>,
}

/// Link from a child table to its parent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParentLink {
    /// Parent table name
    pub table: String,
    /// Child field holding the parent's primary key
    pub foreign_key: String,
    /// Only generate children for parent rows passing this filter
    #[serde(default)]
    pub filter: Option<RowFilter>,
}

/// What to do when a date constraint is violated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Repair {
    /// Abort the batch
    #[default]
    Fail,
    /// Move the offending date onto the bound
    Clamp,
}

/// Invariant checked on every generated row (or group of rows).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Constraint {
    /// Non-null fields must be non-decreasing (increasing when `strict`)
    Ordered {
        /// Fields in expected order
        fields: Vec<String>,
        /// Require strictly increasing values
        #[serde(default)]
        strict: bool,
        /// Violation handling
        #[serde(default)]
        repair: Repair,
    },

    /// Date field must not precede the anchor
    NotBefore {
        /// Checked field
        field: String,
        /// Lower bound
        anchor: Anchor,
        /// Violation handling
        #[serde(default)]
        repair: Repair,
    },

    /// Date field must not follow the anchor
    NotAfter {
        /// Checked field
        field: String,
        /// Upper bound
        anchor: Anchor,
        /// Violation handling
        #[serde(default)]
        repair: Repair,
    },

    /// Exactly one row per parent has this boolean field set
    ExactlyOnePerParent {
        /// Boolean field
        field: String,
    },
}

impl Constraint {
    /// Short human-readable description.
    pub fn describe(&self) -> String {
        match self {
            Constraint::Ordered { fields, strict, .. } => {
                let op = if *strict { " < " } else { " <= " };
                fields.join(op)
            }
            Constraint::NotBefore { field, anchor, .. } => format!("{field} >= {anchor}"),
            Constraint::NotAfter { field, anchor, .. } => format!("{field} <= {anchor}"),
            Constraint::ExactlyOnePerParent { field } => {
                format!("exactly one {field} per parent")
            }
        }
    }

    fn fields(&self) -> Vec<&str> {
        match self {
            Constraint::Ordered { fields, .. } => fields.iter().map(String::as_str).collect(),
            Constraint::NotBefore { field, .. }
            | Constraint::NotAfter { field, .. }
            | Constraint::ExactlyOnePerParent { field } => vec![field.as_str()],
        }
    }

    fn anchor(&self) -> Option<&Anchor> {
        match self {
            Constraint::NotBefore { anchor, .. } | Constraint::NotAfter { anchor, .. } => {
                Some(anchor)
            }
            _ => None,
        }
    }
}

/// Field with its generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDefinition {
    /// Field name
    pub name: String,

    /// Field type
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Generator configuration for this field
    pub generator: GeneratorConfig,
}

/// One entity table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableDefinition {
    /// Table name
    pub name: String,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Field holding the row identifier
    pub primary_key: String,

    /// Parent table link, for dependent entities
    #[serde(default)]
    pub parent: Option<ParentLink>,

    /// Row cardinality
    pub rows: Cardinality,

    /// Field definitions in generation order
    pub fields: Vec<FieldDefinition>,

    /// Post-generation invariants
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl TableDefinition {
    /// Get a field definition by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Position of a field in generation order.
    pub fn field_position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Get the type of a field by name.
    pub fn get_field_type(&self, name: &str) -> Option<&FieldType> {
        self.get_field(name).map(|f| &f.field_type)
    }

    /// Get all field names.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Name of the parent table, if any.
    pub fn parent_table(&self) -> Option<&str> {
        self.parent.as_ref().map(|p| p.table.as_str())
    }

    /// Whether this table has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

fn default_version() -> u32 {
    1
}

/// Full generation schema.
///
/// Loaded from YAML and validated on load; a `GeneratorSchema` value is
/// always internally consistent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorSchema {
    /// Schema version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Reference catalogs
    #[serde(default)]
    pub catalogs: Vec<CatalogDefinition>,

    /// Table definitions
    pub tables: Vec<TableDefinition>,

    /// Cached table lookup (not serialized)
    #[serde(skip)]
    table_map: HashMap<String, usize>,
}

impl GeneratorSchema {
    /// Build a schema from parts, validating it.
    pub fn new(
        catalogs: Vec<CatalogDefinition>,
        tables: Vec<TableDefinition>,
    ) -> Result<Self, SchemaError> {
        let mut schema = Self {
            version: default_version(),
            catalogs,
            tables,
            table_map: HashMap::new(),
        };
        schema.build_table_map();
        schema.validate()?;
        Ok(schema)
    }

    /// The built-in lab dataset schema.
    pub fn builtin() -> Result<Self, SchemaError> {
        Self::from_yaml(BUILTIN_SCHEMA)
    }

    /// Raw YAML of the built-in schema.
    pub fn builtin_yaml() -> &'static str {
        BUILTIN_SCHEMA
    }

    /// Load schema from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse schema from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let mut schema: GeneratorSchema = serde_yaml::from_str(yaml)?;
        schema.build_table_map();
        schema.validate()?;
        Ok(schema)
    }

    /// Build the internal table lookup map.
    fn build_table_map(&mut self) {
        self.table_map = self
            .tables
            .iter()
            .enumerate()
            .map(|(idx, table)| (table.name.clone(), idx))
            .collect();
    }

    /// Get a table schema by name.
    pub fn get_table(&self, name: &str) -> Option<&TableDefinition> {
        self.table_map
            .get(name)
            .and_then(|&idx| self.tables.get(idx))
    }

    /// Get a mutable table schema by name.
    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut TableDefinition> {
        match self.table_map.get(name) {
            Some(&idx) => self.tables.get_mut(idx),
            None => None,
        }
    }

    /// Get the type of a field in a specific table.
    pub fn get_field_type(&self, table: &str, field: &str) -> Result<&FieldType, SchemaError> {
        let table_schema = self
            .get_table(table)
            .ok_or_else(|| SchemaError::TableNotFound(table.to_string()))?;

        table_schema
            .get_field(field)
            .map(|f| &f.field_type)
            .ok_or_else(|| SchemaError::FieldNotFound {
                table: table.to_string(),
                field: field.to_string(),
            })
    }

    /// Get all table names in the schema.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Tables whose parent is `name`, in declaration order.
    pub fn children_of(&self, name: &str) -> Vec<&TableDefinition> {
        self.tables
            .iter()
            .filter(|t| t.parent_table() == Some(name))
            .collect()
    }

    /// Names of `name` and all its ancestors, root first.
    pub fn lineage(&self, name: &str) -> Result<Vec<String>, SchemaError> {
        let mut chain = Vec::new();
        let mut current = Some(name.to_string());
        while let Some(table_name) = current {
            let table = self
                .get_table(&table_name)
                .ok_or_else(|| SchemaError::TableNotFound(table_name.clone()))?;
            if chain.contains(&table_name) {
                chain.push(table_name);
                chain.reverse();
                return Err(SchemaError::Cycle(chain));
            }
            chain.push(table_name);
            current = table.parent_table().map(str::to_string);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Validate the whole schema.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut catalog_names = HashSet::new();
        for catalog in &self.catalogs {
            if !catalog_names.insert(catalog.name.as_str()) {
                return Err(SchemaError::DuplicateCatalog(catalog.name.clone()));
            }
        }

        let mut table_names = HashSet::new();
        for table in &self.tables {
            if !table_names.insert(table.name.as_str()) {
                return Err(SchemaError::DuplicateTable(table.name.clone()));
            }
        }

        for table in &self.tables {
            self.validate_table(table)?;
        }

        for table in &self.tables {
            self.lineage(&table.name)?;
        }

        Ok(())
    }

    fn validate_table(&self, table: &TableDefinition) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for field in &table.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    table: table.name.clone(),
                    field: field.name.clone(),
                });
            }
        }

        let field_not_found = |field: &str| SchemaError::FieldNotFound {
            table: table.name.clone(),
            field: field.to_string(),
        };

        if table.get_field(&table.primary_key).is_none() {
            return Err(field_not_found(&table.primary_key));
        }

        let parent = match &table.parent {
            Some(link) => {
                if link.table == table.name {
                    return Err(SchemaError::Cycle(vec![table.name.clone(), table.name.clone()]));
                }
                let parent = self.get_table(&link.table).ok_or_else(|| {
                    SchemaError::UnknownParent {
                        table: table.name.clone(),
                        parent: link.table.clone(),
                    }
                })?;
                if table.get_field(&link.foreign_key).is_none() {
                    return Err(field_not_found(&link.foreign_key));
                }
                if let Some(filter) = &link.filter {
                    if parent.get_field(&filter.field).is_none() {
                        return Err(SchemaError::FieldNotFound {
                            table: parent.name.clone(),
                            field: filter.field.clone(),
                        });
                    }
                }
                Some(parent)
            }
            None => None,
        };

        self.validate_cardinality(table, parent)?;

        for (position, field) in table.fields.iter().enumerate() {
            self.validate_field(table, parent, position, field)?;
        }

        for constraint in &table.constraints {
            self.validate_constraint(table, parent, constraint)?;
        }

        Ok(())
    }

    fn validate_cardinality(
        &self,
        table: &TableDefinition,
        parent: Option<&TableDefinition>,
    ) -> Result<(), SchemaError> {
        let invalid = |reason: String| SchemaError::InvalidCardinality {
            table: table.name.clone(),
            reason,
        };
        let check_range = |range: &CountRange| {
            if range.min > range.max {
                Err(invalid(format!("min {} exceeds max {}", range.min, range.max)))
            } else {
                Ok(())
            }
        };
        let check_probability = |p: f64| {
            if (0.0..=1.0).contains(&p) {
                Ok(())
            } else {
                Err(invalid(format!("probability {p} is outside [0, 1]")))
            }
        };
        let check_parent_field = |field: &str| match parent {
            Some(parent) if parent.get_field(field).is_some() => Ok(()),
            Some(parent) => Err(SchemaError::FieldNotFound {
                table: parent.name.clone(),
                field: field.to_string(),
            }),
            None => Err(invalid(format!(
                "'{field}' refers to a parent field but the table has no parent"
            ))),
        };

        match (&table.rows, parent) {
            (Cardinality::Fixed { .. }, None) => Ok(()),
            (Cardinality::Fixed { .. }, Some(_)) => Err(invalid(
                "fixed row counts are only allowed on root tables".to_string(),
            )),
            (_, None) => Err(invalid(
                "per-parent row counts need a parent table".to_string(),
            )),
            (Cardinality::PerParent { min, max }, Some(_)) => check_range(&CountRange {
                min: *min,
                max: *max,
            }),
            (Cardinality::PerParentBy { on, cases, default }, Some(_)) => {
                check_parent_field(on)?;
                for range in cases.values() {
                    check_range(range)?;
                }
                check_range(default)
            }
            (Cardinality::Chance { probability }, Some(_)) => check_probability(*probability),
            (
                Cardinality::Daily {
                    density,
                    not_before,
                    ..
                },
                Some(_),
            ) => {
                check_probability(*density)?;
                not_before.as_deref().map_or(Ok(()), check_parent_field)
            }
            (Cardinality::Weekly { not_before, .. }, Some(_)) => {
                not_before.as_deref().map_or(Ok(()), check_parent_field)
            }
        }
    }

    /// Check that a reference resolves: row references must point to an
    /// earlier field (`before` = position of the referencing field), parent
    /// references need a parent that has the field.
    fn check_reference(
        &self,
        table: &TableDefinition,
        parent: Option<&TableDefinition>,
        field_name: &str,
        before: Option<usize>,
        reference: &FieldRef,
    ) -> Result<(), SchemaError> {
        match reference.scope {
            Scope::Row => {
                let position = table.field_position(&reference.field);
                let resolves = match (position, before) {
                    (Some(p), Some(limit)) => p < limit,
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                if resolves {
                    Ok(())
                } else if position.is_none() {
                    Err(SchemaError::FieldNotFound {
                        table: table.name.clone(),
                        field: reference.field.clone(),
                    })
                } else {
                    Err(SchemaError::ForwardReference {
                        table: table.name.clone(),
                        field: field_name.to_string(),
                        reference: reference.to_string(),
                    })
                }
            }
            Scope::Parent => match parent {
                Some(parent) if parent.get_field(&reference.field).is_some() => Ok(()),
                Some(parent) => Err(SchemaError::FieldNotFound {
                    table: parent.name.clone(),
                    field: reference.field.clone(),
                }),
                None => Err(SchemaError::InvalidGenerator {
                    table: table.name.clone(),
                    field: field_name.to_string(),
                    reason: format!("'{reference}' used on a table without parent"),
                }),
            },
        }
    }

    fn validate_field(
        &self,
        table: &TableDefinition,
        parent: Option<&TableDefinition>,
        position: usize,
        field: &FieldDefinition,
    ) -> Result<(), SchemaError> {
        let invalid = |reason: String| SchemaError::InvalidGenerator {
            table: table.name.clone(),
            field: field.name.clone(),
            reason,
        };

        let mut nodes = Vec::new();
        field.generator.visit(&mut |g| nodes.push(g));

        for node in nodes {
            let references = node.direct_references().map_err(invalid)?;
            for reference in &references {
                self.check_reference(table, parent, &field.name, Some(position), reference)?;
            }

            match node {
                GeneratorConfig::IntRange { min, max } if min > max => {
                    return Err(invalid(format!("min {min} exceeds max {max}")));
                }
                GeneratorConfig::FloatRange { min, max, .. }
                | GeneratorConfig::DecimalRange { min, max, .. }
                    if !(min.is_finite() && max.is_finite() && min <= max) =>
                {
                    return Err(invalid(format!("invalid range [{min}, {max}]")));
                }
                GeneratorConfig::WeightedBool { true_weight: p }
                | GeneratorConfig::Maybe { probability: p, .. }
                    if !(0.0..=1.0).contains(p) =>
                {
                    return Err(invalid(format!("probability {p} is outside [0, 1]")));
                }
                GeneratorConfig::OneOf { values } if values.is_empty() => {
                    return Err(invalid("one_of needs at least one value".to_string()));
                }
                GeneratorConfig::Weighted { choices } => {
                    WeightedSampler::new(choices.iter().map(|c| ((), c.weight)))
                        .map_err(|e| invalid(format!("weighted choices: {e}")))?;
                }
                GeneratorConfig::Catalog {
                    catalog, column, ..
                } => self.check_catalog_column(table, field, catalog, column)?,
                GeneratorConfig::Pattern { pattern } => {
                    let parts = parse_pattern(pattern).map_err(invalid)?;
                    for catalog in pattern_catalogs(&parts) {
                        self.check_catalog_column(table, field, catalog, DEFAULT_COLUMN)?;
                    }
                }
                GeneratorConfig::FirstChild if parent.is_none() => {
                    return Err(invalid("first_child needs a parent table".to_string()));
                }
                GeneratorConfig::WeightedSum { terms, .. } if terms.is_empty() => {
                    return Err(invalid("weighted_sum needs at least one term".to_string()));
                }
                _ => {}
            }
        }

        if field.generator.uses_period() && !table.rows.is_time_series() {
            return Err(invalid(
                "period is only available on daily or weekly tables".to_string(),
            ));
        }

        Ok(())
    }

    fn check_catalog_column(
        &self,
        table: &TableDefinition,
        field: &FieldDefinition,
        catalog: &str,
        column: &str,
    ) -> Result<(), SchemaError> {
        let definition = self
            .catalogs
            .iter()
            .find(|c| c.name == catalog)
            .ok_or_else(|| SchemaError::UnknownCatalog {
                table: table.name.clone(),
                field: field.name.clone(),
                catalog: catalog.to_string(),
            })?;
        if definition.columns().contains(column) {
            Ok(())
        } else {
            Err(SchemaError::UnknownCatalogColumn {
                table: table.name.clone(),
                field: field.name.clone(),
                catalog: catalog.to_string(),
                column: column.to_string(),
            })
        }
    }

    fn validate_constraint(
        &self,
        table: &TableDefinition,
        parent: Option<&TableDefinition>,
        constraint: &Constraint,
    ) -> Result<(), SchemaError> {
        let invalid = |reason: String| SchemaError::InvalidConstraint {
            table: table.name.clone(),
            reason,
        };

        for field in constraint.fields() {
            if table.get_field(field).is_none() {
                return Err(invalid(format!("unknown field '{field}'")));
            }
        }

        match constraint {
            Constraint::Ordered { fields, .. } if fields.len() < 2 => {
                return Err(invalid("ordered needs at least two fields".to_string()));
            }
            Constraint::ExactlyOnePerParent { .. } if parent.is_none() => {
                return Err(invalid(
                    "exactly_one_per_parent needs a parent table".to_string(),
                ));
            }
            _ => {}
        }

        match constraint.anchor() {
            Some(Anchor::Field(reference)) => {
                let owner = constraint.fields().first().copied().unwrap_or_default();
                self.check_reference(table, parent, owner, None, reference)
            }
            Some(Anchor::Period) => Err(invalid(
                "period anchors are not available in constraints".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_SCHEMA: &str = r#"
version: 1
catalogs:
  - name: segments
    entries:
      - { weight: 1, value: Enterprise }
      - { weight: 3, value: SMB }
tables:
  - name: customers
    primary_key: customer_id
    rows: { type: fixed, count: 10 }
    fields:
      - name: customer_id
        type: { type: var_char, length: 20 }
        generator: { type: sequence, prefix: "CUST-", width: 6 }
      - name: segment
        type: text
        generator: { type: catalog, catalog: segments }
      - name: created_date
        type: date
        generator:
          type: date_between
          from: { anchor: as_of, offset_days: -365 }
          to: as_of
  - name: users
    primary_key: user_id
    parent: { table: customers, foreign_key: customer_id }
    rows:
      type: per_parent_by
      on: segment
      cases:
        Enterprise: { min: 8, max: 15 }
      default: { min: 2, max: 5 }
    fields:
      - name: user_id
        type: text
        generator: { type: sequence, prefix: "USER-" }
      - name: customer_id
        type: text
        generator: { type: copy, from: parent.customer_id }
      - name: is_primary_contact
        type: bool
        generator: { type: first_child }
      - name: created_date
        type: date
        generator: { type: date_between, from: parent.created_date, to: as_of }
    constraints:
      - { type: not_before, field: created_date, anchor: parent.created_date }
      - { type: exactly_one_per_parent, field: is_primary_contact }
"#;

    fn replace_in_sample(from: &str, to: &str) -> String {
        assert!(SAMPLE_SCHEMA.contains(from), "fixture does not contain {from}");
        SAMPLE_SCHEMA.replacen(from, to, 1)
    }

    #[test]
    fn test_parse_schema() {
        let schema = GeneratorSchema::from_yaml(SAMPLE_SCHEMA).unwrap();

        assert_eq!(schema.version, 1);
        assert_eq!(schema.table_names(), vec!["customers", "users"]);

        let users = schema.get_table("users").unwrap();
        assert_eq!(users.parent_table(), Some("customers"));
        assert_eq!(users.fields.len(), 4);
        assert!(matches!(users.rows, Cardinality::PerParentBy { .. }));

        let customers = schema.get_table("customers").unwrap();
        assert!(customers.is_root());
        assert_eq!(
            customers.get_field("customer_id").unwrap().generator,
            GeneratorConfig::Sequence {
                prefix: "CUST-".to_string(),
                width: 6,
                start: 1
            }
        );
    }

    #[test]
    fn test_date_bound_forms() {
        let schema = GeneratorSchema::from_yaml(SAMPLE_SCHEMA).unwrap();
        let created = schema
            .get_table("customers")
            .unwrap()
            .get_field("created_date")
            .unwrap();

        match &created.generator {
            GeneratorConfig::DateBetween { from, to } => {
                assert_eq!(from, &DateBound::offset(Anchor::AsOf, -365));
                assert_eq!(to, &DateBound::at(Anchor::AsOf));
            }
            other => panic!("unexpected generator {other:?}"),
        }
    }

    #[test]
    fn test_field_ref_parsing() {
        assert_eq!("segment".parse::<FieldRef>().unwrap(), FieldRef::row("segment"));
        assert_eq!(
            "parent.domain".parse::<FieldRef>().unwrap(),
            FieldRef::parent("domain")
        );
        assert!("grandparent.domain".parse::<FieldRef>().is_err());
        assert!("parent.".parse::<FieldRef>().is_err());
        assert_eq!(FieldRef::parent("x").to_string(), "parent.x");
    }

    #[test]
    fn test_get_field_type() {
        let schema = GeneratorSchema::from_yaml(SAMPLE_SCHEMA).unwrap();

        assert_eq!(
            schema.get_field_type("customers", "customer_id").unwrap(),
            &FieldType::varchar(20)
        );
        assert!(matches!(
            schema.get_field_type("nonexistent", "field"),
            Err(SchemaError::TableNotFound(_))
        ));
        assert!(matches!(
            schema.get_field_type("users", "nonexistent"),
            Err(SchemaError::FieldNotFound { .. })
        ));
    }

    #[test]
    fn test_lineage_and_children() {
        let schema = GeneratorSchema::from_yaml(SAMPLE_SCHEMA).unwrap();
        assert_eq!(schema.lineage("users").unwrap(), vec!["customers", "users"]);
        assert_eq!(schema.children_of("customers").len(), 1);
        assert!(schema.children_of("users").is_empty());
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let yaml = replace_in_sample("{ table: customers,", "{ table: accounts,");
        assert!(matches!(
            GeneratorSchema::from_yaml(&yaml),
            Err(SchemaError::UnknownParent { .. })
        ));
    }

    #[test]
    fn test_unknown_catalog_rejected() {
        let yaml = replace_in_sample("catalog: segments", "catalog: tiers");
        assert!(matches!(
            GeneratorSchema::from_yaml(&yaml),
            Err(SchemaError::UnknownCatalog { .. })
        ));

        let yaml = replace_in_sample(
            "{ type: catalog, catalog: segments }",
            "{ type: catalog, catalog: segments, column: label }",
        );
        assert!(matches!(
            GeneratorSchema::from_yaml(&yaml),
            Err(SchemaError::UnknownCatalogColumn { .. })
        ));
    }

    #[test]
    fn test_forward_reference_rejected() {
        let yaml = replace_in_sample(
            "{ type: copy, from: parent.customer_id }",
            "{ type: copy, from: created_date }",
        );
        assert!(matches!(
            GeneratorSchema::from_yaml(&yaml),
            Err(SchemaError::ForwardReference { .. })
        ));
    }

    #[test]
    fn test_parent_reference_on_root_rejected() {
        let yaml = replace_in_sample(
            "{ type: catalog, catalog: segments }",
            "{ type: copy, from: parent.segment }",
        );
        assert!(matches!(
            GeneratorSchema::from_yaml(&yaml),
            Err(SchemaError::InvalidGenerator { .. })
        ));
    }

    #[test]
    fn test_fixed_rows_on_child_rejected() {
        let yaml = replace_in_sample(
            "rows:\n      type: per_parent_by",
            "rows:\n      type: fixed\n      count: 3\n      ignored: per_parent_by",
        );
        assert!(GeneratorSchema::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_period_requires_time_series() {
        let yaml = replace_in_sample(
            "{ type: date_between, from: parent.created_date, to: as_of }",
            "{ type: period }",
        );
        assert!(matches!(
            GeneratorSchema::from_yaml(&yaml),
            Err(SchemaError::InvalidGenerator { .. })
        ));
    }

    #[test]
    fn test_all_zero_weighted_choices_rejected() {
        let yaml = replace_in_sample(
            "generator: { type: catalog, catalog: segments }",
            "generator: {type: weighted, choices: [{value: A, weight: 0}, {value: B, weight: 0}]}",
        );
        match GeneratorSchema::from_yaml(&yaml) {
            Err(SchemaError::InvalidGenerator { field, reason, .. }) => {
                assert_eq!(field, "segment");
                assert!(reason.contains("all weights are zero"), "{reason}");
            }
            other => panic!("unexpected result {other:?}"),
        }

        let negative = replace_in_sample(
            "generator: { type: catalog, catalog: segments }",
            "generator: { type: weighted, choices: [{ value: SMB, weight: -1 }] }",
        );
        assert!(matches!(
            GeneratorSchema::from_yaml(&negative),
            Err(SchemaError::InvalidGenerator { .. })
        ));
    }

    #[test]
    fn test_invalid_range_rejected() {
        let yaml = replace_in_sample("{ min: 8, max: 15 }", "{ min: 15, max: 8 }");
        assert!(matches!(
            GeneratorSchema::from_yaml(&yaml),
            Err(SchemaError::InvalidCardinality { .. })
        ));
    }

    #[test]
    fn test_constraint_on_unknown_field_rejected() {
        let yaml = replace_in_sample(
            "{ type: not_before, field: created_date,",
            "{ type: not_before, field: signup_date,",
        );
        assert!(matches!(
            GeneratorSchema::from_yaml(&yaml),
            Err(SchemaError::InvalidConstraint { .. })
        ));
    }

    #[test]
    fn test_self_parent_is_a_cycle() {
        let yaml = replace_in_sample("{ table: customers,", "{ table: users,");
        assert!(matches!(
            GeneratorSchema::from_yaml(&yaml),
            Err(SchemaError::Cycle(_))
        ));
    }

    #[test]
    fn test_constraint_describe() {
        let ordered = Constraint::Ordered {
            fields: vec!["mql_date".into(), "sql_date".into()],
            strict: false,
            repair: Repair::Clamp,
        };
        assert_eq!(ordered.describe(), "mql_date <= sql_date");

        let not_after = Constraint::NotAfter {
            field: "created_date".into(),
            anchor: Anchor::AsOf,
            repair: Repair::Fail,
        };
        assert_eq!(not_after.describe(), "created_date <= as_of");
    }

    #[test]
    fn test_builtin_schema_is_valid() {
        let schema = GeneratorSchema::builtin().unwrap();
        for table in [
            "customers",
            "users",
            "subscriptions",
            "usage_daily",
            "health_scores",
            "nps_responses",
            "support_tickets",
            "leads",
            "opportunities",
        ] {
            assert!(schema.get_table(table).is_some(), "missing table {table}");
        }
        assert!(!schema.catalogs.is_empty());
    }

    #[test]
    fn test_schema_round_trips_through_yaml() {
        let schema = GeneratorSchema::builtin().unwrap();
        let yaml = serde_yaml::to_string(&schema).unwrap();
        let reparsed = GeneratorSchema::from_yaml(&yaml).unwrap();
        assert_eq!(reparsed.tables, schema.tables);
    }
}
