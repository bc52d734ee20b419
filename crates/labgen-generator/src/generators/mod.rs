//! Individual value generators for each generator rule.
//!
//! This module provides the generation logic for each rule of
//! [`GeneratorConfig`]. Every rule sees a [`RowScope`]: the fields already
//! generated for the row, the parent row, and the run context.

pub mod catalog;
pub mod date;
pub mod derived;
pub mod numeric;
pub mod pattern;
pub mod static_value;

use crate::error::RuleError;
use crate::generator::GenerationContext;
use chrono::NaiveDate;
use labgen_core::{Catalogs, FieldRef, GeneratorConfig, Row, Scope, Value};
use rand::Rng;
use std::collections::HashMap;

/// Catalog entries already drawn for the current row, by draw key.
pub type DrawMemo = HashMap<String, usize>;

/// Everything a rule may read while generating one field.
pub struct RowScope<'a> {
    /// Run-wide settings
    pub context: &'a GenerationContext,
    /// Compiled catalogs
    pub catalogs: &'a Catalogs,
    /// Fields generated so far
    pub row: &'a Row,
    /// Parent row, for dependent tables
    pub parent: Option<&'a Row>,
    /// Position within the table
    pub index: u64,
    /// Position among the children of the same parent
    pub child_index: u64,
    /// Day or week of a time-series row
    pub period: Option<NaiveDate>,
}

impl RowScope<'_> {
    /// Look up a referenced field.
    pub fn lookup(&self, reference: &FieldRef) -> Result<&Value, RuleError> {
        let source = match reference.scope {
            Scope::Row => Some(self.row),
            Scope::Parent => self.parent,
        };
        source
            .and_then(|row| row.get_field(&reference.field))
            .ok_or_else(|| RuleError::Other(format!("reference '{reference}' is not available")))
    }
}

/// Generate a value based on the generator configuration.
pub fn generate_value<R: Rng>(
    config: &GeneratorConfig,
    scope: &RowScope<'_>,
    draws: &mut DrawMemo,
    rng: &mut R,
) -> Result<Value, RuleError> {
    match config {
        GeneratorConfig::Sequence {
            prefix,
            width,
            start,
        } => Ok(pattern::generate_sequence(prefix, *width, *start, scope.index)),

        GeneratorConfig::Pattern { pattern } => {
            pattern::generate_pattern(pattern, scope, rng).map(Value::Text)
        }

        GeneratorConfig::IntRange { min, max } => Ok(numeric::generate_int_range(rng, *min, *max)),

        GeneratorConfig::FloatRange { min, max, decimals } => {
            Ok(numeric::generate_float_range(rng, *min, *max, *decimals))
        }

        GeneratorConfig::DecimalRange { min, max, scale } => {
            numeric::generate_decimal_range(rng, *min, *max, *scale)
        }

        GeneratorConfig::WeightedBool { true_weight } => {
            Ok(Value::Bool(rng.random_bool(*true_weight)))
        }

        GeneratorConfig::OneOf { values } => catalog::generate_one_of(rng, values),

        GeneratorConfig::Weighted { choices } => catalog::generate_weighted(rng, choices),

        GeneratorConfig::Catalog {
            catalog: name,
            column,
            draw,
        } => catalog::generate_catalog_column(scope, draws, rng, name, column, draw.as_deref()),

        GeneratorConfig::DateBetween { from, to } => {
            date::generate_date_between(scope, rng, from, to)
        }

        GeneratorConfig::Period => scope
            .period
            .map(Value::Date)
            .ok_or_else(|| RuleError::Other("row has no period".to_string())),

        GeneratorConfig::Copy { from } => scope.lookup(from).cloned(),

        GeneratorConfig::FirstChild => Ok(Value::Bool(scope.child_index == 0)),

        GeneratorConfig::Switch { on, cases, default } => {
            let selected = derived::select_case(scope, on, cases, default)?;
            generate_value(selected, scope, draws, rng)
        }

        GeneratorConfig::Maybe {
            probability,
            generator,
        } => {
            if rng.random_bool(*probability) {
                generate_value(generator, scope, draws, rng)
            } else {
                Ok(Value::Null)
            }
        }

        GeneratorConfig::WeightedSum { terms, round } => {
            numeric::generate_weighted_sum(scope, terms, *round)
        }

        GeneratorConfig::Bucket {
            field,
            thresholds,
            default,
        } => derived::generate_bucket(scope, field, thresholds, default),

        GeneratorConfig::Discount {
            base,
            percent,
            multiplier,
        } => numeric::generate_discount(scope, base, percent, *multiplier),

        GeneratorConfig::Static { value } => static_value::yaml_to_value(value),

        GeneratorConfig::Null => Ok(Value::Null),
    }
}
