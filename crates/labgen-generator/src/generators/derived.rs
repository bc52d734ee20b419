//! Rules derived from fields that were already generated.

use super::RowScope;
use crate::error::RuleError;
use labgen_core::{FieldRef, GeneratorConfig, Threshold, Value};
use std::collections::BTreeMap;

/// Pick the case matching the text of the `on` field, or the default.
pub fn select_case<'c>(
    scope: &RowScope<'_>,
    on: &FieldRef,
    cases: &'c BTreeMap<String, GeneratorConfig>,
    default: &'c GeneratorConfig,
) -> Result<&'c GeneratorConfig, RuleError> {
    let key = scope.lookup(on)?.to_string();
    Ok(cases.get(&key).unwrap_or(default))
}

/// Label of the first threshold the field reaches; `default` below all of them.
pub fn generate_bucket(
    scope: &RowScope<'_>,
    field: &FieldRef,
    thresholds: &[Threshold],
    default: &str,
) -> Result<Value, RuleError> {
    let value = scope.lookup(field)?;
    if value.is_null() {
        return Ok(Value::Null);
    }
    let number = value.as_f64().ok_or_else(|| {
        RuleError::Other(format!(
            "'{field}' holds {} value, expected a number",
            value.kind()
        ))
    })?;

    let label = thresholds
        .iter()
        .find(|t| number >= t.min)
        .map(|t| t.label.as_str())
        .unwrap_or(default);
    Ok(Value::text(label))
}
