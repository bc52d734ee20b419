//! Categorical generators: catalog columns, weighted and uniform picks.

use super::static_value::yaml_to_value;
use super::{DrawMemo, RowScope};
use crate::error::RuleError;
use labgen_core::{Value, WeightedChoice, WeightedSampler};
use rand::Rng;

/// Uniform pick from a list of values.
pub fn generate_one_of<R: Rng>(
    rng: &mut R,
    values: &[serde_yaml::Value],
) -> Result<Value, RuleError> {
    if values.is_empty() {
        return Err(RuleError::Other("one_of has no values".to_string()));
    }
    let idx = rng.random_range(0..values.len());
    yaml_to_value(&values[idx])
}

/// Weighted pick from inline choices.
pub fn generate_weighted<R: Rng>(
    rng: &mut R,
    choices: &[WeightedChoice],
) -> Result<Value, RuleError> {
    let sampler = WeightedSampler::new(choices.iter().map(|c| (&c.value, c.weight)))
        .map_err(RuleError::InvalidChoices)?;
    yaml_to_value(sampler.sample(rng))
}

/// Column of a catalog entry.
///
/// The first catalog field of a row using a draw key picks the entry; later
/// fields with the same key read columns of that same entry.
pub fn generate_catalog_column<R: Rng>(
    scope: &RowScope<'_>,
    draws: &mut DrawMemo,
    rng: &mut R,
    name: &str,
    column: &str,
    draw: Option<&str>,
) -> Result<Value, RuleError> {
    let catalog = scope
        .catalogs
        .get(name)
        .ok_or_else(|| RuleError::MissingCatalog(name.to_string()))?;

    let key = draw.unwrap_or(name);
    let position = match draws.get(key) {
        Some(&position) => position,
        None => {
            let position = catalog.draw(rng);
            draws.insert(key.to_string(), position);
            position
        }
    };

    let entry = catalog.entry(position).ok_or_else(|| {
        RuleError::Other(format!(
            "draw key '{key}' points past the end of catalog '{name}'"
        ))
    })?;
    Ok(entry.get(column).cloned().unwrap_or(Value::Null))
}

/// Text of the `value` column of a fresh catalog draw.
pub fn pick_text<R: Rng>(
    scope: &RowScope<'_>,
    rng: &mut R,
    name: &str,
) -> Result<String, RuleError> {
    let catalog = scope
        .catalogs
        .get(name)
        .ok_or_else(|| RuleError::MissingCatalog(name.to_string()))?;
    Ok(catalog
        .entry(catalog.draw(rng))
        .and_then(|entry| entry.get(labgen_core::catalog::DEFAULT_COLUMN))
        .map(ToString::to_string)
        .unwrap_or_default())
}
