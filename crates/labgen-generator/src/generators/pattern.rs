//! Pattern-based string generators.
//!
//! Placeholder syntax is parsed by [`labgen_core::pattern`].

use super::catalog::pick_text;
use super::RowScope;
use crate::error::RuleError;
use labgen_core::pattern::{parse_pattern, PatternPart};
use labgen_core::Value;
use rand::Rng;

/// Zero-padded sequential identifier, e.g. `CUST-000001` for index 0.
pub fn generate_sequence(prefix: &str, width: usize, start: u64, index: u64) -> Value {
    Value::Text(format!("{prefix}{:0width$}", start + index))
}

/// Render a pattern against the current row.
pub fn generate_pattern<R: Rng>(
    pattern: &str,
    scope: &RowScope<'_>,
    rng: &mut R,
) -> Result<String, RuleError> {
    let parts = parse_pattern(pattern)?;
    let mut result = String::with_capacity(pattern.len() + 16);

    for part in &parts {
        match part {
            PatternPart::Literal(text) => result.push_str(text),
            PatternPart::Index { width } => {
                result.push_str(&format!("{:0width$}", scope.index, width = *width))
            }
            PatternPart::Random { digits } => {
                result.push_str(&generate_random_digits(rng, *digits))
            }
            PatternPart::Pick { catalog } => result.push_str(&pick_text(scope, rng, catalog)?),
            PatternPart::Field { field, filter } => {
                let text = scope.lookup(field)?.to_string();
                match filter {
                    Some(filter) => result.push_str(&filter.apply(&text)),
                    None => result.push_str(&text),
                }
            }
        }
    }

    Ok(result)
}

/// Generate a random number with exactly N digits.
fn generate_random_digits<R: Rng>(rng: &mut R, digits: usize) -> String {
    let mut result = String::with_capacity(digits);
    for position in 0..digits {
        // First digit should be 1-9 to avoid leading zeros
        let low = if position == 0 { 1 } else { 0 };
        let digit: u8 = rng.random_range(low..10);
        result.push(char::from(b'0' + digit));
    }
    result
}
