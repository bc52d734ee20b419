//! Numeric value generators.

use super::RowScope;
use crate::error::RuleError;
use labgen_core::{FieldRef, Value, WeightedTerm};
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Generate a random integer in the given range (inclusive).
pub fn generate_int_range<R: Rng>(rng: &mut R, min: i64, max: i64) -> Value {
    Value::Int(rng.random_range(min..=max))
}

/// Generate a random float in the given range (inclusive), optionally rounded.
pub fn generate_float_range<R: Rng>(
    rng: &mut R,
    min: f64,
    max: f64,
    decimals: Option<u32>,
) -> Value {
    let value = if min == max {
        min
    } else {
        rng.random_range(min..=max)
    };
    match decimals {
        Some(d) => {
            let factor = 10f64.powi(d as i32);
            Value::Float((value * factor).round() / factor)
        }
        None => Value::Float(value),
    }
}

/// Generate a random exact decimal in the given range with `scale` digits.
///
/// Samples whole units of the last digit, so every value in range is
/// equally likely and no binary float rounding leaks into the result.
pub fn generate_decimal_range<R: Rng>(
    rng: &mut R,
    min: f64,
    max: f64,
    scale: u32,
) -> Result<Value, RuleError> {
    let factor = 10f64.powi(scale as i32);
    let low = (min * factor).ceil();
    let high = (max * factor).floor();
    if !(low.is_finite() && high.is_finite()) || low > high || high.abs() > i64::MAX as f64 {
        return Err(RuleError::Other(format!(
            "no {scale}-digit decimal between {min} and {max}"
        )));
    }
    let units = rng.random_range(low as i64..=high as i64);
    Ok(Value::Decimal(Decimal::new(units, scale)))
}

/// Exact decimal form of a schema weight.
pub(crate) fn weight_to_decimal(weight: f64) -> Result<Decimal, RuleError> {
    Decimal::from_str(&weight.to_string())
        .map_err(|e| RuleError::Other(format!("weight {weight} is not representable: {e}")))
}

fn numeric_operand(
    scope: &RowScope<'_>,
    reference: &FieldRef,
) -> Result<Option<Decimal>, RuleError> {
    let value = scope.lookup(reference)?;
    if value.is_null() {
        return Ok(None);
    }
    value.as_decimal().map(Some).ok_or_else(|| {
        RuleError::Other(format!(
            "'{reference}' holds {} value, expected a number",
            value.kind()
        ))
    })
}

/// Sum of weighted numeric fields, in exact decimal arithmetic.
///
/// Any null term makes the result null. With `round`, halves round away
/// from zero and the result is an integer.
pub fn generate_weighted_sum(
    scope: &RowScope<'_>,
    terms: &[WeightedTerm],
    round: bool,
) -> Result<Value, RuleError> {
    let mut total = Decimal::ZERO;
    for term in terms {
        let Some(operand) = numeric_operand(scope, &term.field)? else {
            return Ok(Value::Null);
        };
        total += operand * weight_to_decimal(term.weight)?;
    }

    if round {
        let rounded = total.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        rounded
            .to_i64()
            .map(Value::Int)
            .ok_or_else(|| {
                RuleError::Other(format!("weighted sum {total} does not fit an integer"))
            })
    } else {
        Ok(Value::Decimal(total))
    }
}

/// `base * multiplier * (1 - percent / 100)`, rounded to cents.
pub fn generate_discount(
    scope: &RowScope<'_>,
    base: &FieldRef,
    percent: &FieldRef,
    multiplier: f64,
) -> Result<Value, RuleError> {
    let (Some(base), Some(percent)) = (
        numeric_operand(scope, base)?,
        numeric_operand(scope, percent)?,
    ) else {
        return Ok(Value::Null);
    };
    let factor = Decimal::ONE - percent / Decimal::ONE_HUNDRED;
    let amount = base * weight_to_decimal(multiplier)? * factor;
    Ok(Value::Decimal(
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
    ))
}
