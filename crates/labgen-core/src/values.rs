//! Value representations for generated rows.
//!
//! `Value` is the type-agnostic scalar every generator produces. Values are
//! coerced to the declared [`FieldType`] of their column before they land in
//! a [`Row`].

use crate::types::FieldType;
use chrono::NaiveDate;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;

/// Date format used for every textual date representation.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single generated scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value
    Null,

    /// Boolean value
    Bool(bool),

    /// Signed integer
    Int(i64),

    /// 64-bit floating point
    Float(f64),

    /// Exact decimal
    Decimal(Decimal),

    /// String value
    Text(String),

    /// Calendar date
    Date(NaiveDate),
}

impl Value {
    /// Create a text value.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of this value, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Exact decimal view of this value, if it is a number.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Int(i) => Some(Decimal::from(*i)),
            Self::Float(f) => Decimal::from_f64(*f),
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a date.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Date(_) => "date",
        }
    }

    /// Convert this value to the representation required by `field_type`.
    ///
    /// Null passes through unchanged. Lossy conversions (text to number,
    /// float to integer) are rejected.
    pub fn coerce(self, field_type: &FieldType) -> Result<Value, String> {
        let kind = self.kind();
        let mismatch = || format!("cannot store {kind} value in {field_type:?} column");

        match (field_type, self) {
            (_, Value::Null) => Ok(Value::Null),

            (FieldType::Bool, v @ Value::Bool(_)) => Ok(v),

            (FieldType::Int | FieldType::BigInt, v @ Value::Int(_)) => Ok(v),

            (FieldType::Double, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (FieldType::Double, v @ Value::Float(_)) => Ok(v),
            (FieldType::Double, Value::Decimal(d)) => {
                d.to_f64().map(Value::Float).ok_or_else(mismatch)
            }

            (FieldType::Decimal { scale, .. }, v) => match v.as_decimal() {
                Some(d) => Ok(Value::Decimal(fixed_scale(d, u32::from(*scale)))),
                None => Err(mismatch()),
            },

            (FieldType::Text, v @ Value::Text(_)) => Ok(v),
            (FieldType::VarChar { length }, Value::Text(s)) => {
                if s.chars().count() > usize::from(*length) {
                    Err(format!("value '{s}' exceeds var_char({length})"))
                } else {
                    Ok(Value::Text(s))
                }
            }

            (FieldType::Date, v @ Value::Date(_)) => Ok(v),
            (FieldType::Date, Value::Text(s)) => NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|e| format!("invalid date '{s}': {e}")),

            _ => Err(mismatch()),
        }
    }
}

/// Round half away from zero to exactly `scale` digits, padding with zeros.
pub fn fixed_scale(value: Decimal, scale: u32) -> Decimal {
    let mut fixed = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    fixed.rescale(scale);
    fixed
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
        }
    }
}

impl TryFrom<&serde_yaml::Value> for Value {
    type Error = String;

    fn try_from(value: &serde_yaml::Value) -> Result<Self, Self::Error> {
        match value {
            serde_yaml::Value::Null => Ok(Value::Null),
            serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(format!("unsupported number: {n}"))
                }
            }
            serde_yaml::Value::String(s) => Ok(Value::Text(s.clone())),
            other => Err(format!("only scalar values are supported, got {other:?}")),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Decimal(value)
    }
}

/// A generated row, with fields kept in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Table (entity) name
    pub table: String,
    /// Position of the row within its table
    pub index: u64,
    /// Field values in declaration order
    pub fields: Vec<(String, Value)>,
}

impl Row {
    /// Create a new empty row.
    pub fn new(table: impl Into<String>, index: u64) -> Self {
        Self {
            table: table.into(),
            index,
            fields: Vec::new(),
        }
    }

    /// Create a row from already generated fields.
    pub fn with_fields(table: impl Into<String>, index: u64, fields: Vec<(String, Value)>) -> Self {
        Self {
            table: table.into(),
            index,
            fields,
        }
    }

    /// Get a field value by name.
    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Get a text field.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get_field(name).and_then(Value::as_str)
    }

    /// Get a date field.
    pub fn get_date(&self, name: &str) -> Option<NaiveDate> {
        self.get_field(name).and_then(Value::as_date)
    }

    /// Get an integer field.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get_field(name).and_then(Value::as_i64)
    }

    /// Get a boolean field.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get_field(name).and_then(Value::as_bool)
    }

    /// Get a numeric field as an exact decimal.
    pub fn get_decimal(&self, name: &str) -> Option<Decimal> {
        self.get_field(name).and_then(Value::as_decimal)
    }

    /// Append a field, or replace it when it already exists.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_coerce_numeric_to_decimal_rounds_to_scale() {
        let v = Value::Float(499.005).coerce(&FieldType::decimal(10, 2)).unwrap();
        assert_eq!(v.as_decimal().unwrap().scale(), 2);

        let v = Value::Int(12).coerce(&FieldType::decimal(10, 2)).unwrap();
        assert_eq!(v, Value::Decimal(Decimal::from(12)));
        assert_eq!(v.to_string(), "12.00");
    }

    #[test]
    fn test_decimal_scale_is_padded_and_rounded_half_up() {
        let whole = Value::Decimal(Decimal::from(2499))
            .coerce(&FieldType::decimal(12, 2))
            .unwrap();
        assert_eq!(whole.to_string(), "2499.00");

        let half = Value::Decimal(Decimal::from_str("10.125").unwrap())
            .coerce(&FieldType::decimal(12, 2))
            .unwrap();
        assert_eq!(half.to_string(), "10.13");

        assert_eq!(fixed_scale(Decimal::from_str("0.5").unwrap(), 0).to_string(), "1");
    }

    #[test]
    fn test_coerce_text_to_date() {
        let v = Value::text("2024-03-01").coerce(&FieldType::Date).unwrap();
        assert_eq!(v, Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));

        assert!(Value::text("March").coerce(&FieldType::Date).is_err());
    }

    #[test]
    fn test_coerce_rejects_mismatch() {
        assert!(Value::text("abc").coerce(&FieldType::Int).is_err());
        assert!(Value::Float(1.5).coerce(&FieldType::Int).is_err());
        assert!(Value::text("toolong").coerce(&FieldType::varchar(3)).is_err());
    }

    #[test]
    fn test_null_passes_through_any_type() {
        assert_eq!(Value::Null.coerce(&FieldType::Date).unwrap(), Value::Null);
        assert_eq!(Value::Null.coerce(&FieldType::Int).unwrap(), Value::Null);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(
            Value::Decimal(Decimal::from_str("12.50").unwrap()).to_string(),
            "12.50"
        );
        assert_eq!(
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 9).unwrap()).to_string(),
            "2024-01-09"
        );
    }

    #[test]
    fn test_from_yaml_scalar() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("42").unwrap();
        assert_eq!(Value::try_from(&yaml).unwrap(), Value::Int(42));

        let yaml: serde_yaml::Value = serde_yaml::from_str("[1, 2]").unwrap();
        assert!(Value::try_from(&yaml).is_err());
    }

    #[test]
    fn test_row_field_access() {
        let mut row = Row::new("customers", 0);
        row.set_field("customer_id", Value::text("CUST-000001"));
        row.set_field("employees", Value::Int(250));
        row.set_field("employees", Value::Int(300));

        assert_eq!(row.get_str("customer_id"), Some("CUST-000001"));
        assert_eq!(row.get_i64("employees"), Some(300));
        assert_eq!(row.fields.len(), 2);
        assert!(row.get_field("missing").is_none());
    }
}
