//! Column types for generated tables.
//!
//! `FieldType` describes what a generated column holds. Sinks derive their
//! output representation from it (JSON scalars, CSV cells, SQL DDL via
//! [`ToDdl`]).

use serde::{Deserialize, Serialize};

/// Type of a generated column.
///
/// # YAML Format
///
/// Simple types can be specified as strings:
/// ```yaml
/// type: int
/// type: date
/// type: text
/// ```
///
/// Parameterised types use object format:
/// ```yaml
/// type:
///   type: var_char
///   length: 64
/// type:
///   type: decimal
///   precision: 12
///   scale: 2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FieldTypeRepr", into = "FieldTypeRepr")]
pub enum FieldType {
    /// Boolean value
    Bool,

    /// 32-bit signed integer
    Int,

    /// 64-bit signed integer
    BigInt,

    /// 64-bit IEEE 754 floating point
    Double,

    /// Exact decimal with specified precision and scale
    Decimal {
        /// Total number of digits
        precision: u8,
        /// Number of digits after the decimal point
        scale: u8,
    },

    /// Variable-length character string with max length
    VarChar {
        /// Maximum length
        length: u16,
    },

    /// Unlimited text
    Text,

    /// Calendar date (YYYY-MM-DD)
    Date,
}

impl FieldType {
    /// Create a new Decimal type with the given precision and scale.
    pub fn decimal(precision: u8, scale: u8) -> Self {
        Self::Decimal { precision, scale }
    }

    /// Create a new VarChar type with the given length.
    pub fn varchar(length: u16) -> Self {
        Self::VarChar { length }
    }

    /// Whether values of this type are strings.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Text | Self::VarChar { .. })
    }

    /// Whether values of this type are numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Int | Self::BigInt | Self::Double | Self::Decimal { .. }
        )
    }

    fn simple_from_name(name: &str) -> Option<Self> {
        match name {
            "bool" | "boolean" => Some(Self::Bool),
            "int" | "integer" => Some(Self::Int),
            "big_int" | "bigint" => Some(Self::BigInt),
            "double" | "float" => Some(Self::Double),
            "text" => Some(Self::Text),
            "date" => Some(Self::Date),
            _ => None,
        }
    }
}

/// Trait for generating DDL column types from `FieldType`.
///
/// Each output dialect implements this trait to produce appropriate DDL
/// for creating tables with the correct column types.
pub trait ToDdl {
    /// Generate DDL type definition for the given `FieldType`.
    fn to_ddl(&self, field_type: &FieldType) -> String;
}

/// Serialized shape of a [`FieldType`]: a bare name or a `type` map.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FieldTypeRepr {
    Name(String),
    Spec {
        #[serde(rename = "type")]
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        precision: Option<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scale: Option<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        length: Option<u16>,
    },
}

impl TryFrom<FieldTypeRepr> for FieldType {
    type Error = String;

    fn try_from(repr: FieldTypeRepr) -> Result<Self, Self::Error> {
        let (name, precision, scale, length) = match repr {
            FieldTypeRepr::Name(name) => (name, None, None, None),
            FieldTypeRepr::Spec {
                name,
                precision,
                scale,
                length,
            } => (name, precision, scale, length),
        };
        if let Some(simple) = FieldType::simple_from_name(&name) {
            return Ok(simple);
        }

        match name.as_str() {
            "decimal" | "numeric" => Ok(FieldType::Decimal {
                precision: required(precision, &name, "precision")?,
                scale: required(scale, &name, "scale")?,
            }),
            "var_char" | "varchar" => Ok(FieldType::VarChar {
                length: required(length, &name, "length")?,
            }),
            other => Err(format!("unknown field type '{other}'")),
        }
    }
}

fn required<T>(value: Option<T>, name: &str, key: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("type '{name}' needs '{key}'"))
}

impl From<FieldType> for FieldTypeRepr {
    fn from(field_type: FieldType) -> Self {
        let name = |n: &str| FieldTypeRepr::Name(n.to_string());
        match field_type {
            FieldType::Bool => name("bool"),
            FieldType::Int => name("int"),
            FieldType::BigInt => name("big_int"),
            FieldType::Double => name("double"),
            FieldType::Text => name("text"),
            FieldType::Date => name("date"),
            FieldType::Decimal { precision, scale } => FieldTypeRepr::Spec {
                name: "decimal".to_string(),
                precision: Some(precision),
                scale: Some(scale),
                length: None,
            },
            FieldType::VarChar { length } => FieldTypeRepr::Spec {
                name: "var_char".to_string(),
                precision: None,
                scale: None,
                length: Some(length),
            },
        }
    }
}
