//! Value conversions for each output format.
//!
//! Columns are always emitted in the table's declared field order; a field
//! missing from a row is written as null.

use labgen_core::{Row, TableDefinition, Value, DATE_FORMAT};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// JSON representation of a value.
///
/// Decimals become strings so no precision is lost; dates use `YYYY-MM-DD`.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        // Non-finite floats have no JSON representation
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Decimal(d) => serde_json::Value::String(d.to_string()),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Date(d) => serde_json::Value::String(d.format(DATE_FORMAT).to_string()),
    }
}

/// CSV cell for a value. Null is the empty string.
pub fn to_csv_field(value: &Value) -> String {
    value.to_string()
}

/// SQL literal for a value.
pub fn to_sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        Value::Float(_) => "NULL".to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Text(s) => quote_string(s),
        Value::Date(d) => format!("'{}'", d.format(DATE_FORMAT)),
    }
}

/// Quote a string literal, doubling embedded single quotes.
pub fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quote an identifier, doubling embedded double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Values of `row` in the declared field order of `table`.
pub fn ordered_values<'a>(
    table: &'a TableDefinition,
    row: &'a Row,
) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
    table.fields.iter().map(move |field| {
        (
            field.name.as_str(),
            row.get_field(&field.name).unwrap_or(&Value::Null),
        )
    })
}

/// Serializes a row as a JSON object with fields in declared order.
pub struct JsonRow<'a> {
    pub table: &'a TableDefinition,
    pub row: &'a Row,
}

impl Serialize for JsonRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.table.fields.len()))?;
        for (name, value) in ordered_values(self.table, self.row) {
            map.serialize_entry(name, &to_json(value))?;
        }
        map.end()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{rows, table};
    use super::*;

    #[test]
    fn test_json_row_keeps_declared_order_and_formats() {
        let table = table();
        let rows = rows();
        let json = serde_json::to_string(&JsonRow {
            table: &table,
            row: &rows[0],
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"account_id":"ACC-1","name":"O'Brien, Ltd","mrr":"1250.50","active":true,"opened":"2024-03-09"}"#
        );
    }

    #[test]
    fn test_missing_field_is_null() {
        let table = table();
        let rows = rows();
        let json = serde_json::to_value(JsonRow {
            table: &table,
            row: &rows[1],
        })
        .unwrap();
        assert_eq!(json["opened"], serde_json::Value::Null);
        assert_eq!(json["mrr"], serde_json::Value::Null);
    }

    #[test]
    fn test_sql_literals() {
        assert_eq!(to_sql_literal(&Value::Null), "NULL");
        assert_eq!(to_sql_literal(&Value::Bool(true)), "TRUE");
        assert_eq!(to_sql_literal(&Value::text("O'Brien")), "'O''Brien'");
        assert_eq!(to_sql_literal(&Value::Float(f64::NAN)), "NULL");
        assert_eq!(
            to_sql_literal(&Value::Date(
                chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
            )),
            "'2024-01-02'"
        );
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_csv_null_is_empty() {
        assert_eq!(to_csv_field(&Value::Null), "");
        assert_eq!(to_csv_field(&Value::Int(-3)), "-3");
    }
}
