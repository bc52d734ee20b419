//! Post-generation invariant pass.
//!
//! Runs once per table after all its rows exist. Date constraints with
//! `repair: clamp` move offending dates onto their bound; every other
//! violation fails the table.

use crate::error::GeneratorError;
use crate::generator::GenerationContext;
use chrono::{Duration, NaiveDate};
use labgen_core::{Anchor, Constraint, Repair, Row, Scope, TableDefinition, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Outcome of a constraint pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintOutcome {
    /// Rows checked
    pub checked: usize,
    /// Field values moved by clamp repairs
    pub repaired: usize,
}

/// Check (and where allowed, repair) every constraint of `table`.
///
/// `parent_of[i]` is the parent row of `rows[i]`, used to resolve `parent.`
/// anchors; it is empty for root tables.
pub fn enforce(
    table: &TableDefinition,
    rows: &mut [Row],
    parent_of: &[Option<&Row>],
    context: &GenerationContext,
) -> Result<ConstraintOutcome, GeneratorError> {
    let mut outcome = ConstraintOutcome {
        checked: rows.len(),
        repaired: 0,
    };

    for constraint in &table.constraints {
        match constraint {
            Constraint::Ordered {
                fields,
                strict,
                repair,
            } => {
                for row in rows.iter_mut() {
                    outcome.repaired +=
                        check_ordered(table, constraint, row, fields, *strict, *repair)?;
                }
            }
            Constraint::NotBefore {
                field,
                anchor,
                repair,
            }
            | Constraint::NotAfter {
                field,
                anchor,
                repair,
            } => {
                let forbidden = if matches!(constraint, Constraint::NotBefore { .. }) {
                    Ordering::Greater
                } else {
                    Ordering::Less
                };
                let bound = Bound {
                    field,
                    anchor,
                    forbidden,
                    repair: *repair,
                };
                for (position, row) in rows.iter_mut().enumerate() {
                    let parent = parent_of.get(position).copied().flatten();
                    if check_bound(table, constraint, row, parent, &bound, context)? {
                        outcome.repaired += 1;
                    }
                }
            }
            Constraint::ExactlyOnePerParent { field } => {
                check_exactly_one(table, constraint, rows, field)?;
            }
        }
    }

    Ok(outcome)
}

fn violation(
    table: &TableDefinition,
    constraint: &Constraint,
    row: &Row,
    detail: String,
) -> GeneratorError {
    GeneratorError::ConstraintViolation {
        table: table.name.clone(),
        constraint: constraint.describe(),
        row: row
            .get_field(&table.primary_key)
            .map(ToString::to_string)
            .unwrap_or_else(|| row.index.to_string()),
        detail,
    }
}

/// Compare two non-null values of the same kind.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        _ => a.as_decimal()?.partial_cmp(&b.as_decimal()?),
    }
}

fn check_ordered(
    table: &TableDefinition,
    constraint: &Constraint,
    row: &mut Row,
    fields: &[String],
    strict: bool,
    repair: Repair,
) -> Result<usize, GeneratorError> {
    let mut repaired = 0;
    let mut previous: Option<(String, Value)> = None;

    for field in fields {
        let current = row.get_field(field).cloned().unwrap_or(Value::Null);
        if current.is_null() {
            continue;
        }

        if let Some((previous_field, previous_value)) = &previous {
            let ordering = compare(previous_value, &current).ok_or_else(|| {
                violation(
                    table,
                    constraint,
                    row,
                    format!(
                        "cannot compare {previous_field} ({}) with {field} ({})",
                        previous_value.kind(),
                        current.kind()
                    ),
                )
            })?;
            let in_order = match ordering {
                Ordering::Less => true,
                Ordering::Equal => !strict,
                Ordering::Greater => false,
            };

            if !in_order {
                let clamped = match (repair, previous_value) {
                    (Repair::Clamp, Value::Date(date)) => Some(clamp_date(*date, strict)),
                    _ => None,
                };
                match clamped {
                    Some(date) => {
                        row.set_field(field.clone(), Value::Date(date));
                        repaired += 1;
                        previous = Some((field.clone(), Value::Date(date)));
                        continue;
                    }
                    None => {
                        return Err(violation(
                            table,
                            constraint,
                            row,
                            format!(
                                "{field} ({current}) is not after {previous_field} ({previous_value})"
                            ),
                        ))
                    }
                }
            }
        }
        previous = Some((field.clone(), current));
    }

    Ok(repaired)
}

fn clamp_date(floor: NaiveDate, strict: bool) -> NaiveDate {
    if strict {
        floor.checked_add_signed(Duration::days(1)).unwrap_or(floor)
    } else {
        floor
    }
}

/// A `not_before` / `not_after` constraint unpacked for checking.
struct Bound<'a> {
    field: &'a str,
    anchor: &'a Anchor,
    /// Ordering of bound vs value that breaks the constraint
    forbidden: Ordering,
    repair: Repair,
}

/// Returns whether the row was repaired.
fn check_bound(
    table: &TableDefinition,
    constraint: &Constraint,
    row: &mut Row,
    parent: Option<&Row>,
    bound: &Bound<'_>,
    context: &GenerationContext,
) -> Result<bool, GeneratorError> {
    let field = bound.field;
    let anchor = bound.anchor;
    let value = row.get_field(field).cloned().unwrap_or(Value::Null);
    if value.is_null() {
        return Ok(false);
    }

    let limit = match anchor {
        Anchor::AsOf => Value::Date(context.as_of),
        Anchor::Period => return Ok(false),
        Anchor::Field(reference) => {
            let source = match reference.scope {
                Scope::Row => Some(&*row),
                Scope::Parent => parent,
            };
            let Some(source) = source else {
                return Err(violation(
                    table,
                    constraint,
                    row,
                    format!("parent row for '{reference}' not found"),
                ));
            };
            source
                .get_field(&reference.field)
                .cloned()
                .unwrap_or(Value::Null)
        }
    };
    if limit.is_null() {
        return Ok(false);
    }

    match compare(&limit, &value) {
        Some(ordering) if ordering == bound.forbidden => match (bound.repair, &limit) {
            (Repair::Clamp, Value::Date(_)) => {
                row.set_field(field.to_string(), limit);
                Ok(true)
            }
            _ => Err(violation(
                table,
                constraint,
                row,
                format!("{field} is {value}, bound {anchor} is {limit}"),
            )),
        },
        Some(_) => Ok(false),
        None => Err(violation(
            table,
            constraint,
            row,
            format!(
                "cannot compare {field} ({}) with {anchor} ({})",
                value.kind(),
                limit.kind()
            ),
        )),
    }
}

fn check_exactly_one(
    table: &TableDefinition,
    constraint: &Constraint,
    rows: &[Row],
    field: &str,
) -> Result<(), GeneratorError> {
    let Some(link) = &table.parent else {
        return Ok(());
    };

    let mut flagged: BTreeMap<String, (usize, &Row)> = BTreeMap::new();
    for row in rows {
        let key = row
            .get_field(&link.foreign_key)
            .map(ToString::to_string)
            .unwrap_or_default();
        let entry = flagged.entry(key).or_insert((0, row));
        if row.get_bool(field) == Some(true) {
            entry.0 += 1;
        }
    }

    match flagged.into_iter().find(|(_, (count, _))| *count != 1) {
        Some((parent, (count, row))) => Err(violation(
            table,
            constraint,
            row,
            format!("parent {parent} has {count} rows with {field} set"),
        )),
        None => Ok(()),
    }
}
