//! In-process reporting projections over a generated batch.
//!
//! These mirror the views reporting consumers build on top of the loaded
//! tables: a per-customer 360 summary and a per-segment revenue summary.

use crate::batch::GeneratedBatch;
use crate::contract::{CUSTOMER_360, REVENUE_SUMMARY};
use chrono::{Duration, NaiveDate};
use labgen_core::{
    fixed_scale, Cardinality, FieldDefinition, FieldType, GeneratorConfig, Row, TableDefinition,
    Value,
};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

/// Window of the recent-ticket count, in days ending at `as_of`
pub const RECENT_TICKET_DAYS: i64 = 30;

const ACTIVE: &str = "Active";

/// A derived table ready to be written to a sink.
#[derive(Debug, Clone)]
pub struct Projection {
    pub table: TableDefinition,
    pub rows: Vec<Row>,
}

/// Build a projection by name. `None` when the batch lacks an input table.
pub fn build(name: &str, batch: &GeneratedBatch) -> Option<Projection> {
    match name {
        CUSTOMER_360 => customer_360(batch),
        REVENUE_SUMMARY => revenue_summary(batch),
        _ => None,
    }
}

fn projection_table(
    name: &str,
    primary_key: &str,
    fields: &[(&str, FieldType)],
) -> TableDefinition {
    TableDefinition {
        name: name.to_string(),
        description: None,
        primary_key: primary_key.to_string(),
        parent: None,
        rows: Cardinality::Fixed { count: 0 },
        fields: fields
            .iter()
            .map(|(field, field_type)| FieldDefinition {
                name: field.to_string(),
                field_type: field_type.clone(),
                generator: GeneratorConfig::Null,
            })
            .collect(),
        constraints: Vec::new(),
    }
}

fn text_of(row: &Row, field: &str) -> String {
    row.get_field(field).map(ToString::to_string).unwrap_or_default()
}

#[derive(Default)]
struct CustomerRollup {
    active_subscriptions: i64,
    mrr: Decimal,
    arr: Decimal,
    active_users: i64,
    total_users: i64,
    latest_health: Option<(NaiveDate, Value, Value)>,
    recent_tickets: i64,
}

/// One row per customer: subscriptions, revenue, users, latest health and
/// recent ticket volume.
pub fn customer_360(batch: &GeneratedBatch) -> Option<Projection> {
    let customers = batch.rows("customers")?;
    let subscriptions = batch.rows("subscriptions")?;
    let users = batch.rows("users")?;
    let health_scores = batch.rows("health_scores")?;
    let tickets = batch.rows("support_tickets")?;

    let mut rollups: HashMap<String, CustomerRollup> = HashMap::new();

    for subscription in subscriptions {
        if subscription.get_str("status") != Some(ACTIVE) {
            continue;
        }
        let rollup = rollups.entry(text_of(subscription, "customer_id")).or_default();
        rollup.active_subscriptions += 1;
        rollup.mrr += subscription.get_decimal("mrr_amount").unwrap_or_default();
        rollup.arr += subscription.get_decimal("arr_amount").unwrap_or_default();
    }

    for user in users {
        let rollup = rollups.entry(text_of(user, "customer_id")).or_default();
        rollup.total_users += 1;
        if user.get_str("status") == Some(ACTIVE) {
            rollup.active_users += 1;
        }
    }

    for snapshot in health_scores {
        let Some(date) = snapshot.get_date("snapshot_date") else {
            continue;
        };
        let rollup = rollups.entry(text_of(snapshot, "customer_id")).or_default();
        if rollup.latest_health.as_ref().map_or(true, |(latest, _, _)| date >= *latest) {
            rollup.latest_health = Some((
                date,
                snapshot.get_field("overall_score").cloned().unwrap_or(Value::Null),
                snapshot.get_field("churn_risk").cloned().unwrap_or(Value::Null),
            ));
        }
    }

    let window_start = batch.as_of - Duration::days(RECENT_TICKET_DAYS - 1);
    for ticket in tickets {
        let recent = ticket
            .get_date("created_date")
            .is_some_and(|d| d >= window_start && d <= batch.as_of);
        if recent {
            rollups.entry(text_of(ticket, "customer_id")).or_default().recent_tickets += 1;
        }
    }

    let table = projection_table(
        CUSTOMER_360,
        "customer_id",
        &[
            ("customer_id", FieldType::Text),
            ("company_name", FieldType::Text),
            ("segment", FieldType::Text),
            ("status", FieldType::Text),
            ("active_subscriptions", FieldType::Int),
            ("total_mrr", FieldType::decimal(14, 2)),
            ("total_arr", FieldType::decimal(16, 2)),
            ("active_users", FieldType::Int),
            ("total_users", FieldType::Int),
            ("latest_health_score", FieldType::Int),
            ("churn_risk", FieldType::Text),
            ("tickets_last_30_days", FieldType::Int),
        ],
    );

    let empty = CustomerRollup::default();
    let rows = customers
        .iter()
        .enumerate()
        .map(|(index, customer)| {
            let customer_id = text_of(customer, "customer_id");
            let rollup = rollups.get(&customer_id).unwrap_or(&empty);
            let (score, risk) = match &rollup.latest_health {
                Some((_, score, risk)) => (score.clone(), risk.clone()),
                None => (Value::Null, Value::Null),
            };
            Row::with_fields(
                CUSTOMER_360,
                index as u64,
                vec![
                    ("customer_id".to_string(), Value::Text(customer_id.clone())),
                    ("company_name".to_string(), Value::Text(text_of(customer, "company_name"))),
                    ("segment".to_string(), Value::Text(text_of(customer, "segment"))),
                    ("status".to_string(), Value::Text(text_of(customer, "status"))),
                    ("active_subscriptions".to_string(), Value::Int(rollup.active_subscriptions)),
                    ("total_mrr".to_string(), Value::Decimal(fixed_scale(rollup.mrr, 2))),
                    ("total_arr".to_string(), Value::Decimal(fixed_scale(rollup.arr, 2))),
                    ("active_users".to_string(), Value::Int(rollup.active_users)),
                    ("total_users".to_string(), Value::Int(rollup.total_users)),
                    ("latest_health_score".to_string(), score),
                    ("churn_risk".to_string(), risk),
                    ("tickets_last_30_days".to_string(), Value::Int(rollup.recent_tickets)),
                ],
            )
        })
        .collect();

    Some(Projection { table, rows })
}

#[derive(Default)]
struct SegmentRollup {
    customers: i64,
    active_customers: i64,
    mrr: Decimal,
    arr: Decimal,
}

/// One row per segment: customer counts and active recurring revenue.
pub fn revenue_summary(batch: &GeneratedBatch) -> Option<Projection> {
    let customers = batch.rows("customers")?;
    let subscriptions = batch.rows("subscriptions")?;

    let mut segment_of: HashMap<String, String> = HashMap::new();
    let mut segments: BTreeMap<String, SegmentRollup> = BTreeMap::new();
    for customer in customers {
        let segment = text_of(customer, "segment");
        let rollup = segments.entry(segment.clone()).or_default();
        rollup.customers += 1;
        if customer.get_str("status") == Some(ACTIVE) {
            rollup.active_customers += 1;
        }
        segment_of.insert(text_of(customer, "customer_id"), segment);
    }

    for subscription in subscriptions {
        if subscription.get_str("status") != Some(ACTIVE) {
            continue;
        }
        let Some(segment) = segment_of.get(&text_of(subscription, "customer_id")) else {
            continue;
        };
        if let Some(rollup) = segments.get_mut(segment) {
            rollup.mrr += subscription.get_decimal("mrr_amount").unwrap_or_default();
            rollup.arr += subscription.get_decimal("arr_amount").unwrap_or_default();
        }
    }

    let table = projection_table(
        REVENUE_SUMMARY,
        "segment",
        &[
            ("segment", FieldType::Text),
            ("customers", FieldType::Int),
            ("active_customers", FieldType::Int),
            ("mrr", FieldType::decimal(16, 2)),
            ("arr", FieldType::decimal(18, 2)),
            ("avg_mrr_per_customer", FieldType::decimal(14, 2)),
        ],
    );

    let rows = segments
        .into_iter()
        .enumerate()
        .map(|(index, (segment, rollup))| {
            let average = if rollup.active_customers > 0 {
                fixed_scale(rollup.mrr / Decimal::from(rollup.active_customers), 2)
            } else {
                Decimal::ZERO
            };
            Row::with_fields(
                REVENUE_SUMMARY,
                index as u64,
                vec![
                    ("segment".to_string(), Value::Text(segment)),
                    ("customers".to_string(), Value::Int(rollup.customers)),
                    ("active_customers".to_string(), Value::Int(rollup.active_customers)),
                    ("mrr".to_string(), Value::Decimal(fixed_scale(rollup.mrr, 2))),
                    ("arr".to_string(), Value::Decimal(fixed_scale(rollup.arr, 2))),
                    (
                        "avg_mrr_per_customer".to_string(),
                        Value::Decimal(fixed_scale(average, 2)),
                    ),
                ],
            )
        })
        .collect();

    Some(Projection { table, rows })
}
