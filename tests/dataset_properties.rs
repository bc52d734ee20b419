//! Dataset-level properties of the built-in lab schema.
//!
//! Every test generates the full batch with seed 42 and checks a
//! relationship that must hold across tables.

use chrono::{Datelike, NaiveDate};
use labgen_core::{GeneratorSchema, Row};
use labgen_generator::{EntityGenerator, GenerationContext};
use labgen_pipeline::{GenerateConfig, GeneratedBatch, GenerationPipeline};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

fn config(customers: u64) -> GenerateConfig {
    GenerateConfig {
        seed: 42,
        as_of: Some(as_of()),
        customers,
        leads: 60,
        usage_days: 30,
        health_weeks: 8,
        ..GenerateConfig::default()
    }
}

async fn generate(customers: u64) -> GeneratedBatch {
    let schema = GeneratorSchema::builtin().unwrap();
    GenerationPipeline::new(schema, config(customers))
        .unwrap()
        .generate()
        .await
        .unwrap()
}

fn by_id<'a>(rows: &'a [Row], key: &str) -> HashMap<&'a str, &'a Row> {
    rows.iter()
        .map(|row| (row.get_str(key).unwrap(), row))
        .collect()
}

#[tokio::test]
async fn test_ten_customers_with_users_in_range() {
    let batch = generate(10).await;
    let customers = batch.rows("customers").unwrap();
    assert_eq!(customers.len(), 10);

    let ids: BTreeSet<&str> = customers
        .iter()
        .map(|c| c.get_str("customer_id").unwrap())
        .collect();
    assert_eq!(ids.len(), 10);
    for id in &ids {
        let digits = id.strip_prefix("CUST-").unwrap();
        assert_eq!(digits.len(), 6, "{id}");
        assert!(digits.chars().all(|c| c.is_ascii_digit()), "{id}");
    }

    let mut users_per_customer: BTreeMap<&str, usize> = BTreeMap::new();
    for user in batch.rows("users").unwrap() {
        *users_per_customer
            .entry(user.get_str("customer_id").unwrap())
            .or_default() += 1;
    }
    for customer in customers {
        let id = customer.get_str("customer_id").unwrap();
        let count = users_per_customer.get(id).copied().unwrap_or(0);
        let (min, max) = match customer.get_str("segment").unwrap() {
            "Enterprise" => (8, 15),
            "Mid-Market" => (4, 8),
            _ => (2, 5),
        };
        assert!((min..=max).contains(&count), "{id} has {count} users");
        assert!((2..=15).contains(&count));
    }
}

#[tokio::test]
async fn test_customers_created_before_as_of() {
    let batch = generate(50).await;
    for customer in batch.rows("customers").unwrap() {
        let created = customer.get_date("created_date").unwrap();
        assert!(created <= as_of());
        if let Some(churned) = customer.get_date("churn_date") {
            assert_eq!(customer.get_str("status"), Some("Churned"));
            assert!(churned > created);
        }
    }
}

#[tokio::test]
async fn test_users_follow_their_customer() {
    let batch = generate(50).await;
    let customers = by_id(batch.rows("customers").unwrap(), "customer_id");

    let mut primaries: HashMap<&str, usize> = HashMap::new();
    for user in batch.rows("users").unwrap() {
        let customer_id = user.get_str("customer_id").unwrap();
        let customer = customers[customer_id];
        let created = user.get_date("created_date").unwrap();
        assert!(created >= customer.get_date("created_date").unwrap());
        if let Some(last_login) = user.get_date("last_login_date") {
            assert!(last_login >= user.get_date("created_date").unwrap());
        }
        if customer.get_str("status") == Some("Churned") {
            assert_eq!(user.get_str("status"), Some("Inactive"));
        }
        if user.get_bool("is_primary_contact").unwrap() {
            *primaries.entry(customer_id).or_default() += 1;
        }
    }

    assert_eq!(primaries.len(), customers.len());
    assert!(primaries.values().all(|&n| n == 1));
}

#[tokio::test]
async fn test_subscription_revenue_and_cancellation() {
    let batch = generate(50).await;
    let customers = by_id(batch.rows("customers").unwrap(), "customer_id");

    for sub in batch.rows("subscriptions").unwrap() {
        let customer = customers[sub.get_str("customer_id").unwrap()];
        let status = sub.get_str("status").unwrap();
        assert_eq!(
            status == "Cancelled",
            customer.get_str("status") == Some("Churned"),
            "{}",
            sub.get_str("subscription_id").unwrap()
        );

        let start = sub.get_date("start_date").unwrap();
        assert!(start >= customer.get_date("created_date").unwrap());
        match sub.get_date("end_date") {
            Some(end) => {
                assert_eq!(status, "Cancelled");
                assert!(end > start);
            }
            None => assert_ne!(status, "Cancelled"),
        }

        let list_price = sub.get_decimal("list_price").unwrap();
        let discount = Decimal::from(sub.get_i64("discount_pct").unwrap());
        let mrr = sub.get_decimal("mrr_amount").unwrap();
        let expected =
            (list_price * (Decimal::ONE_HUNDRED - discount) / Decimal::ONE_HUNDRED).round_dp(2);
        assert_eq!(mrr, expected);
        assert_eq!(sub.get_decimal("arr_amount").unwrap(), mrr * Decimal::from(12));
    }
}

#[tokio::test]
async fn test_cancelled_subscriptions_fall_within_customer_lifecycle() {
    let batch = generate(200).await;
    let customers = by_id(batch.rows("customers").unwrap(), "customer_id");
    let mut cancelled = 0;

    for sub in batch.rows("subscriptions").unwrap() {
        let customer = customers[sub.get_str("customer_id").unwrap()];
        let Some(churned) = customer.get_date("churn_date") else {
            continue;
        };
        cancelled += 1;
        let id = sub.get_str("subscription_id").unwrap();
        let start = sub.get_date("start_date").unwrap();
        let end = sub.get_date("end_date").unwrap();
        assert!(start >= customer.get_date("created_date").unwrap(), "{id}");
        assert!(start < churned, "{id} starts {start}, churned {churned}");
        assert!(end > start && end <= churned, "{id} ends {end}, churned {churned}");
    }
    assert!(cancelled > 0);
}

#[tokio::test]
async fn test_health_score_formula_and_risk() {
    let batch = generate(30).await;
    let health = batch.rows("health_scores").unwrap();
    assert!(!health.is_empty());

    for row in health {
        let component = |name: &str| row.get_i64(name).unwrap();
        let weighted = component("usage_score") * 25
            + component("engagement_score") * 20
            + component("support_score") * 20
            + component("payment_score") * 20
            + component("expansion_score") * 15;
        let overall = (weighted + 50) / 100;
        assert_eq!(row.get_i64("overall_score"), Some(overall));

        let risk = match overall {
            80.. => "Low",
            60..=79 => "Medium",
            40..=59 => "High",
            _ => "Critical",
        };
        assert_eq!(row.get_str("churn_risk"), Some(risk));
    }
}

#[tokio::test]
async fn test_health_snapshots_are_weekly_within_window() {
    let batch = generate(20).await;
    let customers = by_id(batch.rows("customers").unwrap(), "customer_id");
    let earliest = as_of() - chrono::Duration::weeks(8);

    for row in batch.rows("health_scores").unwrap() {
        let snapshot = row.get_date("snapshot_date").unwrap();
        let customer = customers[row.get_str("customer_id").unwrap()];
        assert!(snapshot <= as_of());
        assert!(snapshot >= earliest);
        assert!(snapshot >= customer.get_date("created_date").unwrap());
        assert_eq!(snapshot.weekday(), chrono::Weekday::Mon);
    }
}

#[tokio::test]
async fn test_usage_only_for_active_users() {
    let batch = generate(20).await;
    let users = by_id(batch.rows("users").unwrap(), "user_id");
    let window_start = as_of() - chrono::Duration::days(29);

    for usage in batch.rows("usage_daily").unwrap() {
        let user = users[usage.get_str("user_id").unwrap()];
        assert_eq!(user.get_str("status"), Some("Active"));
        assert_eq!(usage.get_str("customer_id"), user.get_str("customer_id"));
        let date = usage.get_date("usage_date").unwrap();
        assert!(date >= window_start && date <= as_of());
        assert!(date >= user.get_date("created_date").unwrap());
    }
}

#[tokio::test]
async fn test_lead_funnel_dates_are_ordered() {
    let batch = generate(5).await;
    let leads = batch.rows("leads").unwrap();
    assert_eq!(leads.len(), 60);

    for lead in leads {
        let dates: Vec<NaiveDate> = ["created_date", "mql_date", "sql_date", "conversion_date"]
            .iter()
            .filter_map(|field| lead.get_date(field))
            .collect();
        assert!(
            dates.windows(2).all(|pair| pair[0] <= pair[1]),
            "{}: {dates:?}",
            lead.get_str("lead_id").unwrap()
        );
        if lead.get_date("conversion_date").is_some() {
            assert_eq!(lead.get_str("status"), Some("Converted"));
        }
    }
}

#[tokio::test]
async fn test_funnel_and_opportunity_dates_not_after_as_of() {
    let mut many_leads = config(5);
    many_leads.leads = 1000;
    let batch = GenerationPipeline::new(GeneratorSchema::builtin().unwrap(), many_leads)
        .unwrap()
        .generate()
        .await
        .unwrap();

    for lead in batch.rows("leads").unwrap() {
        for field in ["created_date", "mql_date", "sql_date", "conversion_date"] {
            if let Some(date) = lead.get_date(field) {
                let id = lead.get_str("lead_id").unwrap();
                assert!(date <= as_of(), "{id} {field} = {date}");
            }
        }
    }

    let opportunities = batch.rows("opportunities").unwrap();
    assert!(!opportunities.is_empty());
    for opportunity in opportunities {
        let created = opportunity.get_date("created_date").unwrap();
        assert!(created <= as_of(), "{}", opportunity.get_str("opportunity_id").unwrap());
    }
}

#[tokio::test]
async fn test_opportunities_come_from_qualified_leads() {
    let batch = generate(5).await;
    let leads = by_id(batch.rows("leads").unwrap(), "lead_id");

    for opportunity in batch.rows("opportunities").unwrap() {
        let lead = leads[opportunity.get_str("lead_id").unwrap()];
        let status = lead.get_str("status").unwrap();
        assert!(matches!(status, "Qualified" | "Converted"), "{status}");
        let created = opportunity.get_date("created_date").unwrap();
        assert!(created >= lead.get_date("created_date").unwrap());
        assert!(opportunity.get_date("close_date").unwrap() >= created);
    }
}

#[tokio::test]
async fn test_same_seed_same_batch() {
    let first = generate(15).await;
    let second = generate(15).await;
    assert_eq!(first.table_names(), second.table_names());
    for (table, rows) in first.iter() {
        assert_eq!(Some(rows), second.rows(table), "table {table}");
    }
}

#[test]
fn test_health_example_scores_78_medium() {
    let yaml = r#"
tables:
  - name: health_scores
    primary_key: health_score_id
    rows: { type: fixed, count: 1 }
    fields:
      - name: health_score_id
        type: { type: var_char, length: 20 }
        generator: { type: sequence, prefix: "HS-", width: 7 }
      - { name: usage_score, type: int, generator: { type: static, value: 80 } }
      - { name: engagement_score, type: int, generator: { type: static, value: 60 } }
      - { name: support_score, type: int, generator: { type: static, value: 100 } }
      - { name: payment_score, type: int, generator: { type: static, value: 100 } }
      - { name: expansion_score, type: int, generator: { type: static, value: 40 } }
      - name: overall_score
        type: int
        generator:
          type: weighted_sum
          round: true
          terms:
            - { field: usage_score, weight: 0.25 }
            - { field: engagement_score, weight: 0.20 }
            - { field: support_score, weight: 0.20 }
            - { field: payment_score, weight: 0.20 }
            - { field: expansion_score, weight: 0.15 }
      - name: churn_risk
        type: { type: var_char, length: 10 }
        generator:
          type: bucket
          field: overall_score
          thresholds:
            - { min: 80, label: Low }
            - { min: 60, label: Medium }
            - { min: 40, label: High }
          default: Critical
"#;
    let schema = GeneratorSchema::from_yaml(yaml).unwrap();
    let generator = EntityGenerator::from_schema(schema, GenerationContext::new(as_of())).unwrap();
    let rows = generator.generate_table_seeded("health_scores", None, 42).unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_str("health_score_id"), Some("HS-0000001"));
    assert_eq!(rows[0].get_i64("overall_score"), Some(78));
    assert_eq!(rows[0].get_str("churn_risk"), Some("Medium"));
}
