//! Entity generator: turns a table definition plus its parent rows into rows.

use crate::constraints;
use crate::error::GeneratorError;
use crate::generators::date::{daily_periods, weekly_periods};
use crate::generators::{generate_value, DrawMemo, RowScope};
use chrono::NaiveDate;
use labgen_core::{
    Cardinality, Catalogs, GeneratorSchema, Row, RowFilter, TableDefinition, Value,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Run-wide settings shared by every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationContext {
    /// The date treated as "today"
    pub as_of: NaiveDate,
    /// Row counts for root tables, overriding `fixed` counts in the schema
    pub row_counts: BTreeMap<String, u64>,
    /// Window for every `daily` table, overriding the schema
    pub daily_window: Option<u32>,
    /// Window for every `weekly` table, overriding the schema
    pub weekly_window: Option<u32>,
}

impl GenerationContext {
    /// Context with no overrides.
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            row_counts: BTreeMap::new(),
            daily_window: None,
            weekly_window: None,
        }
    }

    /// Override the row count of a root table.
    pub fn with_row_count(mut self, table: impl Into<String>, count: u64) -> Self {
        self.row_counts.insert(table.into(), count);
        self
    }

    /// Override the window of daily tables.
    pub fn with_daily_window(mut self, days: u32) -> Self {
        self.daily_window = Some(days);
        self
    }

    /// Override the window of weekly tables.
    pub fn with_weekly_window(mut self, weeks: u32) -> Self {
        self.weekly_window = Some(weeks);
        self
    }
}

/// Derive the seed of a stage's random sub-stream from the run seed.
///
/// Mixes the seed with a stable FNV-1a hash of the stage name so each stage
/// draws from its own stream regardless of scheduling order.
pub fn stage_seed(seed: u64, stage: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = stage.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    });
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ hash
}

/// One row to produce: its parent, position among siblings and period.
struct Slot {
    parent: Option<usize>,
    child_index: u64,
    period: Option<NaiveDate>,
}

/// Generates the rows of one table at a time.
///
/// The generator holds no random state: callers pass the random source, so
/// the same schema, context and seed always produce the same rows.
#[derive(Debug, Clone)]
pub struct EntityGenerator {
    /// Schema defining the tables and field generators
    schema: Arc<GeneratorSchema>,
    /// Compiled reference catalogs
    catalogs: Arc<Catalogs>,
    /// Run-wide settings
    context: GenerationContext,
}

impl EntityGenerator {
    /// Create a generator from a schema and its compiled catalogs.
    pub fn new(
        schema: Arc<GeneratorSchema>,
        catalogs: Arc<Catalogs>,
        context: GenerationContext,
    ) -> Self {
        Self {
            schema,
            catalogs,
            context,
        }
    }

    /// Create a generator, compiling the schema's catalogs.
    pub fn from_schema(
        schema: GeneratorSchema,
        context: GenerationContext,
    ) -> Result<Self, GeneratorError> {
        let catalogs = Catalogs::compile(&schema.catalogs)?;
        Ok(Self::new(Arc::new(schema), Arc::new(catalogs), context))
    }

    /// Get a reference to the schema.
    pub fn schema(&self) -> &GeneratorSchema {
        &self.schema
    }

    /// Get a reference to the run context.
    pub fn context(&self) -> &GenerationContext {
        &self.context
    }

    /// Generate a table from its own sub-stream of `seed`.
    pub fn generate_table_seeded(
        &self,
        table: &str,
        parent_rows: Option<&[Row]>,
        seed: u64,
    ) -> Result<Vec<Row>, GeneratorError> {
        let mut rng = StdRng::seed_from_u64(stage_seed(seed, table));
        self.generate_table(table, parent_rows, &mut rng)
    }

    /// Generate every row of `table`.
    ///
    /// Dependent tables need the rows of their parent table; root tables
    /// ignore `parent_rows`. Rows pass the table's constraint pass before
    /// they are returned.
    pub fn generate_table<R: Rng>(
        &self,
        table: &str,
        parent_rows: Option<&[Row]>,
        rng: &mut R,
    ) -> Result<Vec<Row>, GeneratorError> {
        let definition = self
            .schema
            .get_table(table)
            .ok_or_else(|| GeneratorError::UnknownTable(table.to_string()))?;

        let parents: &[Row] = match (&definition.parent, parent_rows) {
            (Some(link), None) => {
                return Err(GeneratorError::DependencyMissing {
                    table: definition.name.clone(),
                    parent: link.table.clone(),
                })
            }
            (Some(_), Some(rows)) => rows,
            (None, _) => &[],
        };

        let slots = self.plan_rows(definition, parents, rng)?;
        debug!(table = %definition.name, rows = slots.len(), "Generating rows");

        let mut rows = Vec::with_capacity(slots.len());
        let mut parent_of = Vec::with_capacity(slots.len());
        for (index, slot) in slots.iter().enumerate() {
            let parent = slot.parent.and_then(|p| parents.get(p));
            rows.push(self.generate_row(definition, index as u64, parent, slot, rng)?);
            parent_of.push(parent);
        }

        let outcome = constraints::enforce(definition, &mut rows, &parent_of, &self.context)?;
        if outcome.repaired > 0 {
            debug!(
                table = %definition.name,
                repaired = outcome.repaired,
                "Clamped out-of-order values"
            );
        }

        Ok(rows)
    }

    /// Decide how many rows each parent gets (and their periods).
    fn plan_rows<R: Rng>(
        &self,
        table: &TableDefinition,
        parents: &[Row],
        rng: &mut R,
    ) -> Result<Vec<Slot>, GeneratorError> {
        if let Cardinality::Fixed { count } = &table.rows {
            let count = self.context.row_counts.get(&table.name).copied().unwrap_or(*count);
            return Ok((0..count)
                .map(|i| Slot {
                    parent: None,
                    child_index: i,
                    period: None,
                })
                .collect());
        }

        let filter = table.parent.as_ref().and_then(|link| link.filter.as_ref());
        let mut slots = Vec::new();

        for (position, parent) in parents.iter().enumerate() {
            if !passes(filter, parent) {
                continue;
            }

            let periods: Vec<Option<NaiveDate>> = match &table.rows {
                Cardinality::Fixed { .. } => Vec::new(),
                Cardinality::PerParent { min, max } => {
                    vec![None; rng.random_range(*min..=*max) as usize]
                }
                Cardinality::PerParentBy { on, cases, default } => {
                    let key = parent.get_field(on).map(ToString::to_string).unwrap_or_default();
                    let range = cases.get(&key).unwrap_or(default);
                    vec![None; rng.random_range(range.min..=range.max) as usize]
                }
                Cardinality::Chance { probability } => {
                    vec![None; usize::from(rng.random_bool(*probability))]
                }
                Cardinality::Daily {
                    days,
                    density,
                    not_before,
                } => {
                    let days = self.context.daily_window.unwrap_or(*days);
                    let floor = floor_date(table, parent, not_before.as_deref())?;
                    daily_periods(self.context.as_of, days)
                        .into_iter()
                        .filter(|day| floor.map_or(true, |floor| *day >= floor))
                        .filter(|_| rng.random_bool(*density))
                        .map(Some)
                        .collect()
                }
                Cardinality::Weekly { weeks, not_before } => {
                    let weeks = self.context.weekly_window.unwrap_or(*weeks);
                    let floor = floor_date(table, parent, not_before.as_deref())?;
                    weekly_periods(self.context.as_of, weeks)
                        .into_iter()
                        .filter(|week| floor.map_or(true, |floor| *week >= floor))
                        .map(Some)
                        .collect()
                }
            };

            slots.extend(periods.into_iter().enumerate().map(|(i, period)| Slot {
                parent: Some(position),
                child_index: i as u64,
                period,
            }));
        }

        Ok(slots)
    }

    /// Generate one row, field by field in declaration order.
    fn generate_row<R: Rng>(
        &self,
        table: &TableDefinition,
        index: u64,
        parent: Option<&Row>,
        slot: &Slot,
        rng: &mut R,
    ) -> Result<Row, GeneratorError> {
        let mut row = Row::new(table.name.clone(), index);
        let mut draws = DrawMemo::new();

        for field in &table.fields {
            let scope = RowScope {
                context: &self.context,
                catalogs: &self.catalogs,
                row: &row,
                parent,
                index,
                child_index: slot.child_index,
                period: slot.period,
            };
            let value = generate_value(&field.generator, &scope, &mut draws, rng)
                .map_err(|e| e.in_field(&table.name, &field.name))?
                .coerce(&field.field_type)
                .map_err(|reason| GeneratorError::Field {
                    table: table.name.clone(),
                    field: field.name.clone(),
                    reason,
                })?;
            row.set_field(field.name.clone(), value);
        }

        Ok(row)
    }
}

fn passes(filter: Option<&RowFilter>, parent: &Row) -> bool {
    match filter {
        None => true,
        Some(filter) => {
            let value = parent
                .get_field(&filter.field)
                .map(ToString::to_string)
                .unwrap_or_default();
            filter.values.iter().any(|accepted| *accepted == value)
        }
    }
}

fn floor_date(
    table: &TableDefinition,
    parent: &Row,
    field: Option<&str>,
) -> Result<Option<NaiveDate>, GeneratorError> {
    let Some(field) = field else {
        return Ok(None);
    };
    match parent.get_field(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Date(date)) => Ok(Some(*date)),
        Some(other) => Err(GeneratorError::Field {
            table: table.name.clone(),
            field: field.to_string(),
            reason: format!("parent field holds {} value, expected a date", other.kind()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_schema() -> GeneratorSchema {
        let yaml = r#"
version: 1
catalogs:
  - name: segments
    entries:
      - { weight: 1, value: Enterprise }
      - { weight: 1, value: SMB }
tables:
  - name: customers
    primary_key: customer_id
    rows: { type: fixed, count: 20 }
    fields:
      - name: customer_id
        type: { type: var_char, length: 20 }
        generator: { type: sequence, prefix: "CUST-", width: 6 }
      - name: segment
        type: text
        generator: { type: catalog, catalog: segments }
      - name: status
        type: text
        generator:
          type: weighted
          choices:
            - { value: Active, weight: 3 }
            - { value: Churned, weight: 1 }
      - name: created_date
        type: date
        generator:
          type: date_between
          from: { anchor: as_of, offset_days: -365 }
          to: { anchor: as_of, offset_days: -30 }
  - name: users
    primary_key: user_id
    parent: { table: customers, foreign_key: customer_id }
    rows:
      type: per_parent_by
      on: segment
      cases:
        Enterprise: { min: 8, max: 15 }
      default: { min: 2, max: 5 }
    fields:
      - name: user_id
        type: text
        generator: { type: sequence, prefix: "USR-", width: 7 }
      - name: customer_id
        type: text
        generator: { type: copy, from: parent.customer_id }
      - name: is_primary_contact
        type: bool
        generator: { type: first_child }
      - name: created_date
        type: date
        generator: { type: date_between, from: parent.created_date, to: as_of }
    constraints:
      - { type: not_before, field: created_date, anchor: parent.created_date }
      - { type: exactly_one_per_parent, field: is_primary_contact }
  - name: logins
    primary_key: login_id
    parent:
      table: customers
      foreign_key: customer_id
      filter: { field: status, in: [Active] }
    rows: { type: daily, days: 10, density: 1.0, not_before: created_date }
    fields:
      - name: login_id
        type: text
        generator: { type: sequence, prefix: "L" }
      - name: customer_id
        type: text
        generator: { type: copy, from: parent.customer_id }
      - name: login_date
        type: date
        generator: { type: period }
"#;
        GeneratorSchema::from_yaml(yaml).unwrap()
    }

    fn generator() -> EntityGenerator {
        let context = GenerationContext::new(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
        EntityGenerator::from_schema(test_schema(), context).unwrap()
    }

    #[test]
    fn test_root_table_count_and_ids() {
        let generator = generator();
        let rows = generator.generate_table_seeded("customers", None, 42).unwrap();

        assert_eq!(rows.len(), 20);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.index, i as u64);
            assert_eq!(
                row.get_str("customer_id").unwrap(),
                format!("CUST-{:06}", i + 1)
            );
            assert!(row.get_date("created_date").unwrap() <= generator.context().as_of);
        }
    }

    #[test]
    fn test_row_count_override() {
        let context = GenerationContext::new(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap())
            .with_row_count("customers", 3);
        let generator = EntityGenerator::from_schema(test_schema(), context).unwrap();
        let rows = generator.generate_table_seeded("customers", None, 1).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_children_follow_segment_bands() {
        let generator = generator();
        let customers = generator.generate_table_seeded("customers", None, 42).unwrap();
        let users = generator
            .generate_table_seeded("users", Some(&customers), 42)
            .unwrap();

        let mut per_customer: HashMap<&str, Vec<&Row>> = HashMap::new();
        for user in &users {
            per_customer
                .entry(user.get_str("customer_id").unwrap())
                .or_default()
                .push(user);
        }

        for customer in &customers {
            let id = customer.get_str("customer_id").unwrap();
            let children = &per_customer[id];
            let (min, max) = match customer.get_str("segment").unwrap() {
                "Enterprise" => (8, 15),
                _ => (2, 5),
            };
            assert!((min..=max).contains(&children.len()), "{id}: {}", children.len());

            let primaries = children
                .iter()
                .filter(|u| u.get_bool("is_primary_contact") == Some(true))
                .count();
            assert_eq!(primaries, 1);

            let created = customer.get_date("created_date").unwrap();
            assert!(children
                .iter()
                .all(|u| u.get_date("created_date").unwrap() >= created));
        }
    }

    #[test]
    fn test_missing_parent_rows() {
        let generator = generator();
        let err = generator.generate_table_seeded("users", None, 42).unwrap_err();
        assert!(matches!(
            err,
            GeneratorError::DependencyMissing { ref table, ref parent }
                if table == "users" && parent == "customers"
        ));
    }

    #[test]
    fn test_unknown_table() {
        let generator = generator();
        assert!(matches!(
            generator.generate_table_seeded("invoices", None, 42),
            Err(GeneratorError::UnknownTable(_))
        ));
    }

    #[test]
    fn test_daily_rows_respect_filter_and_floor() {
        let generator = generator();
        let customers = generator.generate_table_seeded("customers", None, 7).unwrap();
        let logins = generator
            .generate_table_seeded("logins", Some(&customers), 7)
            .unwrap();

        let active = customers
            .iter()
            .filter(|c| c.get_str("status") == Some("Active"))
            .count();
        // created_date is at least 30 days before as_of, so every day of the window is kept
        assert_eq!(logins.len(), active * 10);

        let as_of = generator.context().as_of;
        for login in &logins {
            let day = login.get_date("login_date").unwrap();
            assert!(day <= as_of && day > as_of - chrono::Duration::days(10));
        }
    }

    #[test]
    fn test_daily_window_override() {
        let context = GenerationContext::new(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap())
            .with_daily_window(3);
        let generator = EntityGenerator::from_schema(test_schema(), context).unwrap();
        let customers = generator.generate_table_seeded("customers", None, 7).unwrap();
        let logins = generator
            .generate_table_seeded("logins", Some(&customers), 7)
            .unwrap();
        let active = customers
            .iter()
            .filter(|c| c.get_str("status") == Some("Active"))
            .count();
        assert_eq!(logins.len(), active * 3);
    }

    #[test]
    fn test_deterministic_generation() {
        let generator = generator();
        let a = generator.generate_table_seeded("customers", None, 42).unwrap();
        let b = generator.generate_table_seeded("customers", None, 42).unwrap();
        assert_eq!(a, b);

        let c = generator.generate_table_seeded("customers", None, 43).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_stage_seed_differs_per_stage() {
        assert_ne!(stage_seed(42, "customers"), stage_seed(42, "users"));
        assert_ne!(stage_seed(42, "customers"), stage_seed(43, "customers"));
        assert_eq!(stage_seed(42, "customers"), stage_seed(42, "customers"));
    }

    #[test]
    fn test_invalid_inline_weights_name_the_field() {
        let yaml = r#"
tables:
  - name: tickets
    primary_key: id
    rows: { type: fixed, count: 1 }
    fields:
      - { name: id, type: text, generator: { type: sequence } }
      - name: priority
        type: text
        generator: { type: weighted, choices: [{ value: Low, weight: 0 }] }
"#;
        let schema = GeneratorSchema::from_yaml(yaml).unwrap();
        let context = GenerationContext::new(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
        let generator = EntityGenerator::from_schema(schema, context).unwrap();

        match generator.generate_table_seeded("tickets", None, 1).unwrap_err() {
            GeneratorError::InvalidCatalog { catalog, .. } => {
                assert_eq!(catalog, "tickets.priority")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_invalid_catalog_fails_compilation() {
        let yaml = r#"
catalogs:
  - name: agents
    entries: [{ weight: 0, value: Kim }]
tables:
  - name: tickets
    primary_key: id
    rows: { type: fixed, count: 1 }
    fields:
      - { name: id, type: text, generator: { type: sequence } }
      - { name: agent, type: text, generator: { type: catalog, catalog: agents } }
"#;
        let schema = GeneratorSchema::from_yaml(yaml).unwrap();
        let context = GenerationContext::new(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
        match EntityGenerator::from_schema(schema, context).unwrap_err() {
            GeneratorError::InvalidCatalog { catalog, .. } => assert_eq!(catalog, "agents"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
