//! Schema loading plus the `validate` and `schema` command handlers.

use crate::args::ValidateArgs;
use anyhow::Context;
use labgen_core::{Cardinality, GeneratorSchema};
use labgen_pipeline::{ReportingContract, StageGraph};
use std::path::Path;

/// Load a schema file, or the built-in schema when no path is given.
pub fn load_schema(path: Option<&Path>) -> anyhow::Result<GeneratorSchema> {
    match path {
        Some(path) => GeneratorSchema::from_file(path)
            .with_context(|| format!("Failed to load schema from {path:?}")),
        None => GeneratorSchema::builtin().context("Built-in schema is invalid"),
    }
}

fn describe_rows(rows: &Cardinality) -> String {
    match rows {
        Cardinality::Fixed { count } => format!("{count} rows"),
        Cardinality::PerParent { min, max } => format!("{min}-{max} per parent"),
        Cardinality::PerParentBy { on, .. } => format!("per parent by '{on}'"),
        Cardinality::Chance { probability } => format!("0-1 per parent (p={probability})"),
        Cardinality::Daily { days, density, .. } => format!("daily x{days} (density {density})"),
        Cardinality::Weekly { weeks, .. } => format!("weekly x{weeks}"),
    }
}

/// Validate a schema and check it against the reporting contract.
///
/// Returns the printed overview.
pub fn run_validate(args: &ValidateArgs) -> anyhow::Result<String> {
    let schema = load_schema(args.schema.as_deref())?;
    let order = StageGraph::from_schema(&schema)
        .topological_order()
        .context("Schema has no valid stage order")?;

    let mut output = format!(
        "Schema OK: {} catalogs, {} tables\n",
        schema.catalogs.len(),
        schema.tables.len()
    );
    for name in &order {
        if let Some(table) = schema.get_table(name) {
            let parent = table
                .parent_table()
                .map(|p| format!(" <- {p}"))
                .unwrap_or_default();
            output.push_str(&format!(
                "  {}{} ({}, {} fields, {} constraints)\n",
                table.name,
                parent,
                describe_rows(&table.rows),
                table.fields.len(),
                table.constraints.len()
            ));
        }
    }

    ReportingContract::default()
        .ensure(&schema)
        .context("Schema does not satisfy the reporting contract")?;
    output.push_str("Reporting contract: satisfied\n");
    Ok(output)
}

/// The built-in schema as YAML.
pub fn run_schema() -> &'static str {
    GeneratorSchema::builtin_yaml()
}
