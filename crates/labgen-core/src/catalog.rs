//! Reference data catalogs.
//!
//! A catalog is a named list of entries, each with a weight and a set of
//! named columns. Plain lookup lists use the `values` shorthand, which
//! produces equally weighted entries with a single `value` column:
//!
//! ```yaml
//! catalogs:
//!   - name: departments
//!     values: [Engineering, Finance, Marketing]
//!   - name: products
//!     entries:
//!       - { weight: 5, name: Analytics Cloud, tier: Professional, list_price: 499 }
//! ```

use crate::sampler::{SamplerError, WeightedSampler};
use crate::values::Value;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Column name used by the `values` shorthand.
pub const DEFAULT_COLUMN: &str = "value";

/// Key holding an entry's weight inside `entries` maps.
pub const WEIGHT_KEY: &str = "weight";

/// Error raised when a catalog cannot be used for sampling.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    /// Empty or degenerate weighted set
    #[error("invalid catalog '{catalog}': {reason}")]
    InvalidCatalog {
        catalog: String,
        reason: SamplerError,
    },

    /// An entry value could not be interpreted
    #[error("invalid entry {entry} in catalog '{catalog}': {reason}")]
    InvalidEntry {
        catalog: String,
        entry: usize,
        reason: String,
    },
}

/// Catalog as written in the schema file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogDefinition {
    /// Catalog name
    pub name: String,

    /// Equally weighted single-column values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<serde_yaml::Value>,

    /// Weighted multi-column entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<BTreeMap<String, serde_yaml::Value>>,
}

impl CatalogDefinition {
    /// Column names available on this catalog's entries.
    pub fn columns(&self) -> BTreeSet<String> {
        let mut columns = BTreeSet::new();
        if !self.values.is_empty() {
            columns.insert(DEFAULT_COLUMN.to_string());
        }
        for entry in &self.entries {
            columns.extend(entry.keys().filter(|k| *k != WEIGHT_KEY).cloned());
        }
        columns
    }
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Relative weight
    pub weight: f64,
    /// Column values
    pub columns: BTreeMap<String, Value>,
}

impl CatalogEntry {
    /// Get a column value.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }
}

/// A compiled, ready-to-sample catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    name: String,
    sampler: WeightedSampler<CatalogEntry>,
}

impl Catalog {
    /// Compile a catalog definition, validating its weights.
    pub fn compile(definition: &CatalogDefinition) -> Result<Self, CatalogError> {
        let mut entries = Vec::with_capacity(definition.values.len() + definition.entries.len());

        for (i, raw) in definition.values.iter().enumerate() {
            let value = Value::try_from(raw).map_err(|reason| CatalogError::InvalidEntry {
                catalog: definition.name.clone(),
                entry: i,
                reason,
            })?;
            entries.push(CatalogEntry {
                weight: 1.0,
                columns: BTreeMap::from([(DEFAULT_COLUMN.to_string(), value)]),
            });
        }

        for (i, raw) in definition.entries.iter().enumerate() {
            let position = definition.values.len() + i;
            let invalid = |reason: String| CatalogError::InvalidEntry {
                catalog: definition.name.clone(),
                entry: position,
                reason,
            };

            let mut weight = 1.0;
            let mut columns = BTreeMap::new();
            for (key, raw) in raw {
                if key == WEIGHT_KEY {
                    weight = raw
                        .as_f64()
                        .ok_or_else(|| invalid(format!("weight must be a number, got {raw:?}")))?;
                } else {
                    columns.insert(key.clone(), Value::try_from(raw).map_err(invalid)?);
                }
            }
            entries.push(CatalogEntry { weight, columns });
        }

        let sampler = WeightedSampler::new(entries.into_iter().map(|e| {
            let weight = e.weight;
            (e, weight)
        }))
        .map_err(|reason| CatalogError::InvalidCatalog {
            catalog: definition.name.clone(),
            reason,
        })?;

        Ok(Self {
            name: definition.name.clone(),
            sampler,
        })
    }

    /// Catalog name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Draw the position of one entry.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.sampler.sample_index(rng)
    }

    /// Entry at a drawn position.
    pub fn entry(&self, index: usize) -> Option<&CatalogEntry> {
        self.sampler.get(index)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.sampler.len()
    }

    /// Whether the catalog has no entries. Always false once compiled.
    pub fn is_empty(&self) -> bool {
        self.sampler.is_empty()
    }
}

/// All compiled catalogs of a schema, by name.
#[derive(Debug, Clone, Default)]
pub struct Catalogs {
    by_name: HashMap<String, Catalog>,
}

impl Catalogs {
    /// Compile every catalog definition. Fails on the first invalid one.
    pub fn compile(definitions: &[CatalogDefinition]) -> Result<Self, CatalogError> {
        let by_name = definitions
            .iter()
            .map(|def| Catalog::compile(def).map(|c| (def.name.clone(), c)))
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self { by_name })
    }

    /// Get a catalog by name.
    pub fn get(&self, name: &str) -> Option<&Catalog> {
        self.by_name.get(name)
    }

    /// Number of catalogs.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether there are no catalogs.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn parse(yaml: &str) -> CatalogDefinition {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_values_shorthand() {
        let def = parse("{name: departments, values: [Engineering, Finance]}");
        let catalog = Catalog::compile(&def).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.entry(1).unwrap().get(DEFAULT_COLUMN),
            Some(&Value::text("Finance"))
        );
        assert!(def.columns().contains(DEFAULT_COLUMN));
    }

    #[test]
    fn test_weighted_entries_with_columns() {
        let def = parse(
            r#"
name: products
entries:
  - { weight: 3, name: Analytics Cloud, tier: Professional, list_price: 499 }
  - { weight: 1, name: Data Platform, tier: Enterprise, list_price: 1499.5 }
"#,
        );
        let catalog = Catalog::compile(&def).unwrap();
        let entry = catalog.entry(1).unwrap();

        assert_eq!(entry.weight, 1.0);
        assert_eq!(entry.get("tier"), Some(&Value::text("Enterprise")));
        assert_eq!(entry.get("list_price"), Some(&Value::Float(1499.5)));
        assert!(entry.get(WEIGHT_KEY).is_none());

        let columns = def.columns();
        assert_eq!(columns.len(), 3);
    }

    #[test]
    fn test_empty_catalog_is_invalid() {
        let def = parse("{name: agents}");
        let err = Catalog::compile(&def).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::InvalidCatalog {
                reason: SamplerError::Empty,
                ..
            }
        ));
        assert!(err.to_string().contains("agents"));
    }

    #[test]
    fn test_all_zero_weights_is_invalid() {
        let def =
            parse("{name: stages, entries: [{weight: 0, value: Open}, {weight: 0, value: Won}]}");
        let err = Catalog::compile(&def).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::InvalidCatalog {
                reason: SamplerError::ZeroTotal,
                ..
            }
        ));
    }

    #[test]
    fn test_non_numeric_weight_is_invalid() {
        let def = parse("{name: stages, entries: [{weight: heavy, value: Open}]}");
        assert!(matches!(
            Catalog::compile(&def).unwrap_err(),
            CatalogError::InvalidEntry { entry: 0, .. }
        ));
    }

    #[test]
    fn test_catalogs_registry() {
        let defs = vec![
            parse("{name: a, values: [x]}"),
            parse("{name: b, values: [y, z]}"),
        ];
        let catalogs = Catalogs::compile(&defs).unwrap();
        assert_eq!(catalogs.len(), 2);

        let mut rng = StdRng::seed_from_u64(3);
        let b = catalogs.get("b").unwrap();
        let drawn = b.draw(&mut rng);
        assert!(drawn < 2);
        assert!(catalogs.get("missing").is_none());
    }
}
