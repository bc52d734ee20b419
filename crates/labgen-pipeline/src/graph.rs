//! Stage dependency graph.
//!
//! Every table is a stage whose only dependency is its parent table; the
//! reference-data stage precedes all of them. Stages are ordered with Kahn's
//! algorithm, ties broken by declaration order so the order is stable.

use crate::error::PipelineError;
use labgen_core::{GeneratorSchema, SchemaError};
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Name of the stage that compiles the reference catalogs.
pub const REFERENCE_STAGE: &str = "reference-data";

/// Dependency graph of the entity stages of a schema.
#[derive(Debug, Clone)]
pub struct StageGraph {
    /// Stage names in declaration order
    stages: Vec<String>,
    /// Parent stage of each stage, if any
    parents: HashMap<String, Option<String>>,
}

impl StageGraph {
    /// Build the graph of every table in `schema`.
    pub fn from_schema(schema: &GeneratorSchema) -> Self {
        let stages: Vec<String> = schema.tables.iter().map(|t| t.name.clone()).collect();
        let parents = schema
            .tables
            .iter()
            .map(|t| (t.name.clone(), t.parent_table().map(str::to_string)))
            .collect();
        Self { stages, parents }
    }

    /// Restrict the graph to `tables` and their ancestors.
    ///
    /// An empty selection keeps every stage.
    pub fn restricted_to(&self, tables: &[String]) -> Result<Self, PipelineError> {
        if tables.is_empty() {
            return Ok(self.clone());
        }

        let mut keep = BTreeSet::new();
        for table in tables {
            if !self.parents.contains_key(table) {
                return Err(PipelineError::UnknownTable(table.clone()));
            }
            let mut current = Some(table.clone());
            while let Some(stage) = current {
                if !keep.insert(stage.clone()) {
                    break;
                }
                current = self.parents.get(&stage).cloned().flatten();
            }
        }

        Ok(Self {
            stages: self
                .stages
                .iter()
                .filter(|s| keep.contains(*s))
                .cloned()
                .collect(),
            parents: self
                .parents
                .iter()
                .filter(|(s, _)| keep.contains(*s))
                .map(|(s, p)| (s.clone(), p.clone()))
                .collect(),
        })
    }

    /// Parent stage of `stage`.
    pub fn parent(&self, stage: &str) -> Option<&str> {
        self.parents.get(stage).and_then(|p| p.as_deref())
    }

    /// Whether the graph contains `stage`.
    pub fn contains(&self, stage: &str) -> bool {
        self.parents.contains_key(stage)
    }

    /// Number of entity stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the graph has no entity stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stages that depend directly on `stage`, in declaration order.
    pub fn dependents(&self, stage: &str) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| self.parent(s) == Some(stage))
            .map(String::as_str)
            .collect()
    }

    /// Topological order of the entity stages.
    pub fn topological_order(&self) -> Result<Vec<String>, PipelineError> {
        let mut in_degree: HashMap<&str, usize> = self
            .stages
            .iter()
            .map(|s| {
                let degree = usize::from(self.parent(s).is_some_and(|p| self.contains(p)));
                (s.as_str(), degree)
            })
            .collect();

        let mut ready: VecDeque<&str> = self
            .stages
            .iter()
            .map(String::as_str)
            .filter(|s| in_degree.get(s) == Some(&0))
            .collect();
        let mut order = Vec::with_capacity(self.stages.len());

        while let Some(stage) = ready.pop_front() {
            order.push(stage.to_string());
            for child in self.dependents(stage) {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(child);
                    }
                }
            }
        }

        if order.len() != self.stages.len() {
            let stuck = self
                .stages
                .iter()
                .filter(|s| !order.contains(*s))
                .cloned()
                .collect();
            return Err(PipelineError::Schema(SchemaError::Cycle(stuck)));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin_graph() -> StageGraph {
        StageGraph::from_schema(&GeneratorSchema::builtin().unwrap())
    }

    fn position(order: &[String], stage: &str) -> usize {
        order.iter().position(|s| s == stage).unwrap()
    }

    #[test]
    fn test_parents_precede_children() {
        let graph = builtin_graph();
        let order = graph.topological_order().unwrap();
        assert_eq!(order.len(), graph.len());

        for stage in &order {
            if let Some(parent) = graph.parent(stage) {
                assert!(position(&order, parent) < position(&order, stage));
            }
        }
        assert!(position(&order, "customers") < position(&order, "users"));
        assert!(position(&order, "users") < position(&order, "usage_daily"));
        assert!(position(&order, "leads") < position(&order, "opportunities"));
    }

    #[test]
    fn test_order_is_stable() {
        let graph = builtin_graph();
        assert_eq!(
            graph.topological_order().unwrap(),
            graph.topological_order().unwrap()
        );
    }

    #[test]
    fn test_restricted_keeps_ancestors() {
        let graph = builtin_graph()
            .restricted_to(&["nps_responses".to_string()])
            .unwrap();
        assert_eq!(
            graph.topological_order().unwrap(),
            vec!["customers", "users", "nps_responses"]
        );
        assert!(!graph.contains("leads"));
    }

    #[test]
    fn test_restricted_unknown_table() {
        let err = builtin_graph()
            .restricted_to(&["invoices".to_string()])
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownTable(t) if t == "invoices"));
    }

    #[test]
    fn test_dependents() {
        let graph = builtin_graph();
        let children = graph.dependents("users");
        assert_eq!(children, vec!["usage_daily", "nps_responses", "support_tickets"]);
    }
}
