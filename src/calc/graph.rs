//! The calculation graph built from a workbook's calculated fields.

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use super::references::extract_references;

/// A calculated field as read from the legacy workbook.
///
/// Any dependency information the source carries is deliberately absent:
/// dependencies are always derived from the formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationRecord {
    /// Internal identifier, e.g. `Calculation_1029`.
    pub source_id: String,
    /// Caption of the datasource that owns the field.
    pub table_name: String,
    /// Display name shown to authors.
    pub caption: String,
    /// Tableau formula text.
    pub formula: String,
    /// Declared data type (`real`, `string`, `date`, ...).
    pub data_type: String,
    /// `true` for aggregate measures, `false` for row-level columns.
    pub is_measure: bool,
}

/// A calculation in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationNode {
    pub source_id: String,
    pub table_name: String,
    pub caption: String,
    pub formula: String,
    /// Translated expression; empty until the node has been resolved.
    pub dax_formula: String,
    pub data_type: String,
    pub is_measure: bool,
    /// Referenced calculation ids, re-derived from `formula`.
    pub dependencies: Vec<String>,
}

impl CalculationNode {
    pub fn from_record(record: CalculationRecord) -> Self {
        let dependencies = extract_references(&record.formula);
        Self {
            source_id: record.source_id,
            table_name: record.table_name,
            caption: record.caption,
            formula: record.formula,
            dax_formula: String::new(),
            data_type: record.data_type,
            is_measure: record.is_measure,
            dependencies,
        }
    }

    /// Recompute `dependencies` from the current formula and return them.
    pub fn refresh_dependencies(&mut self) -> &[String] {
        self.dependencies = extract_references(&self.formula);
        &self.dependencies
    }

    /// Whether a translated expression has been written back.
    pub fn is_translated(&self) -> bool {
        !self.dax_formula.is_empty()
    }
}

/// Registry of calculations keyed by source id.
#[derive(Debug, Clone, Default)]
pub struct CalculationGraph {
    nodes: HashMap<String, CalculationNode>,
}

impl CalculationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from flat records.
    ///
    /// A later record with an id already seen replaces the earlier one.
    pub fn from_records(records: impl IntoIterator<Item = CalculationRecord>) -> Self {
        let mut graph = Self::new();
        for record in records {
            graph.insert(CalculationNode::from_record(record));
        }
        graph
    }

    /// Insert a node, returning the node it replaced, if any.
    pub fn insert(&mut self, node: CalculationNode) -> Option<CalculationNode> {
        self.nodes.insert(node.source_id.clone(), node)
    }

    pub fn get(&self, id: &str) -> Option<&CalculationNode> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut CalculationNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All ids, sorted for deterministic iteration.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CalculationNode> {
        self.nodes.values()
    }

    /// Write a translated expression back onto a node.
    ///
    /// Returns `false` if the id is unknown.
    pub fn set_dax_formula(&mut self, id: &str, dax: impl Into<String>) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.dax_formula = dax.into();
                true
            }
            None => false,
        }
    }

    /// Map of source id to caption, used to give the translator readable names.
    pub fn captions(&self) -> HashMap<String, String> {
        self.nodes
            .values()
            .map(|n| (n.source_id.clone(), n.caption.clone()))
            .collect()
    }

    /// References to ids that are not part of the graph, as `(from, missing)`.
    pub fn dangling_references(&self) -> Vec<(String, String)> {
        let mut dangling = Vec::new();
        for id in self.ids() {
            let node = &self.nodes[id];
            for dep in extract_references(&node.formula) {
                if !self.contains(&dep) {
                    dangling.push((id.to_string(), dep));
                }
            }
        }
        dangling
    }

    /// Detect all dependency cycles.
    ///
    /// Each cycle is reported as the ids of one strongly connected component
    /// (sorted). A calculation referencing itself is a cycle of one.
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

        for id in self.ids() {
            indices.insert(id, graph.add_node(id));
        }
        for id in self.ids() {
            let node = &self.nodes[id];
            for dep in extract_references(&node.formula) {
                if let Some(&to) = indices.get(dep.as_str()) {
                    graph.add_edge(indices[id], to, ());
                }
            }
        }

        let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| {
                if scc.len() == 1 {
                    graph.edges_connecting(scc[0], scc[0]).next().is_some()
                } else {
                    true
                }
            })
            .map(|scc| {
                let mut ids: Vec<String> = scc.into_iter().map(|idx| graph[idx].to_string()).collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }
}
