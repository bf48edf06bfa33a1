//! core::delta
//!
//! The delta model: what an update request changes, per named graph.
//!
//! A [`Delta`] is an ordered list of [`DeltaOperation`]s, one per update
//! operation of the request. Each operation maps a graph name to the
//! triples it adds and removes. Deltas are produced by the update evaluator
//! (or read from JSON) and consumed only by [`crate::sync::SyncEngine::commit`].
//!
//! # JSON shape
//!
//! ```json
//! [
//!   {
//!     "http://example.org/graph": {
//!       "additions": ["<http://ex.org/a> <http://ex.org/p> <http://ex.org/b> ."],
//!       "removals": []
//!     }
//!   }
//! ]
//! ```
//!
//! Graph keys are IRIs (or `"default"`); triples are N-Triples statements and
//! must be ground.

use std::collections::{HashMap, HashSet};

use oxrdf::{GraphName, Quad, Triple};
use serde::Deserialize;
use thiserror::Error;

use super::rdf::{parse_graph_name, parse_triple, triple_of};

/// Errors from building a delta.
#[derive(Debug, Error)]
pub enum DeltaError {
    #[error("malformed delta document: {0}")]
    Malformed(String),

    #[error("invalid graph name '{graph}': {message}")]
    InvalidGraph { graph: String, message: String },

    #[error("invalid triple '{triple}': {message}")]
    InvalidTriple { triple: String, message: String },
}

/// Additions and removals for one graph within one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphChange {
    pub additions: Vec<Triple>,
    pub removals: Vec<Triple>,
}

impl GraphChange {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

/// Changes of one update operation, keyed by graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaOperation {
    graphs: HashMap<GraphName, GraphChange>,
}

impl DeltaOperation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, graph: GraphName, triple: Triple) {
        self.graphs.entry(graph).or_default().additions.push(triple);
    }

    pub fn remove(&mut self, graph: GraphName, triple: Triple) {
        self.graphs.entry(graph).or_default().removals.push(triple);
    }

    pub fn change(&self, graph: &GraphName) -> Option<&GraphChange> {
        self.graphs.get(graph)
    }

    /// Remove and return the change for `graph`, consuming the key.
    pub fn take(&mut self, graph: &GraphName) -> Option<GraphChange> {
        self.graphs.remove(graph)
    }

    pub fn graphs(&self) -> impl Iterator<Item = (&GraphName, &GraphChange)> {
        self.graphs.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.values().all(GraphChange::is_empty)
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = (GraphName, GraphChange)> + '_ {
        self.graphs.drain()
    }
}

/// One evaluated update operation.
///
/// The update evaluator hands these over once all variables are bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    InsertData(Vec<Quad>),
    DeleteData(Vec<Quad>),
    /// `DELETE { .. } INSERT { .. } WHERE { .. }` after pattern evaluation.
    Modify { delete: Vec<Quad>, insert: Vec<Quad> },
}

/// Ordered list of update operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    operations: Vec<DeltaOperation>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawChange {
    #[serde(default)]
    additions: Vec<String>,
    #[serde(default)]
    removals: Vec<String>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: DeltaOperation) {
        self.operations.push(operation);
    }

    /// Build a delta from evaluated update operations, one entry each.
    pub fn from_updates(updates: impl IntoIterator<Item = Update>) -> Self {
        let mut delta = Self::new();
        for update in updates {
            let mut op = DeltaOperation::new();
            let (delete, insert) = match update {
                Update::InsertData(quads) => (Vec::new(), quads),
                Update::DeleteData(quads) => (quads, Vec::new()),
                Update::Modify { delete, insert } => (delete, insert),
            };
            for quad in delete {
                op.remove(quad.graph_name.clone(), triple_of(&quad));
            }
            for quad in insert {
                op.add(quad.graph_name.clone(), triple_of(&quad));
            }
            delta.push(op);
        }
        delta
    }

    /// Parse the JSON form described in the module docs.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON, unknown fields, invalid graph names, or
    /// statements that are not ground N-Triples.
    pub fn from_json(text: &str) -> Result<Self, DeltaError> {
        let raw: Vec<HashMap<String, RawChange>> =
            serde_json::from_str(text).map_err(|e| DeltaError::Malformed(e.to_string()))?;

        let mut delta = Self::new();
        for entry in raw {
            let mut op = DeltaOperation::new();
            for (graph, change) in entry {
                let name = parse_graph_name(&graph).map_err(|e| DeltaError::InvalidGraph {
                    graph: graph.clone(),
                    message: e.to_string(),
                })?;
                let change_entry = op.graphs.entry(name).or_default();
                change_entry.additions = parse_all(&change.additions)?;
                change_entry.removals = parse_all(&change.removals)?;
            }
            delta.push(op);
        }
        Ok(delta)
    }

    pub fn operations(&self) -> &[DeltaOperation] {
        &self.operations
    }

    pub(crate) fn operations_mut(&mut self) -> &mut [DeltaOperation] {
        &mut self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// True when there are no operations at all.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Every graph touched by any operation.
    pub fn graph_names(&self) -> HashSet<GraphName> {
        self.operations
            .iter()
            .flat_map(|op| op.graphs.keys().cloned())
            .collect()
    }
}

fn parse_all(lines: &[String]) -> Result<Vec<Triple>, DeltaError> {
    lines
        .iter()
        .map(|line| {
            parse_triple(line).map_err(|e| DeltaError::InvalidTriple {
                triple: line.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::NamedNode;

    fn iri(s: &str) -> NamedNode {
        NamedNode::new(s).unwrap()
    }

    #[test]
    fn parses_json() {
        let delta = Delta::from_json(
            r#"[{"http://ex.org/g": {
                "additions": ["<http://ex.org/a> <http://ex.org/p> <http://ex.org/b> ."],
                "removals": ["<http://ex.org/a> <http://ex.org/p> \"old\""]
            }}]"#,
        )
        .unwrap();

        assert_eq!(delta.len(), 1);
        let graph = GraphName::NamedNode(iri("http://ex.org/g"));
        let change = delta.operations()[0].change(&graph).unwrap();
        assert_eq!(change.additions.len(), 1);
        assert_eq!(change.removals.len(), 1);
    }

    #[test]
    fn default_graph_key() {
        let delta = Delta::from_json(r#"[{"default": {"additions": []}}]"#).unwrap();
        assert!(delta.graph_names().contains(&GraphName::DefaultGraph));
        assert!(delta.operations()[0].is_empty());
    }

    #[test]
    fn rejects_variables_and_unknown_fields() {
        assert!(matches!(
            Delta::from_json(r#"[{"default": {"additions": ["?s <http://ex.org/p> ?o ."]}}]"#),
            Err(DeltaError::InvalidTriple { .. })
        ));
        assert!(matches!(
            Delta::from_json(r#"[{"default": {"added": []}}]"#),
            Err(DeltaError::Malformed(_))
        ));
    }

    #[test]
    fn from_updates_keeps_order_and_graphs() {
        let g = GraphName::NamedNode(iri("http://ex.org/g"));
        let quad = Quad::new(iri("http://ex.org/a"), iri("http://ex.org/p"), iri("http://ex.org/b"), g.clone());
        let delta = Delta::from_updates([
            Update::InsertData(vec![quad.clone()]),
            Update::Modify {
                delete: vec![quad.clone()],
                insert: vec![],
            },
        ]);

        assert_eq!(delta.len(), 2);
        assert_eq!(delta.operations()[0].change(&g).unwrap().additions.len(), 1);
        assert_eq!(delta.operations()[1].change(&g).unwrap().removals.len(), 1);
    }

    #[test]
    fn take_consumes_key() {
        let g = GraphName::DefaultGraph;
        let mut op = DeltaOperation::new();
        op.add(g.clone(), Triple::new(iri("http://ex.org/a"), iri("http://ex.org/p"), iri("http://ex.org/b")));
        assert!(op.take(&g).is_some());
        assert!(op.take(&g).is_none());
    }
}
