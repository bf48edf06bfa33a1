//! core::config::graphs
//!
//! The graph↔file map of one revision.
//!
//! A file is tracked when any of these hold:
//! - an explicit `[[graph]]` entry names it,
//! - a sibling sidecar blob `<file>.graph` holds a graph IRI,
//! - it is an `.nq` file (its graphs are read from its content).
//!
//! `.nt` files need a mapping since their lines carry no graph.

use std::collections::BTreeMap;

use oxrdf::{GraphName, NamedNode};

use super::GraphEntry;
use crate::core::rdf::FileFormat;
use crate::core::types::Oid;

/// Suffix of sidecar blobs naming a file's graph.
pub const SIDECAR_SUFFIX: &str = ".graph";

/// A tracked file and the graphs mapped to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    pub format: FileFormat,
    /// Mapped graphs. Empty for `.nq` files without explicit mappings.
    pub graphs: Vec<GraphName>,
}

/// Mapping of tracked paths to their graphs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphMap {
    files: BTreeMap<String, TrackedFile>,
}

impl GraphMap {
    /// Build the map for one tree.
    ///
    /// `tree` lists every blob path with its id; `read_blob` is used to read
    /// sidecar files. Unreadable sidecars and invalid IRIs are skipped with a
    /// warning.
    pub fn from_tree(
        entries: &[GraphEntry],
        tree: &BTreeMap<String, Oid>,
        mut read_blob: impl FnMut(&Oid) -> Option<String>,
    ) -> Self {
        let mut map = Self::default();

        for entry in entries {
            match NamedNode::new(&entry.uri) {
                Ok(iri) => map.track(&entry.file, GraphName::NamedNode(iri)),
                Err(e) => tracing::warn!(uri = %entry.uri, error = %e, "skipping graph entry"),
            }
        }

        for (path, oid) in tree {
            let Some(target) = path.strip_suffix(SIDECAR_SUFFIX) else {
                continue;
            };
            if FileFormat::from_path(target).is_none() || !tree.contains_key(target) {
                continue;
            }
            let Some(content) = read_blob(oid) else {
                tracing::warn!(path = %path, "unreadable sidecar file");
                continue;
            };
            match NamedNode::new(content.trim()) {
                Ok(iri) => map.track(target, GraphName::NamedNode(iri)),
                Err(e) => tracing::warn!(path = %path, error = %e, "invalid graph IRI in sidecar"),
            }
        }

        for path in tree.keys() {
            if FileFormat::from_path(path) == Some(FileFormat::NQuads) {
                map.files.entry(path.clone()).or_insert(TrackedFile {
                    format: FileFormat::NQuads,
                    graphs: Vec::new(),
                });
            }
        }

        map
    }

    fn track(&mut self, path: &str, graph: GraphName) {
        let Some(format) = FileFormat::from_path(path) else {
            return;
        };
        let file = self.files.entry(path.to_string()).or_insert(TrackedFile {
            format,
            graphs: Vec::new(),
        });
        if !file.graphs.contains(&graph) {
            file.graphs.push(graph);
        }
    }

    pub fn is_tracked(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&TrackedFile> {
        self.files.get(path)
    }

    /// Graphs mapped to `path`; empty when untracked.
    pub fn graphs_of(&self, path: &str) -> &[GraphName] {
        self.files
            .get(path)
            .map(|f| f.graphs.as_slice())
            .unwrap_or(&[])
    }

    /// First file (in path order) with an explicit mapping to `graph`.
    pub fn file_for_graph(&self, graph: &GraphName) -> Option<&str> {
        self.files
            .iter()
            .find(|(_, file)| file.graphs.contains(graph))
            .map(|(path, _)| path.as_str())
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &TrackedFile)> {
        self.files.iter().map(|(path, file)| (path.as_str(), file))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
