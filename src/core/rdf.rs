//! core::rdf
//!
//! RDF term glue between statement files and in-memory graphs.
//!
//! Statement files are line oriented: one N-Triples statement per line for
//! `.nt` files (the graph comes from the graph map) and one N-Quads statement
//! per line for `.nq` files. This module parses those files with `oxttl`,
//! renders terms back into canonical lines, and provides [`Dataset`], the
//! read-only aggregate that the sync engine hands out per commit.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use oxrdf::{GraphName, NamedNode, Quad, Subject, Term, Triple};
use oxttl::{NQuadsParser, NTriplesParser};
use thiserror::Error;

/// Errors raised while reading statements.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RdfError {
    #[error("syntax error in {source_name}: {message}")]
    Syntax {
        /// File path or a description of the input
        source_name: String,
        message: String,
    },
}

/// Line format of a tracked statement file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    /// `<s> <p> <o> .` — the graph is implied by the graph map.
    NTriples,
    /// `<s> <p> <o> <g> .` — the graph is part of every line.
    NQuads,
}

impl FileFormat {
    /// Derive the format from a file extension.
    ///
    /// ```
    /// use quadvc::core::rdf::FileFormat;
    ///
    /// assert_eq!(FileFormat::from_path("data/graph.nt"), Some(FileFormat::NTriples));
    /// assert_eq!(FileFormat::from_path("unassigned.nq"), Some(FileFormat::NQuads));
    /// assert_eq!(FileFormat::from_path("README.md"), None);
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        match path.as_ref().extension()?.to_str()? {
            "nt" => Some(Self::NTriples),
            "nq" => Some(Self::NQuads),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NTriples => "nt",
            Self::NQuads => "nquads",
        }
    }
}

/// Render one statement as a line in the given file format.
///
/// N-Triples lines drop the graph; N-Quads lines omit it only for the
/// default graph.
pub fn statement_line(triple: &Triple, graph: &GraphName, format: FileFormat) -> String {
    match (format, graph) {
        (FileFormat::NQuads, GraphName::NamedNode(g)) => format!(
            "{} {} {} {} .",
            triple.subject, triple.predicate, triple.object, g
        ),
        (FileFormat::NQuads, GraphName::BlankNode(g)) => format!(
            "{} {} {} {} .",
            triple.subject, triple.predicate, triple.object, g
        ),
        _ => format!("{} {} {} .", triple.subject, triple.predicate, triple.object),
    }
}

/// Render a quad as an N-Quads line.
pub fn quad_line(quad: &Quad) -> String {
    statement_line(&triple_of(quad), &quad.graph_name, FileFormat::NQuads)
}

/// Split the triple out of a quad.
pub fn triple_of(quad: &Quad) -> Triple {
    Triple::new(
        quad.subject.clone(),
        quad.predicate.clone(),
        quad.object.clone(),
    )
}

/// Parse the content of a statement file.
///
/// For N-Triples files every statement is placed into `graph`; N-Quads
/// files carry their own graph names.
///
/// # Errors
///
/// Returns [`RdfError::Syntax`] on the first malformed statement.
pub fn parse_statements(
    source_name: &str,
    content: &str,
    format: FileFormat,
    graph: &GraphName,
) -> Result<Vec<Quad>, RdfError> {
    let syntax = |e: &dyn std::fmt::Display| RdfError::Syntax {
        source_name: source_name.to_string(),
        message: e.to_string(),
    };

    match format {
        FileFormat::NTriples => NTriplesParser::new()
            .for_slice(content.as_bytes())
            .map(|triple| {
                triple
                    .map(|t| Quad::new(t.subject, t.predicate, t.object, graph.clone()))
                    .map_err(|e| syntax(&e))
            })
            .collect(),
        FileFormat::NQuads => NQuadsParser::new()
            .for_slice(content.as_bytes())
            .map(|quad| quad.map_err(|e| syntax(&e)))
            .collect(),
    }
}

/// Parse a single N-Triples statement (with or without the final dot).
pub fn parse_triple(text: &str) -> Result<Triple, RdfError> {
    let text = text.trim();
    let line = if text.ends_with('.') {
        text.to_string()
    } else {
        format!("{text} .")
    };
    let mut quads = parse_statements("triple", &line, FileFormat::NTriples, &GraphName::DefaultGraph)?;
    match (quads.pop(), quads.is_empty()) {
        (Some(quad), true) => Ok(triple_of(&quad)),
        _ => Err(RdfError::Syntax {
            source_name: "triple".to_string(),
            message: format!("expected exactly one statement in '{text}'"),
        }),
    }
}

/// Parse a graph identifier as used in deltas and configuration.
///
/// `"default"` (or an empty string) names the default graph; anything else
/// must be an absolute IRI, with or without angle brackets.
pub fn parse_graph_name(text: &str) -> Result<GraphName, RdfError> {
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("default") {
        return Ok(GraphName::DefaultGraph);
    }
    let iri = text
        .strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
        .unwrap_or(text);
    NamedNode::new(iri)
        .map(GraphName::NamedNode)
        .map_err(|e| RdfError::Syntax {
            source_name: "graph name".to_string(),
            message: e.to_string(),
        })
}

/// Read-only aggregate of named graphs.
///
/// A `Dataset` is what [`crate::sync::SyncEngine::instance`] returns: the
/// union of every tracked file's graphs at one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    graphs: HashMap<GraphName, HashSet<Triple>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one quad. Returns false when it was already present.
    pub fn insert(&mut self, quad: Quad) -> bool {
        let triple = triple_of(&quad);
        self.graphs.entry(quad.graph_name).or_default().insert(triple)
    }

    /// Union another set of triples into `graph`.
    pub fn extend_graph<'a>(
        &mut self,
        graph: &GraphName,
        triples: impl IntoIterator<Item = &'a Triple>,
    ) {
        let target = self.graphs.entry(graph.clone()).or_default();
        target.extend(triples.into_iter().cloned());
    }

    /// Names of all graphs holding at least one triple.
    pub fn graph_names(&self) -> Vec<&GraphName> {
        let mut names: Vec<_> = self
            .graphs
            .iter()
            .filter(|(_, triples)| !triples.is_empty())
            .map(|(name, _)| name)
            .collect();
        names.sort_by_key(|name| name.to_string());
        names
    }

    pub fn graph(&self, name: &GraphName) -> Option<&HashSet<Triple>> {
        self.graphs.get(name)
    }

    pub fn contains(&self, triple: &Triple, graph: &GraphName) -> bool {
        self.graphs
            .get(graph)
            .is_some_and(|triples| triples.contains(triple))
    }

    /// Total number of quads.
    pub fn len(&self) -> usize {
        self.graphs.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn quads(&self) -> impl Iterator<Item = Quad> + '_ {
        self.graphs.iter().flat_map(|(graph, triples)| {
            triples.iter().map(move |t| {
                Quad::new(
                    t.subject.clone(),
                    t.predicate.clone(),
                    t.object.clone(),
                    graph.clone(),
                )
            })
        })
    }

    /// Basic pattern match; `None` positions are wildcards.
    pub fn quads_matching(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        graph: Option<&GraphName>,
    ) -> Vec<Quad> {
        self.quads()
            .filter(|q| subject.is_none_or(|s| &q.subject == s))
            .filter(|q| predicate.is_none_or(|p| &q.predicate == p))
            .filter(|q| object.is_none_or(|o| &q.object == o))
            .filter(|q| graph.is_none_or(|g| &q.graph_name == g))
            .collect()
    }

    /// Sorted N-Quads serialization, one statement per line.
    pub fn to_nquads(&self) -> String {
        let mut lines: Vec<String> = self.quads().map(|q| quad_line(&q)).collect();
        lines.sort();
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(s: &str) -> NamedNode {
        NamedNode::new(s).unwrap()
    }

    #[test]
    fn statement_lines_follow_format() {
        let triple = Triple::new(iri("http://ex.org/a"), iri("http://ex.org/p"), iri("http://ex.org/b"));
        let graph = GraphName::NamedNode(iri("http://ex.org/g"));
        assert_eq!(
            statement_line(&triple, &graph, FileFormat::NTriples),
            "<http://ex.org/a> <http://ex.org/p> <http://ex.org/b> ."
        );
        assert_eq!(
            statement_line(&triple, &graph, FileFormat::NQuads),
            "<http://ex.org/a> <http://ex.org/p> <http://ex.org/b> <http://ex.org/g> ."
        );
        assert_eq!(
            statement_line(&triple, &GraphName::DefaultGraph, FileFormat::NQuads),
            "<http://ex.org/a> <http://ex.org/p> <http://ex.org/b> ."
        );
    }

    #[test]
    fn parses_ntriples_into_graph() {
        let graph = GraphName::NamedNode(iri("http://ex.org/g"));
        let content = "<http://ex.org/a> <http://ex.org/p> \"x\" .\n<http://ex.org/a> <http://ex.org/p> _:b1 .\n";
        let quads = parse_statements("g.nt", content, FileFormat::NTriples, &graph).unwrap();
        assert_eq!(quads.len(), 2);
        assert!(quads.iter().all(|q| q.graph_name == graph));
    }

    #[test]
    fn parses_nquads_graphs() {
        let content = "<http://ex.org/a> <http://ex.org/p> <http://ex.org/b> <http://ex.org/g1> .\n\
                       <http://ex.org/a> <http://ex.org/p> <http://ex.org/b> .";
        let quads =
            parse_statements("x.nq", content, FileFormat::NQuads, &GraphName::DefaultGraph).unwrap();
        assert_eq!(quads.len(), 2);
        assert!(quads.iter().any(|q| q.graph_name == GraphName::DefaultGraph));
    }

    #[test]
    fn syntax_errors_name_the_source() {
        let err = parse_statements("bad.nt", "not rdf", FileFormat::NTriples, &GraphName::DefaultGraph)
            .unwrap_err();
        assert!(err.to_string().contains("bad.nt"));
    }

    #[test]
    fn parse_triple_accepts_missing_dot() {
        let t = parse_triple("<http://ex.org/a> <http://ex.org/p> \"v\"@en").unwrap();
        assert_eq!(t.predicate, iri("http://ex.org/p"));
        assert!(parse_triple("").is_err());
    }

    #[test]
    fn graph_names() {
        assert_eq!(parse_graph_name("default").unwrap(), GraphName::DefaultGraph);
        assert_eq!(
            parse_graph_name("<http://ex.org/g>").unwrap(),
            GraphName::NamedNode(iri("http://ex.org/g"))
        );
        assert!(parse_graph_name("not an iri").is_err());
    }

    #[test]
    fn dataset_matching_and_serialization() {
        let g = GraphName::NamedNode(iri("http://ex.org/g"));
        let mut ds = Dataset::new();
        assert!(ds.insert(Quad::new(iri("http://ex.org/b"), iri("http://ex.org/p"), iri("http://ex.org/o"), g.clone())));
        assert!(ds.insert(Quad::new(iri("http://ex.org/a"), iri("http://ex.org/p"), iri("http://ex.org/o"), g.clone())));
        assert!(!ds.insert(Quad::new(iri("http://ex.org/a"), iri("http://ex.org/p"), iri("http://ex.org/o"), g.clone())));

        assert_eq!(ds.len(), 2);
        let subject = Subject::NamedNode(iri("http://ex.org/a"));
        assert_eq!(ds.quads_matching(Some(&subject), None, None, None).len(), 1);
        assert!(ds.to_nquads().starts_with("<http://ex.org/a>"));
        assert_eq!(ds.graph_names(), vec![&g]);
    }
}
