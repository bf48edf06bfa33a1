//! merge::coloring
//!
//! Structural colors for blank nodes.
//!
//! Blank node labels mean nothing across two versions of a file, so the
//! merge compares blank nodes by structure instead. Each blank node starts
//! with the same color; every round replaces a node's color with a digest
//! of its old color and the sorted signatures of the statements it occurs
//! in, where neighbors contribute their own current color (named nodes and
//! literals contribute their lexical form).
//!
//! All versions are refined together for the same number of rounds, so a
//! color only depends on the node's neighborhood, never on which version it
//! came from. Refinement stops once no version's partition splits further,
//! or after [`MAX_REFINEMENT_ROUNDS`]. Nodes of one version still sharing a
//! color afterwards (symmetric structures) are individualized by label
//! order.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use oxrdf::{BlankNode, GraphName, Quad, Subject, Term};
use sha2::{Digest, Sha256};

/// Upper bound on refinement rounds.
pub const MAX_REFINEMENT_ROUNDS: usize = 32;

/// Blank node label -> color, for one version.
pub type Colors = HashMap<String, String>;

fn digest<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

fn subject_blank(subject: &Subject) -> Option<&str> {
    match subject {
        Subject::BlankNode(node) => Some(node.as_str()),
        _ => None,
    }
}

fn term_blank(term: &Term) -> Option<&str> {
    match term {
        Term::BlankNode(node) => Some(node.as_str()),
        _ => None,
    }
}

fn graph_blank(graph: &GraphName) -> Option<&str> {
    match graph {
        GraphName::BlankNode(node) => Some(node.as_str()),
        _ => None,
    }
}

/// Blank node labels used by a quad.
pub fn blank_labels(quad: &Quad) -> impl Iterator<Item = &str> {
    [
        subject_blank(&quad.subject),
        term_blank(&quad.object),
        graph_blank(&quad.graph_name),
    ]
    .into_iter()
    .flatten()
}

fn key(label: Option<&str>, lexical: impl FnOnce() -> String, colors: &Colors) -> String {
    match label {
        Some(label) => format!("_:{}", colors.get(label).map(String::as_str).unwrap_or("")),
        None => lexical(),
    }
}

fn refine_once(quads: &[Quad], colors: &Colors) -> Colors {
    let mut signatures: HashMap<&str, Vec<String>> = HashMap::new();

    for quad in quads {
        let s = key(subject_blank(&quad.subject), || quad.subject.to_string(), colors);
        let p = quad.predicate.as_str();
        let o = key(term_blank(&quad.object), || quad.object.to_string(), colors);
        let g = key(graph_blank(&quad.graph_name), || quad.graph_name.to_string(), colors);

        if let Some(label) = subject_blank(&quad.subject) {
            signatures.entry(label).or_default().push(format!("+ {p} {o} {g}"));
        }
        if let Some(label) = term_blank(&quad.object) {
            signatures.entry(label).or_default().push(format!("- {s} {p} {g}"));
        }
        if let Some(label) = graph_blank(&quad.graph_name) {
            signatures.entry(label).or_default().push(format!("@ {s} {p} {o}"));
        }
    }

    colors
        .iter()
        .map(|(label, color)| {
            let mut sigs = signatures.remove(label.as_str()).unwrap_or_default();
            sigs.sort();
            let next = digest(std::iter::once(color.as_str()).chain(sigs.iter().map(String::as_str)));
            (label.clone(), next)
        })
        .collect()
}

fn class_count(colors: &Colors) -> usize {
    colors.values().collect::<HashSet<_>>().len()
}

/// Color every blank node of every version.
///
/// The result has one map per input version, in input order.
pub fn color_versions(versions: &[&[Quad]]) -> Vec<Colors> {
    let start = digest(["blank"]);
    let mut colors: Vec<Colors> = versions
        .iter()
        .map(|quads| {
            quads
                .iter()
                .flat_map(blank_labels)
                .map(|label| (label.to_string(), start.clone()))
                .collect()
        })
        .collect();

    let mut classes: Vec<usize> = colors.iter().map(class_count).collect();
    let mut rounds = 0;
    while rounds < MAX_REFINEMENT_ROUNDS {
        rounds += 1;
        let next: Vec<Colors> = versions
            .iter()
            .zip(&colors)
            .map(|(quads, current)| refine_once(quads, current))
            .collect();
        let next_classes: Vec<usize> = next.iter().map(class_count).collect();
        colors = next;
        if next_classes == classes {
            break;
        }
        classes = next_classes;
    }
    tracing::debug!(rounds, "blank node colors refined");

    colors.iter_mut().for_each(individualize);
    colors
}

/// Split classes that still hold several nodes, in label order.
fn individualize(colors: &mut Colors) {
    let mut classes: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (label, color) in colors.iter() {
        classes.entry(color.clone()).or_default().push(label.clone());
    }
    for (color, mut labels) in classes {
        if labels.len() < 2 {
            continue;
        }
        labels.sort();
        for (position, label) in labels.into_iter().enumerate() {
            let rank = position.to_string();
            colors.insert(label, digest([color.as_str(), "#", rank.as_str()]));
        }
    }
}

/// Choose one output label per color.
///
/// Colors are visited in order; each takes the smallest original label that
/// carried it and is still free, else `c<color>`.
pub fn label_map(colors: &[Colors]) -> HashMap<String, String> {
    let mut candidates: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for version in colors {
        for (label, color) in version {
            candidates.entry(color.as_str()).or_default().insert(label.as_str());
        }
    }

    let mut taken = HashSet::new();
    let mut labels = HashMap::new();
    for (color, names) in candidates {
        let chosen = names
            .into_iter()
            .find(|name| !taken.contains(*name))
            .map(str::to_string)
            .unwrap_or_else(|| format!("c{color}"));
        taken.insert(chosen.clone());
        labels.insert(color.to_string(), chosen);
    }
    labels
}

fn recolor_subject(subject: &Subject, colors: &Colors) -> Subject {
    match subject_blank(subject).and_then(|label| colors.get(label)) {
        Some(color) => BlankNode::new_unchecked(color.clone()).into(),
        None => subject.clone(),
    }
}

fn recolor_term(term: &Term, colors: &Colors) -> Term {
    match term_blank(term).and_then(|label| colors.get(label)) {
        Some(color) => BlankNode::new_unchecked(color.clone()).into(),
        None => term.clone(),
    }
}

fn recolor_graph(graph: &GraphName, colors: &Colors) -> GraphName {
    match graph_blank(graph).and_then(|label| colors.get(label)) {
        Some(color) => BlankNode::new_unchecked(color.clone()).into(),
        None => graph.clone(),
    }
}

/// Replace blank node labels through `map` (label -> label or color).
pub fn rename(quad: &Quad, map: &HashMap<String, String>) -> Quad {
    Quad::new(
        recolor_subject(&quad.subject, map),
        quad.predicate.clone(),
        recolor_term(&quad.object, map),
        recolor_graph(&quad.graph_name, map),
    )
}

/// Quads with blank nodes replaced by their colors, keyed by N-Quads line.
pub fn normalize(quads: &[Quad], colors: &Colors) -> BTreeMap<String, Quad> {
    quads
        .iter()
        .map(|quad| {
            let colored = rename(quad, colors);
            (crate::core::rdf::quad_line(&colored), colored)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rdf::{parse_statements, FileFormat};

    fn parse(text: &str) -> Vec<Quad> {
        parse_statements("test.nt", text, FileFormat::NTriples, &GraphName::DefaultGraph).unwrap()
    }

    #[test]
    fn same_structure_same_color_across_versions() {
        let a = parse("<http://ex.org/s> <http://ex.org/p> _:x .\n_:x <http://ex.org/q> \"1\" .");
        let b = parse("<http://ex.org/s> <http://ex.org/p> _:other .\n_:other <http://ex.org/q> \"1\" .");
        let colors = color_versions(&[&a, &b]);
        assert_eq!(colors[0]["x"], colors[1]["other"]);
    }

    #[test]
    fn different_structure_different_color() {
        let a = parse("<http://ex.org/s> <http://ex.org/p> _:x .");
        let b = parse("<http://ex.org/s> <http://ex.org/q> _:x .");
        let colors = color_versions(&[&a, &b]);
        assert_ne!(colors[0]["x"], colors[1]["x"]);
    }

    #[test]
    fn symmetric_nodes_are_individualized() {
        let a = parse("<http://ex.org/s> <http://ex.org/p> _:a .\n<http://ex.org/s> <http://ex.org/p> _:b .");
        let colors = color_versions(&[&a]);
        assert_ne!(colors[0]["a"], colors[0]["b"]);
    }

    #[test]
    fn labels_prefer_smallest_and_never_collide() {
        let mut first = Colors::new();
        first.insert("z".to_string(), "c1".to_string());
        first.insert("a".to_string(), "c1".to_string());
        let mut second = Colors::new();
        second.insert("a".to_string(), "c2".to_string());

        let labels = label_map(&[first, second]);
        assert_eq!(labels["c1"], "a");
        assert_eq!(labels["c2"], "cc2");
    }

    #[test]
    fn normalize_is_label_independent() {
        let a = parse("<http://ex.org/s> <http://ex.org/p> _:x .");
        let b = parse("<http://ex.org/s> <http://ex.org/p> _:y .");
        let colors = color_versions(&[&a, &b]);
        let na: Vec<_> = normalize(&a, &colors[0]).into_keys().collect();
        let nb: Vec<_> = normalize(&b, &colors[1]).into_keys().collect();
        assert_eq!(na, nb);
    }
}
