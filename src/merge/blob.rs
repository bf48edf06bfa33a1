//! merge::blob
//!
//! Content-level merge of one statement file.
//!
//! Both sides and the merge base are parsed, blank nodes are colored (see
//! [`coloring`](super::coloring)) and each side's additions and removals
//! are computed against the base by color-normalized statement equality.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use oxrdf::{GraphName, Quad};
use serde::Serialize;

use super::coloring::{self, blank_labels};
use crate::core::rdf::{parse_statements, statement_line, triple_of, FileFormat, RdfError};

/// How diverging statement files are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Union of both sides' changes, no conflict detection
    #[default]
    ThreeWay,
    /// Changes touching the same blank node on both sides conflict
    Context,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::ThreeWay => f.write_str("three-way"),
            Strategy::Context => f.write_str("context"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "three-way" | "threeway" | "3way" => Ok(Strategy::ThreeWay),
            "context" => Ok(Strategy::Context),
            other => Err(format!(
                "unknown merge strategy '{other}' (expected three-way or context)"
            )),
        }
    }
}

/// Conflict in one file, with the part that did merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlobConflict {
    /// Statements of the merge without the conflicting changes
    pub merged: Vec<String>,
    pub additions_target: Vec<String>,
    pub removals_target: Vec<String>,
    pub additions_branch: Vec<String>,
    pub removals_branch: Vec<String>,
    /// Conflicting blank nodes (`_:label`)
    pub nodes: Vec<String>,
}

/// Failure of a content merge.
#[derive(Debug)]
pub enum BlobMergeError {
    Syntax(RdfError),
    Conflict(BlobConflict),
}

impl From<RdfError> for BlobMergeError {
    fn from(err: RdfError) -> Self {
        BlobMergeError::Syntax(err)
    }
}

type Statements = BTreeMap<String, Quad>;

fn minus(a: &Statements, b: &Statements) -> Statements {
    a.iter()
        .filter(|(key, _)| !b.contains_key(*key))
        .map(|(key, quad)| (key.clone(), quad.clone()))
        .collect()
}

fn colors_of(sets: &[&Statements]) -> HashSet<String> {
    sets.iter()
        .flat_map(|set| set.values())
        .flat_map(|quad| blank_labels(quad).map(str::to_string).collect::<Vec<_>>())
        .collect()
}

/// Split a change set into statements free of `conflicting` colors and the rest.
fn partition(set: &Statements, conflicting: &HashSet<String>) -> (Statements, Statements) {
    set.iter()
        .map(|(key, quad)| (key.clone(), quad.clone()))
        .partition(|(_, quad)| !blank_labels(quad).any(|color| conflicting.contains(color)))
}

/// Merge `target` and `branch` versions of one file against `base`.
///
/// Absent versions are empty. Returns the merged file content: sorted
/// statement lines joined by `\n`.
///
/// A blank node's color follows its statements, so a node edited on both
/// sides gets a different color in each. A three-way merge then keeps two
/// nodes, each carrying the base statements plus one side's edit.
///
/// # Errors
///
/// - [`BlobMergeError::Syntax`] if a version cannot be parsed
/// - [`BlobMergeError::Conflict`] for context merges with overlapping changes
pub fn merge_content(
    path: &str,
    target: &str,
    branch: &str,
    base: Option<&str>,
    strategy: Strategy,
) -> Result<String, BlobMergeError> {
    let format = FileFormat::from_path(path).unwrap_or(FileFormat::NQuads);
    let parse = |content: &str| parse_statements(path, content, format, &GraphName::DefaultGraph);

    let base = parse(base.unwrap_or(""))?;
    let target = parse(target)?;
    let branch = parse(branch)?;

    let colors = coloring::color_versions(&[&base, &target, &branch]);
    let labels = coloring::label_map(&colors);
    let base = coloring::normalize(&base, &colors[0]);
    let target = coloring::normalize(&target, &colors[1]);
    let branch = coloring::normalize(&branch, &colors[2]);

    let add_target = minus(&target, &base);
    let rem_target = minus(&base, &target);
    let add_branch = minus(&branch, &base);
    let rem_branch = minus(&base, &branch);

    let render = |set: &Statements| -> Vec<String> {
        let lines: BTreeSet<String> = set
            .values()
            .map(|quad| {
                let quad = coloring::rename(quad, &labels);
                statement_line(&triple_of(&quad), &quad.graph_name, format)
            })
            .collect();
        lines.into_iter().collect()
    };
    let combine = |removals: [&Statements; 2], additions: [&Statements; 2]| -> Statements {
        let mut merged: Statements = base
            .iter()
            .filter(|(key, _)| !removals.iter().any(|r| r.contains_key(*key)))
            .map(|(key, quad)| (key.clone(), quad.clone()))
            .collect();
        for set in additions {
            merged.extend(set.iter().map(|(k, q)| (k.clone(), q.clone())));
        }
        merged
    };

    match strategy {
        Strategy::ThreeWay => {
            let merged = combine([&rem_target, &rem_branch], [&add_target, &add_branch]);
            Ok(render(&merged).join("\n"))
        }
        Strategy::Context => {
            let touched_target = colors_of(&[&add_target, &rem_target]);
            let touched_branch = colors_of(&[&add_branch, &rem_branch]);
            let conflicting: HashSet<String> =
                touched_target.intersection(&touched_branch).cloned().collect();

            let (ok_add_target, bad_add_target) = partition(&add_target, &conflicting);
            let (ok_rem_target, bad_rem_target) = partition(&rem_target, &conflicting);
            let (ok_add_branch, bad_add_branch) = partition(&add_branch, &conflicting);
            let (ok_rem_branch, bad_rem_branch) = partition(&rem_branch, &conflicting);

            let merged = combine(
                [&ok_rem_target, &ok_rem_branch],
                [&ok_add_target, &ok_add_branch],
            );
            if conflicting.is_empty() {
                return Ok(render(&merged).join("\n"));
            }

            let mut nodes: Vec<String> = conflicting
                .iter()
                .map(|color| {
                    let label = labels.get(color).cloned().unwrap_or_else(|| format!("c{color}"));
                    format!("_:{label}")
                })
                .collect();
            nodes.sort();
            tracing::debug!(path, nodes = ?nodes, "context merge conflict");

            Err(BlobMergeError::Conflict(BlobConflict {
                merged: render(&merged),
                additions_target: render(&bad_add_target),
                removals_target: render(&bad_rem_target),
                additions_branch: render(&bad_add_branch),
                removals_branch: render(&bad_rem_branch),
                nodes,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "<http://ex.org/a> <http://ex.org/p> _:x .";

    #[test]
    fn strategy_parsing() {
        assert_eq!("three-way".parse::<Strategy>(), Ok(Strategy::ThreeWay));
        assert_eq!("Context".parse::<Strategy>(), Ok(Strategy::Context));
        assert!("ours".parse::<Strategy>().is_err());
        assert_eq!(Strategy::default().to_string(), "three-way");
    }

    mod three_way {
        use super::*;

        #[test]
        fn unions_independent_additions() {
            let base = "<http://ex.org/a> <http://ex.org/p> <http://ex.org/b> .";
            let target = format!("{base}\n<http://ex.org/t> <http://ex.org/p> <http://ex.org/b> .");
            let branch = format!("{base}\n<http://ex.org/u> <http://ex.org/p> <http://ex.org/b> .");

            let merged = merge_content("g.nt", &target, &branch, Some(base), Strategy::ThreeWay).unwrap();
            assert_eq!(
                merged,
                "<http://ex.org/a> <http://ex.org/p> <http://ex.org/b> .\n\
                 <http://ex.org/t> <http://ex.org/p> <http://ex.org/b> .\n\
                 <http://ex.org/u> <http://ex.org/p> <http://ex.org/b> ."
            );
        }

        #[test]
        fn removal_on_one_side_wins() {
            let base = "<http://ex.org/a> <http://ex.org/p> <http://ex.org/b> .\n<http://ex.org/c> <http://ex.org/p> <http://ex.org/d> .";
            let target = "<http://ex.org/a> <http://ex.org/p> <http://ex.org/b> .";
            let merged = merge_content("g.nt", target, base, Some(base), Strategy::ThreeWay).unwrap();
            assert_eq!(merged, target);
        }

        #[test]
        fn relabeled_blank_nodes_are_not_changes() {
            let branch = "<http://ex.org/a> <http://ex.org/p> _:renamed .";
            let target = format!("{BASE}\n<http://ex.org/z> <http://ex.org/p> <http://ex.org/b> .");
            let merged = merge_content("g.nt", &target, branch, Some(BASE), Strategy::ThreeWay).unwrap();
            assert_eq!(
                merged,
                "<http://ex.org/a> <http://ex.org/p> _:renamed .\n\
                 <http://ex.org/z> <http://ex.org/p> <http://ex.org/b> ."
            );
        }

        #[test]
        fn missing_base_is_empty() {
            let merged = merge_content(
                "g.nt",
                "<http://ex.org/a> <http://ex.org/p> <http://ex.org/b> .",
                "<http://ex.org/c> <http://ex.org/p> <http://ex.org/d> .",
                None,
                Strategy::ThreeWay,
            )
            .unwrap();
            assert_eq!(merged.lines().count(), 2);
        }
    }

    mod context {
        use super::*;

        #[test]
        fn same_blank_node_changed_on_both_sides_conflicts() {
            let target = "<http://ex.org/a> <http://ex.org/p> <http://ex.org/o1> .";
            let branch = "<http://ex.org/a> <http://ex.org/p> <http://ex.org/o2> .";

            match merge_content("g.nt", target, branch, Some(BASE), Strategy::Context) {
                Err(BlobMergeError::Conflict(conflict)) => {
                    assert_eq!(conflict.nodes, vec!["_:x".to_string()]);
                    assert_eq!(conflict.removals_target, vec![BASE.to_string()]);
                    assert_eq!(conflict.removals_branch, vec![BASE.to_string()]);
                    assert!(conflict.merged.contains(&BASE.to_string()));
                    assert!(conflict
                        .merged
                        .contains(&"<http://ex.org/a> <http://ex.org/p> <http://ex.org/o1> .".to_string()));
                }
                other => panic!("expected conflict, got {other:?}"),
            }
        }

        #[test]
        fn disjoint_changes_merge_cleanly() {
            let base = "<http://ex.org/a> <http://ex.org/p> <http://ex.org/b> .";
            let target = format!("{base}\n<http://ex.org/t> <http://ex.org/p> _:t .");
            let branch = format!("{base}\n<http://ex.org/u> <http://ex.org/q> _:u .");
            let merged = merge_content("g.nt", &target, &branch, Some(base), Strategy::Context).unwrap();
            assert_eq!(merged.lines().count(), 3);
        }
    }

    #[test]
    fn syntax_errors_surface() {
        assert!(matches!(
            merge_content("g.nt", "not rdf", "", None, Strategy::ThreeWay),
            Err(BlobMergeError::Syntax(_))
        ));
    }
}
