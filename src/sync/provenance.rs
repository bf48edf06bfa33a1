//! sync::provenance
//!
//! Provenance records derived from commits.
//!
//! Every synced commit becomes a `prov:Activity` in the provenance graph:
//!
//! ```text
//! quit:commit-<id>  a prov:Activity ;
//!     quit:hex "<id>" ;
//!     prov:startedAtTime "<author time>"^^xsd:dateTime ;
//!     prov:endedAtTime "<committer time>"^^xsd:dateTime ;
//!     rdfs:comment "<message>" ;
//!     quit:preceedingCommit quit:commit-<parent> ;
//!     prov:wasAssociatedWith quit:user-<sha256(email)> ;
//!     prov:qualifiedAssociation quit:commit-<id>-author ;
//!     quit:updates quit:update-<id>-<n> .
//!
//! quit:update-<id>-<n> a quit:Update ;
//!     quit:graph <graph> ;
//!     quit:addition quit:additions-<id>-<n> ;
//!     quit:removal quit:removals-<id>-<n> .
//! ```
//!
//! Added and removed triples live in the named graphs
//! `quit:additions-<id>-<n>` / `quit:removals-<id>-<n>`. Graphs are numbered
//! in IRI order. The default graph has no IRI and gets no update record.

use std::collections::HashSet;

use oxrdf::vocab::{rdf, rdfs, xsd};
use oxrdf::{GraphName, Literal, NamedNode, Quad, Subject, Term, Triple};
use sha2::{Digest, Sha256};

use crate::core::namespace::{foaf, prov, quit, PROVENANCE_GRAPH, QUIT};
use crate::core::rdf::Dataset;
use crate::core::types::Oid;
use crate::git::{Revision, Signature};

fn node(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{QUIT}{local}"))
}

/// Activity node of a commit.
pub fn commit_node(id: &Oid) -> NamedNode {
    node(&format!("commit-{id}"))
}

/// Agent node for an email address.
pub fn agent_node(email: &str) -> NamedNode {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    node(&format!("user-{}", hex::encode(digest)))
}

/// Named graph holding the materialized `index`-th graph of a commit.
pub fn materialized_graph(id: &Oid, index: usize) -> NamedNode {
    node(&format!("graph-{id}-{index}"))
}

/// The marker triple that records a commit as synced.
pub fn marker(id: &Oid) -> Triple {
    Triple::new(
        commit_node(id),
        rdf::TYPE.into_owned(),
        prov::ACTIVITY.into_owned(),
    )
}

pub fn provenance_graph() -> GraphName {
    GraphName::NamedNode(PROVENANCE_GRAPH.into_owned())
}

/// Accumulates quads into the provenance graph.
struct Records {
    graph: GraphName,
    quads: Vec<Quad>,
}

impl Records {
    fn new() -> Self {
        Self {
            graph: provenance_graph(),
            quads: Vec::new(),
        }
    }

    fn push(&mut self, s: impl Into<Subject>, p: NamedNode, o: impl Into<Term>) {
        self.quads
            .push(Quad::new(s, p, o, self.graph.clone()));
    }
}

fn timestamp(sig: &Signature) -> Literal {
    Literal::new_typed_literal(sig.time.to_rfc3339(), xsd::DATE_TIME)
}

/// The activity record of a revision, its agents and associations.
pub fn activity(revision: &Revision) -> Vec<Quad> {
    let mut out = Records::new();
    let commit = commit_node(&revision.id);

    out.push(commit.clone(), rdf::TYPE.into_owned(), prov::ACTIVITY.into_owned());
    out.push(
        commit.clone(),
        quit::HEX.into_owned(),
        Literal::new_simple_literal(revision.id.as_str()),
    );
    out.push(
        commit.clone(),
        prov::STARTED_AT_TIME.into_owned(),
        timestamp(&revision.author),
    );
    out.push(
        commit.clone(),
        prov::ENDED_AT_TIME.into_owned(),
        timestamp(&revision.committer),
    );
    if !revision.message().is_empty() {
        out.push(
            commit.clone(),
            rdfs::COMMENT.into_owned(),
            Literal::new_simple_literal(revision.message()),
        );
    }
    if let Some(query) = revision.properties().get(crate::core::message::QUERY_KEY) {
        out.push(
            commit.clone(),
            quit::QUERY.into_owned(),
            Literal::new_simple_literal(query),
        );
    }
    for parent in &revision.parents {
        out.push(
            commit.clone(),
            quit::PRECEEDING_COMMIT.into_owned(),
            commit_node(parent),
        );
    }

    for (role, suffix, sig) in [
        (quit::AUTHOR, "author", &revision.author),
        (quit::COMMITTER, "committer", &revision.committer),
    ] {
        let agent = agent_node(&sig.email);
        let association = node(&format!("commit-{}-{suffix}", revision.id));

        out.push(agent.clone(), rdf::TYPE.into_owned(), prov::AGENT.into_owned());
        out.push(
            agent.clone(),
            rdfs::LABEL.into_owned(),
            Literal::new_simple_literal(&sig.name),
        );
        match NamedNode::new(format!("mailto:{}", sig.email)) {
            Ok(mbox) => out.push(agent.clone(), foaf::MBOX.into_owned(), mbox),
            Err(e) => tracing::debug!(email = %sig.email, error = %e, "no mbox for agent"),
        }

        out.push(
            commit.clone(),
            prov::WAS_ASSOCIATED_WITH.into_owned(),
            agent.clone(),
        );
        out.push(
            commit.clone(),
            prov::QUALIFIED_ASSOCIATION.into_owned(),
            association.clone(),
        );
        out.push(
            association.clone(),
            rdf::TYPE.into_owned(),
            prov::ASSOCIATION.into_owned(),
        );
        out.push(association.clone(), prov::AGENT_PROP.into_owned(), agent);
        out.push(association, prov::ROLE.into_owned(), role.into_owned());
    }

    out.quads
}

/// Update records for the triple-level difference `before` → `after`.
pub fn updates(id: &Oid, before: &Dataset, after: &Dataset) -> Vec<Quad> {
    let mut out = Records::new();
    let commit = commit_node(id);
    let empty = HashSet::new();

    let mut graphs: Vec<&GraphName> = before.graph_names();
    for name in after.graph_names() {
        if !graphs.contains(&name) {
            graphs.push(name);
        }
    }
    graphs.sort_by_key(|g| g.to_string());

    let mut index = 0;
    for graph in graphs {
        let GraphName::NamedNode(iri) = graph else {
            continue;
        };
        let old = before.graph(graph).unwrap_or(&empty);
        let new = after.graph(graph).unwrap_or(&empty);

        let mut additions: Vec<&Triple> = new.difference(old).collect();
        let mut removals: Vec<&Triple> = old.difference(new).collect();
        if additions.is_empty() && removals.is_empty() {
            continue;
        }
        additions.sort_by_key(|t| t.to_string());
        removals.sort_by_key(|t| t.to_string());

        let update = node(&format!("update-{id}-{index}"));
        out.push(commit.clone(), quit::UPDATES.into_owned(), update.clone());
        out.push(update.clone(), rdf::TYPE.into_owned(), quit::UPDATE.into_owned());
        out.push(update.clone(), quit::GRAPH.into_owned(), iri.clone());

        for (kind, predicate, triples) in [
            ("additions", quit::ADDITION, additions),
            ("removals", quit::REMOVAL, removals),
        ] {
            if triples.is_empty() {
                continue;
            }
            let target = node(&format!("{kind}-{id}-{index}"));
            out.push(update.clone(), predicate.into_owned(), target.clone());
            let target = GraphName::NamedNode(target);
            out.quads.extend(triples.into_iter().map(|t| {
                Quad::new(
                    t.subject.clone(),
                    t.predicate.clone(),
                    t.object.clone(),
                    target.clone(),
                )
            }));
        }
        index += 1;
    }

    out.quads
}

/// Copy of every graph of `instance` under a commit-specific name, linked to
/// the graph it specializes and to the version it was derived from.
///
/// `previous` returns the materialized name of a graph in the parent commit.
pub fn materialize(
    id: &Oid,
    instance: &Dataset,
    mut previous: impl FnMut(&GraphName) -> Option<NamedNode>,
) -> (Vec<Quad>, Vec<(GraphName, NamedNode)>) {
    let mut out = Records::new();
    let mut names = Vec::new();
    let commit = commit_node(id);

    for (index, graph) in instance.graph_names().into_iter().enumerate() {
        let GraphName::NamedNode(iri) = graph else {
            continue;
        };
        let version = materialized_graph(id, index);
        out.push(
            version.clone(),
            prov::SPECIALIZATION_OF.into_owned(),
            iri.clone(),
        );
        out.push(
            version.clone(),
            prov::WAS_GENERATED_BY.into_owned(),
            commit.clone(),
        );
        if let Some(prior) = previous(graph) {
            out.push(version.clone(), prov::WAS_DERIVED_FROM.into_owned(), prior);
        }

        let target = GraphName::NamedNode(version.clone());
        if let Some(triples) = instance.graph(graph) {
            out.quads.extend(triples.iter().map(|t| {
                Quad::new(
                    t.subject.clone(),
                    t.predicate.clone(),
                    t.object.clone(),
                    target.clone(),
                )
            }));
        }
        names.push((graph.clone(), version));
    }

    (out.quads, names)
}
