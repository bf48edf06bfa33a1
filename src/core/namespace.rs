//! core::namespace
//!
//! Vocabulary used by the provenance graph.
//!
//! Terms come from W3C PROV-O, the QUIT vocabulary, FOAF and RDFS. RDF and
//! XSD terms are taken from [`oxrdf::vocab`].

use oxrdf::NamedNodeRef;

pub const PROV: &str = "http://www.w3.org/ns/prov#";
pub const QUIT: &str = "http://quit.aksw.org/vocab/";

pub mod prov {
    use super::NamedNodeRef;

    pub const ACTIVITY: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#Activity");
    pub const AGENT: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#Agent");
    pub const ASSOCIATION: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#Association");
    pub const STARTED_AT_TIME: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#startedAtTime");
    pub const ENDED_AT_TIME: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#endedAtTime");
    pub const WAS_ASSOCIATED_WITH: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#wasAssociatedWith");
    pub const QUALIFIED_ASSOCIATION: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#qualifiedAssociation");
    pub const AGENT_PROP: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#agent");
    pub const ROLE: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#role");
    pub const SPECIALIZATION_OF: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#specializationOf");
    pub const WAS_GENERATED_BY: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#wasGeneratedBy");
    pub const WAS_DERIVED_FROM: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#wasDerivedFrom");
}

pub mod quit {
    use super::NamedNodeRef;

    pub const QUERY: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://quit.aksw.org/vocab/query");
    pub const HEX: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://quit.aksw.org/vocab/hex");
    pub const PRECEEDING_COMMIT: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://quit.aksw.org/vocab/preceedingCommit");
    pub const UPDATES: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://quit.aksw.org/vocab/updates");
    pub const GRAPH: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://quit.aksw.org/vocab/graph");
    pub const ADDITION: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://quit.aksw.org/vocab/addition");
    pub const REMOVAL: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://quit.aksw.org/vocab/removal");
    pub const AUTHOR: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://quit.aksw.org/vocab/author");
    pub const COMMITTER: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://quit.aksw.org/vocab/committer");
    pub const UPDATE: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://quit.aksw.org/vocab/Update");
}

pub mod foaf {
    use super::NamedNodeRef;

    pub const MBOX: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://xmlns.com/foaf/0.1/mbox");
}

/// Graph that holds provenance records.
pub const PROVENANCE_GRAPH: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://quit.aksw.org/vocab/provenance");
