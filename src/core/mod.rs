//! core
//!
//! Domain types and data models shared by the store layers.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Oid, RefName
//! - [`cache`] - Thread-safe LRU map used for memoization
//! - [`rdf`] - Statement parsing, line rendering and the aggregate dataset
//! - [`file_ref`] - Canonical form of one tracked statement file
//! - [`delta`] - Per-graph additions and removals of an update
//! - [`message`] - Commit message property convention
//! - [`namespace`] - Provenance vocabulary
//! - [`config`] - Store configuration and the graph↔file map
//!
//! Nothing in here talks to the object store directly.

pub mod cache;
pub mod config;
pub mod delta;
pub mod file_ref;
pub mod message;
pub mod namespace;
pub mod rdf;
pub mod types;
