//! QuadVC - RDF datasets versioned in a git repository
//!
//! QuadVC keeps every named graph of a dataset in line-oriented statement
//! files (`.nt`, `.nq`) inside a git repository. Each update becomes a
//! commit, every commit can be read back as a dataset, and diverging
//! branches are merged at the statement level rather than line by line.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to the library)
//! - [`sync`] - Sync engine: commit → dataset reads, delta → commit writes, provenance
//! - [`merge`] - Merge analysis and statement-level three-way/context merges
//! - [`core`] - Domain types, configuration, RDF glue, caches
//! - [`git`] - Single interface for all object store operations
//!
//! # Invariants
//!
//! 1. All repository writes flow through [`sync::SyncEngine::commit`] or [`merge::Merger`]
//! 2. Statement files are stored sorted and without duplicate lines
//! 3. A synced commit is never synced again
//! 4. Flushing any cache only costs time, never correctness

pub mod cli;
pub mod core;
pub mod git;
pub mod merge;
pub mod sync;
