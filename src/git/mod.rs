//! git
//!
//! Single interface to the object store.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to git. Commits, trees, blobs, refs
//! and remotes are read and written here; the sync and merge layers see
//! strong types only ([`Oid`](crate::core::types::Oid),
//! [`RefName`](crate::core::types::RefName), [`Revision`]). No other
//! module imports `git2`.
//!
//! # Responsibilities
//!
//! - Repository opening, initialization and cloning
//! - Name resolution (branches, tags, full refs, `FETCH_HEAD`, hashes)
//! - Revision walks and tree/blob access
//! - Staging and committing through an [`Index`]
//! - Ref updates with compare-and-swap semantics
//! - Fetch and push with pluggable credentials
//!
//! # Invariants
//!
//! - Ref moves check the expected old value
//! - A commit never lands on a ref whose tip is not the commit's first parent
//! - An [`Index`] commits at most once
//!
//! # Example
//!
//! ```no_run
//! use quadvc::git::{Repository, Signature};
//! use std::path::Path;
//!
//! let repo = Repository::create(Path::new("/srv/store"), None, true)?;
//! let mut index = repo.index(None);
//! index.add("graph.nt", b"<urn:a> <urn:b> <urn:c> .")?;
//!
//! let me = Signature::now("Ada", "ada@example.org");
//! index.commit("initial", &me, &me, None, "refs/heads/master")?;
//! # Ok::<(), quadvc::git::GitError>(())
//! ```

pub mod credentials;
mod index;
mod interface;
mod remote;

pub use credentials::{AllowedKinds, Credential, CredentialProvider, EnvCredentials};
pub use index::Index;
pub use interface::{
    ChangeStatus, GitError, Node, NodeKind, Repository, Revision, Signature, SortOrder, TreeChange,
    FILE_MODE,
};
pub use remote::Refspec;
