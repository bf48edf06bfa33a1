//! merge
//!
//! Merging of graph histories.
//!
//! A merge first runs [`Merger::merge_analysis`], which mirrors libgit2's
//! merge-base analysis, then either moves the target ref (fast-forward,
//! unborn target) or builds a merge commit. Statement files that changed on
//! both sides are merged at the statement level by [`blob::merge_content`];
//! blank nodes are matched across versions by [`coloring`].
//!
//! # Example
//!
//! ```no_run
//! use quadvc::core::config::Config;
//! use quadvc::git::Repository;
//! use quadvc::merge::{Merger, Strategy};
//! use std::path::Path;
//!
//! let repo = Repository::open(Path::new("/srv/store"))?;
//! let config = Config::load(Some(repo.path()))?;
//! let outcome = Merger::new(&repo, &config).merge(Some("master"), Some("develop"), Strategy::Context)?;
//! println!("{outcome:?}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod blob;
pub mod coloring;

use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;

use thiserror::Error;

pub use blob::{merge_content, BlobConflict, BlobMergeError, Strategy};

use crate::core::config::Config;
use crate::core::rdf::FileFormat;
use crate::core::types::{Oid, RefName};
use crate::git::{ChangeStatus, CredentialProvider, GitError, Repository, Signature, TreeChange};

/// Result bits of [`Merger::merge_analysis`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MergeAnalysis(u32);

impl MergeAnalysis {
    /// Unrelated histories
    pub const NONE: Self = Self(0);
    /// A merge commit is required
    pub const NORMAL: Self = Self(1);
    /// The branch is already contained in the target
    pub const UP_TO_DATE: Self = Self(2);
    /// The target can be moved to the branch
    pub const FASTFORWARD: Self = Self(4);
    /// The target has no commit yet
    pub const UNBORN: Self = Self(8);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn is_up_to_date(self) -> bool {
        self.contains(Self::UP_TO_DATE)
    }

    pub fn is_fast_forward(self) -> bool {
        self.contains(Self::FASTFORWARD)
    }

    pub fn is_unborn(self) -> bool {
        self.contains(Self::UNBORN)
    }

    pub fn is_normal(self) -> bool {
        self.contains(Self::NORMAL)
    }
}

impl BitOr for MergeAnalysis {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Errors from merge operations.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The histories share no commit.
    #[error("no merge base between {target} and {branch}")]
    NoMergeBase { target: String, branch: String },

    /// A tree change the merge does not handle (rename, mode change, ...).
    #[error("cannot merge '{path}': {status}")]
    Unsupported { path: String, status: String },

    /// A version of a statement file does not parse.
    #[error("invalid content in '{path}': {message}")]
    InvalidContent { path: String, message: String },

    /// Conflicting changes, per file.
    #[error("merge conflict in {}", .conflicts.keys().cloned().collect::<Vec<_>>().join(", "))]
    Conflict {
        conflicts: BTreeMap<String, BlobConflict>,
    },

    #[error(transparent)]
    Git(#[from] GitError),
}

impl From<crate::core::types::TypeError> for MergeError {
    fn from(err: crate::core::types::TypeError) -> Self {
        MergeError::Git(err.into())
    }
}

/// What a merge did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing to merge
    UpToDate,
    /// The target ref was moved to this commit
    FastForward(Oid),
    /// A merge commit was created
    Merged(Oid),
}

impl MergeOutcome {
    pub fn commit(&self) -> Option<&Oid> {
        match self {
            MergeOutcome::UpToDate => None,
            MergeOutcome::FastForward(id) | MergeOutcome::Merged(id) => Some(id),
        }
    }
}

impl fmt::Display for MergeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeOutcome::UpToDate => f.write_str("already up to date"),
            MergeOutcome::FastForward(id) => write!(f, "fast-forward to {}", id.short()),
            MergeOutcome::Merged(id) => write!(f, "merge commit {}", id.short()),
        }
    }
}

/// Merge driver bound to one repository.
pub struct Merger<'r> {
    repo: &'r Repository,
    author_name: String,
    author_email: String,
    checkout: bool,
}

impl<'r> Merger<'r> {
    pub fn new(repo: &'r Repository, config: &Config) -> Self {
        Self {
            repo,
            author_name: config.author_name().to_string(),
            author_email: config.author_email().to_string(),
            checkout: config.checkout(),
        }
    }

    /// Classify merging `branch` into `target`.
    pub fn merge_analysis(&self, target: &str, branch: &str) -> Result<MergeAnalysis, MergeError> {
        let target_ref = self.repo.qualify_ref(target)?;
        let Some(target_id) = self.resolve_target(target, &target_ref)? else {
            return Ok(MergeAnalysis::UNBORN | MergeAnalysis::FASTFORWARD);
        };
        let branch_id = self.repo.lookup(branch)?;
        Ok(self.analyze(&target_id, &branch_id)?)
    }

    fn analyze(&self, target: &Oid, branch: &Oid) -> Result<MergeAnalysis, GitError> {
        let Some(base) = self.repo.merge_base(target, branch)? else {
            return Ok(MergeAnalysis::NONE);
        };
        if &base == branch {
            return Ok(MergeAnalysis::UP_TO_DATE);
        }
        if &base == target {
            return Ok(MergeAnalysis::FASTFORWARD | MergeAnalysis::NORMAL);
        }
        Ok(MergeAnalysis::NORMAL)
    }

    /// Commit the target ref points at; `None` when it has none yet.
    fn resolve_target(&self, target: &str, target_ref: &RefName) -> Result<Option<Oid>, MergeError> {
        if target == "HEAD" && self.repo.head_is_unborn() {
            return Ok(None);
        }
        match self.repo.try_resolve_ref(target_ref.as_str())? {
            Some(id) => Ok(Some(id)),
            None if target_ref.is_branch() => Ok(None),
            None => Ok(Some(self.repo.lookup(target)?)),
        }
    }

    /// Merge `branch` (default `FETCH_HEAD`) into `target` (default `HEAD`).
    ///
    /// # Errors
    ///
    /// - [`MergeError::NoMergeBase`] for unrelated histories
    /// - [`MergeError::Unsupported`] for tree changes other than add, delete
    ///   and modify of a file
    /// - [`MergeError::Conflict`] when a context merge finds overlapping changes
    pub fn merge(
        &self,
        target: Option<&str>,
        branch: Option<&str>,
        strategy: Strategy,
    ) -> Result<MergeOutcome, MergeError> {
        let target = target.unwrap_or("HEAD");
        let branch = branch.unwrap_or("FETCH_HEAD");
        let target_ref = self.repo.qualify_ref(target)?;
        let branch_id = self.repo.lookup(branch)?;

        let Some(target_id) = self.resolve_target(target, &target_ref)? else {
            self.repo
                .update_ref(&target_ref, &branch_id, None, &format!("merge {branch}: initial"))?;
            tracing::info!(target = %target_ref, branch, "merge into unborn target");
            self.checkout_if_head(&target_ref);
            return Ok(MergeOutcome::FastForward(branch_id));
        };

        let analysis = self.analyze(&target_id, &branch_id)?;
        tracing::debug!(target, branch, analysis = analysis.bits(), "merge analysis");

        if analysis.is_none() {
            return Err(MergeError::NoMergeBase {
                target: target.to_string(),
                branch: branch.to_string(),
            });
        }
        if analysis.is_up_to_date() {
            return Ok(MergeOutcome::UpToDate);
        }
        if analysis.is_fast_forward() {
            self.repo.update_ref(
                &target_ref,
                &branch_id,
                Some(&target_id),
                &format!("merge {branch}: fast-forward"),
            )?;
            tracing::info!(target = %target_ref, to = %branch_id.short(), "fast-forward");
            self.checkout_if_head(&target_ref);
            return Ok(MergeOutcome::FastForward(branch_id));
        }

        let merged = self.merge_commits(&target_ref, &target_id, &branch_id, strategy)?;
        self.checkout_if_head(&target_ref);
        Ok(MergeOutcome::Merged(merged))
    }

    /// Fetch, then merge `FETCH_HEAD` into HEAD.
    pub fn pull(
        &self,
        remote: Option<&str>,
        refspec: Option<&str>,
        strategy: Strategy,
        provider: &dyn CredentialProvider,
    ) -> Result<MergeOutcome, MergeError> {
        self.repo.fetch(remote, refspec, provider)?;
        self.merge(None, Some("FETCH_HEAD"), strategy)
    }

    fn merge_commits(
        &self,
        target_ref: &RefName,
        target_id: &Oid,
        branch_id: &Oid,
        strategy: Strategy,
    ) -> Result<Oid, MergeError> {
        let base_id = self
            .repo
            .merge_base(target_id, branch_id)?
            .ok_or_else(|| MergeError::NoMergeBase {
                target: target_id.to_string(),
                branch: branch_id.to_string(),
            })?;
        let target = self.repo.revision_by_id(target_id)?;
        let branch = self.repo.revision_by_id(branch_id)?;
        let base = self.repo.revision_by_id(&base_id)?;

        let mut index = self.repo.index(Some(&target));
        let mut conflicts = BTreeMap::new();

        for change in self.repo.diff_trees(&target, &branch)? {
            check_supported(&change)?;
            let base_entry = self.repo.tree_entry(&base, &change.path)?;
            let base_blob = base_entry.as_ref().map(|(oid, _)| oid);

            let merged = match self.merge_blob(&change, base_blob, strategy) {
                Ok(merged) => merged,
                Err(BlobMergeError::Conflict(conflict)) => {
                    conflicts.insert(change.path.clone(), conflict);
                    continue;
                }
                Err(BlobMergeError::Syntax(e)) => {
                    return Err(MergeError::InvalidContent {
                        path: change.path.clone(),
                        message: e.to_string(),
                    })
                }
            };

            match merged {
                Resolved::Target => {}
                Resolved::Delete => index.remove(&change.path)?,
                Resolved::Blob(oid) => {
                    let mode = match change.status {
                        ChangeStatus::Added => change.new_mode,
                        _ => change.old_mode,
                    };
                    index.add_oid(&change.path, oid, mode)?;
                }
                Resolved::Content(content) => {
                    index.add(&change.path, content.as_bytes())?;
                }
            }
        }

        if !conflicts.is_empty() {
            tracing::info!(files = conflicts.len(), "merge stopped on conflicts");
            return Err(MergeError::Conflict { conflicts });
        }

        let author = Signature::now(&self.author_name, &self.author_email);
        let message = format!("Merge graphs with {strategy}");
        let id = index.commit(
            &message,
            &author,
            &author,
            Some(&[target_id.clone(), branch_id.clone()]),
            target_ref.as_str(),
        )?;
        tracing::info!(commit = %id.short(), target = %target_ref, %strategy, "created merge commit");
        Ok(id)
    }

    /// Merge one changed path. `change.old` is the target side.
    fn merge_blob(
        &self,
        change: &TreeChange,
        base: Option<&Oid>,
        strategy: Strategy,
    ) -> Result<Resolved, BlobMergeError> {
        let target = change.old.as_ref();
        let branch = change.new.as_ref();

        if target == base {
            return Ok(match branch {
                Some(oid) => Resolved::Blob(oid.clone()),
                None => Resolved::Delete,
            });
        }
        if branch == base || target == branch {
            return Ok(Resolved::Target);
        }

        if FileFormat::from_path(&change.path).is_none() {
            tracing::warn!(path = %change.path, "both sides changed a file that holds no statements");
            return Err(BlobMergeError::Conflict(BlobConflict::default()));
        }

        let read = |oid: Option<&Oid>| -> Result<String, BlobMergeError> {
            match oid {
                Some(oid) => self.repo.read_blob_string(oid).map_err(|e| {
                    BlobMergeError::Syntax(crate::core::rdf::RdfError::Syntax {
                        source_name: change.path.clone(),
                        message: e.to_string(),
                    })
                }),
                None => Ok(String::new()),
            }
        };
        let base_content = match base {
            Some(oid) => Some(read(Some(oid))?),
            None => None,
        };
        let merged = merge_content(
            &change.path,
            &read(target)?,
            &read(branch)?,
            base_content.as_deref(),
            strategy,
        )?;
        Ok(Resolved::Content(merged))
    }

    fn checkout_if_head(&self, target_ref: &RefName) {
        if !self.checkout || self.repo.is_bare() {
            return;
        }
        let on_head = match self.repo.current_head() {
            Ok(Some(branch)) => RefName::branch(&branch).is_ok_and(|head| &head == target_ref),
            _ => false,
        };
        if on_head {
            if let Err(e) = self.repo.checkout(target_ref) {
                tracing::warn!(refname = %target_ref, error = %e, "checkout after merge failed");
            }
        }
    }
}

/// Merged state of one path.
enum Resolved {
    /// Keep the target's entry
    Target,
    Delete,
    Blob(Oid),
    Content(String),
}

fn check_supported(change: &TreeChange) -> Result<(), MergeError> {
    let unsupported = |status: String| MergeError::Unsupported {
        path: change.path.clone(),
        status,
    };
    match change.status {
        ChangeStatus::Added | ChangeStatus::Deleted => Ok(()),
        ChangeStatus::Modified if change.old_mode == change.new_mode => Ok(()),
        ChangeStatus::Modified => Err(unsupported(format!(
            "mode change {:o} -> {:o}",
            change.old_mode, change.new_mode
        ))),
        other => Err(unsupported(other.to_string())),
    }
}
