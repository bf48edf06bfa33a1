//! git::interface
//!
//! Object store implementation using git2.
//!
//! This module is the **single doorway** to the repository. Every read of
//! commits, trees and blobs and every ref update flows through
//! [`Repository`]. Nothing outside `git` imports `git2`.
//!
//! # Error Handling
//!
//! libgit2 errors are normalized into [`GitError`] variants:
//! - [`GitError::RepositoryNotFound`]: path is neither a repository nor initializable
//! - [`GitError::RevisionNotFound`]: name does not resolve to a commit
//! - [`GitError::NodeNotFound`]: path does not exist in a revision's tree
//! - [`GitError::RefChanged`]: a ref moved under a commit or fast-forward
//! - [`GitError::IndexAlreadyCommitted`]: an [`Index`](super::Index) was committed twice
//!
//! Not-found errors are ordinary results for callers; nothing here logs
//! them as failures.
//!
//! # Example
//!
//! ```no_run
//! use quadvc::git::{Repository, SortOrder};
//! use std::path::Path;
//!
//! let repo = Repository::open(Path::new("/srv/store"))?;
//! for revision in repo.revisions(Some("master"), SortOrder::Time)? {
//!     println!("{} {}", revision.id.short(), revision.message());
//! }
//! # Ok::<(), quadvc::git::GitError>(())
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, Offset};
use thiserror::Error;

use crate::core::message::CommitMessage;
use crate::core::types::{Oid, RefName, TypeError};

/// Errors from object store operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Path holds no repository and none could be created.
    #[error("no repository at {path}")]
    RepositoryNotFound {
        /// The path that was opened
        path: PathBuf,
    },

    /// Name does not resolve to a commit.
    #[error("revision not found: {name}")]
    RevisionNotFound {
        /// Ref name, short hash or full hash
        name: String,
    },

    /// Path does not exist in the revision's tree.
    #[error("node '{path}' not found in {commit}")]
    NodeNotFound { path: String, commit: String },

    /// Node is a directory where file content was requested.
    #[error("'{path}' is not a file")]
    NotABlob { path: String },

    #[error("remote not found: {name}")]
    RemoteNotFound { name: String },

    #[error("ref not found: {refname}")]
    RefNotFound { refname: String },

    /// The same staged index was committed a second time.
    #[error("index has already been committed")]
    IndexAlreadyCommitted,

    /// A staged path runs through an existing file.
    #[error("'{path}' is not a directory")]
    NotATree { path: String },

    /// The ref no longer points where the operation expected.
    #[error("ref {refname} changed concurrently")]
    RefChanged { refname: String },

    /// The remote refused the update (usually not a fast-forward).
    #[error("push of {refname} rejected: {message}")]
    PushRejected { refname: String, message: String },

    /// No usable credential for the remote.
    #[error("credential resolution failed: {message}")]
    CredentialFailure { message: String },

    #[error("invalid refspec: {refspec}")]
    InvalidRefspec { refspec: String },

    #[error("blob is not valid UTF-8: {oid}")]
    InvalidUtf8 { oid: String },

    #[error("invalid name: {message}")]
    InvalidName { message: String },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal { message: String },
}

impl GitError {
    /// Create a GitError from a git2::Error with context.
    pub(super) fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound | git2::ErrorCode::UnbornBranch => {
                if context.starts_with("refs/") {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::RevisionNotFound {
                        name: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::Modified | git2::ErrorCode::Locked => GitError::RefChanged {
                refname: context.to_string(),
            },
            git2::ErrorCode::NotFastForward => GitError::PushRejected {
                refname: context.to_string(),
                message: err.message().to_string(),
            },
            git2::ErrorCode::Auth => GitError::CredentialFailure {
                message: err.message().to_string(),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        GitError::InvalidName {
            message: err.to_string(),
        }
    }
}

pub(super) fn oid_of(id: git2::Oid) -> Result<Oid, GitError> {
    Ok(Oid::new(id.to_string())?)
}

pub(super) fn raw_oid(oid: &Oid) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
}

/// Author or committer of a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub time: DateTime<FixedOffset>,
}

impl Signature {
    /// Signature stamped with the current local time.
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = chrono::Local::now();
        Self {
            name: name.into(),
            email: email.into(),
            time: now.with_timezone(now.offset()),
        }
    }

    pub(super) fn to_git2(&self) -> Result<git2::Signature<'static>, GitError> {
        let offset_minutes = self.time.offset().local_minus_utc() / 60;
        let when = git2::Time::new(self.time.timestamp(), offset_minutes);
        git2::Signature::new(&self.name, &self.email, &when).map_err(|e| GitError::InvalidName {
            message: format!("signature '{} <{}>': {}", self.name, self.email, e.message()),
        })
    }

    fn from_git2(sig: &git2::Signature<'_>) -> Self {
        let when = sig.when();
        let offset =
            FixedOffset::east_opt(when.offset_minutes() * 60).unwrap_or_else(|| chrono::Utc.fix());
        let time = DateTime::from_timestamp(when.seconds(), 0)
            .unwrap_or(DateTime::UNIX_EPOCH)
            .with_timezone(&offset);
        Self {
            name: String::from_utf8_lossy(sig.name_bytes()).into_owned(),
            email: String::from_utf8_lossy(sig.email_bytes()).into_owned(),
            time,
        }
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// An immutable commit.
///
/// Embedded `key: value` properties are parsed once, on first access.
#[derive(Debug, Clone)]
pub struct Revision {
    pub id: Oid,
    pub tree: Oid,
    /// Parent ids, first parent first
    pub parents: Vec<Oid>,
    pub author: Signature,
    pub committer: Signature,
    raw_message: String,
    parsed: OnceLock<CommitMessage>,
}

impl Revision {
    fn from_commit(commit: &git2::Commit<'_>) -> Result<Self, GitError> {
        let parents = commit
            .parent_ids()
            .map(oid_of)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id: oid_of(commit.id())?,
            tree: oid_of(commit.tree_id())?,
            parents,
            author: Signature::from_git2(&commit.author()),
            committer: Signature::from_git2(&commit.committer()),
            raw_message: String::from_utf8_lossy(commit.message_raw_bytes()).into_owned(),
            parsed: OnceLock::new(),
        })
    }

    fn parsed(&self) -> &CommitMessage {
        self.parsed
            .get_or_init(|| CommitMessage::parse(&self.raw_message))
    }

    /// Message text with embedded properties removed.
    pub fn message(&self) -> &str {
        &self.parsed().text
    }

    /// Embedded `key: value` properties.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.parsed().properties
    }

    pub fn raw_message(&self) -> &str {
        &self.raw_message
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

impl PartialEq for Revision {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Revision {}

/// Walk order for [`Repository::revisions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest first
    #[default]
    Time,
    /// Oldest first
    ReverseTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

/// A tree or blob reachable from a revision.
#[derive(Clone)]
pub struct Node<'r> {
    repo: &'r Repository,
    commit: Oid,
    path: String,
    kind: NodeKind,
    oid: Oid,
}

impl std::fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("commit", &self.commit)
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("oid", &self.oid)
            .finish()
    }
}

impl<'r> Node<'r> {
    /// Path relative to the repository root; empty for the root tree.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Decoded file content.
    pub fn content(&self) -> Result<String, GitError> {
        if !self.is_file() {
            return Err(GitError::NotABlob {
                path: self.path.clone(),
            });
        }
        self.repo.read_blob_string(&self.oid)
    }

    /// Children of a directory, or every descendant when `recursive`.
    ///
    /// Files have no entries.
    pub fn entries(&self, recursive: bool) -> Result<Vec<Node<'r>>, GitError> {
        if !self.is_dir() {
            return Ok(Vec::new());
        }
        let tree = self.repo.repo.find_tree(raw_oid(&self.oid)?)?;
        let prefix = if self.path.is_empty() {
            String::new()
        } else {
            format!("{}/", self.path)
        };

        let mut found: Vec<(String, git2::Oid, NodeKind)> = Vec::new();
        if recursive {
            tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
                if let (Some(name), Some(kind)) = (entry.name(), node_kind(entry.kind())) {
                    found.push((format!("{prefix}{root}{name}"), entry.id(), kind));
                }
                git2::TreeWalkResult::Ok
            })?;
        } else {
            for entry in tree.iter() {
                if let (Some(name), Some(kind)) = (entry.name(), node_kind(entry.kind())) {
                    found.push((format!("{prefix}{name}"), entry.id(), kind));
                }
            }
        }

        found
            .into_iter()
            .map(|(path, id, kind)| {
                Ok(Node {
                    repo: self.repo,
                    commit: self.commit.clone(),
                    path,
                    kind,
                    oid: oid_of(id)?,
                })
            })
            .collect()
    }

    /// Revisions (newest first) in which this path's object changed.
    ///
    /// A commit is listed when the path's object differs from every parent,
    /// including commits that introduced it.
    pub fn history(&self) -> Result<Vec<Revision>, GitError> {
        let repo = &self.repo.repo;
        let mut walk = repo.revwalk()?;
        walk.set_sorting(git2::Sort::TIME)?;
        walk.push(raw_oid(&self.commit)?)?;

        let mut history = Vec::new();
        for id in walk {
            let commit = repo.find_commit(id?)?;
            let here = entry_id(&commit.tree()?, &self.path);
            let Some(here) = here else { continue };

            let mut changed = true;
            for parent in commit.parents() {
                if entry_id(&parent.tree()?, &self.path) == Some(here) {
                    changed = false;
                    break;
                }
            }
            if changed {
                history.push(Revision::from_commit(&commit)?);
            }
        }
        Ok(history)
    }
}

fn node_kind(kind: Option<git2::ObjectType>) -> Option<NodeKind> {
    match kind? {
        git2::ObjectType::Tree => Some(NodeKind::Directory),
        git2::ObjectType::Blob => Some(NodeKind::File),
        _ => None,
    }
}

fn entry_id(tree: &git2::Tree<'_>, path: &str) -> Option<git2::Oid> {
    if path.is_empty() {
        return Some(tree.id());
    }
    tree.get_path(Path::new(path)).ok().map(|e| e.id())
}

/// Status of one path between two trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Added,
    Deleted,
    Modified,
    Renamed,
    Copied,
    TypeChange,
    Other,
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeStatus::Added => "added",
            ChangeStatus::Deleted => "deleted",
            ChangeStatus::Modified => "modified",
            ChangeStatus::Renamed => "renamed",
            ChangeStatus::Copied => "copied",
            ChangeStatus::TypeChange => "type change",
            ChangeStatus::Other => "other",
        };
        f.write_str(s)
    }
}

/// One changed path of a tree diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeChange {
    pub status: ChangeStatus,
    pub path: String,
    /// Object on the old side; `None` when added
    pub old: Option<Oid>,
    /// Object on the new side; `None` when deleted
    pub new: Option<Oid>,
    pub old_mode: u32,
    pub new_mode: u32,
}

/// Default mode for staged blobs.
pub const FILE_MODE: u32 = 0o100644;

/// The object store.
///
/// Wraps one git repository (bare or with a working directory).
pub struct Repository {
    pub(super) repo: git2::Repository,
    path: PathBuf,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("path", &self.path)
            .finish()
    }
}

impl Repository {
    // =========================================================================
    // Opening and creation
    // =========================================================================

    /// Open an existing repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::RepositoryNotFound`] if `path` is not a repository
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::RepositoryNotFound {
            path: path.to_path_buf(),
        })?;
        Ok(Self {
            repo,
            path: path.to_path_buf(),
        })
    }

    /// Open a repository, creating it when allowed.
    ///
    /// When `path` holds no repository and `create` is set, an `origin`
    /// URL clones into `path` (which must be empty or missing); otherwise a
    /// fresh repository is initialized.
    ///
    /// # Errors
    ///
    /// - [`GitError::RepositoryNotFound`] if the path is not a repository
    ///   and `create` is false
    pub fn create(path: &Path, origin: Option<&str>, create: bool) -> Result<Self, GitError> {
        if let Ok(repo) = git2::Repository::open(path) {
            return Ok(Self {
                repo,
                path: path.to_path_buf(),
            });
        }
        if !create {
            return Err(GitError::RepositoryNotFound {
                path: path.to_path_buf(),
            });
        }

        let is_empty = std::fs::read_dir(path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true);

        let repo = match origin {
            Some(url) if is_empty => {
                tracing::info!(url, path = %path.display(), "cloning store");
                let credentials = super::credentials::EnvCredentials::from_env();
                return Self::clone_from(url, path, &credentials);
            }
            _ => {
                tracing::info!(path = %path.display(), "initializing store");
                git2::Repository::init(path).map_err(|e| GitError::from_git2(e, "init"))?
            }
        };

        Ok(Self {
            repo,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Working directory, `None` for bare repositories.
    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    pub fn is_bare(&self) -> bool {
        self.repo.is_bare()
    }

    /// True when no ref points at a commit yet.
    pub fn is_empty(&self) -> Result<bool, GitError> {
        self.repo.is_empty().map_err(GitError::from)
    }

    /// Whether HEAD names a branch that has no commit yet.
    pub fn head_is_unborn(&self) -> bool {
        matches!(self.repo.head(), Err(e) if e.code() == git2::ErrorCode::UnbornBranch || e.code() == git2::ErrorCode::NotFound)
    }

    /// Set `gc.auto` to 256 unless configured.
    pub fn init_garbage_collection(&self) -> Result<(), GitError> {
        let mut config = self.repo.config()?;
        if config.get_i32("gc.auto").is_err() {
            config.set_i32("gc.auto", 256)?;
            tracing::debug!("set gc.auto = 256");
        }
        Ok(())
    }

    // =========================================================================
    // Name resolution
    // =========================================================================

    /// Resolve a name to a commit id.
    ///
    /// Tries, in order: `refs/heads/<name>`, `refs/tags/<name>`, `<name>`
    /// as a full ref (including `HEAD` and `FETCH_HEAD`), then an object id
    /// or unique prefix.
    pub fn lookup(&self, name: &str) -> Result<Oid, GitError> {
        if name == "FETCH_HEAD" {
            return self.fetch_head();
        }

        for candidate in [
            format!("refs/heads/{name}"),
            format!("refs/tags/{name}"),
            name.to_string(),
        ] {
            if let Ok(reference) = self.repo.find_reference(&candidate) {
                if let Ok(commit) = reference.peel_to_commit() {
                    return oid_of(commit.id());
                }
            }
        }

        self.repo
            .revparse_single(name)
            .and_then(|object| object.peel_to_commit())
            .map_err(|_| GitError::RevisionNotFound {
                name: name.to_string(),
            })
            .and_then(|commit| oid_of(commit.id()))
    }

    /// First merge candidate recorded by the last fetch.
    fn fetch_head(&self) -> Result<Oid, GitError> {
        let mut found = None;
        let walked = self.repo.fetchhead_foreach(|_, _, id, is_merge| {
            if is_merge || found.is_none() {
                found = Some(*id);
            }
            !is_merge
        });
        // Stopping at the merge candidate surfaces as a user error.
        match walked {
            Err(e) if e.code() != git2::ErrorCode::User => {
                return Err(GitError::from_git2(e, "FETCH_HEAD"));
            }
            _ => {}
        }
        found
            .ok_or_else(|| GitError::RevisionNotFound {
                name: "FETCH_HEAD".to_string(),
            })
            .and_then(oid_of)
    }

    /// Resolve a name to a [`Revision`].
    pub fn revision(&self, name: &str) -> Result<Revision, GitError> {
        let id = self.lookup(name)?;
        self.revision_by_id(&id)
    }

    pub fn revision_by_id(&self, id: &Oid) -> Result<Revision, GitError> {
        let commit = self
            .repo
            .find_commit(raw_oid(id)?)
            .map_err(|e| GitError::from_git2(e, id.as_str()))?;
        Revision::from_commit(&commit)
    }

    /// All commits reachable from `name`, or from every branch when `None`.
    ///
    /// Commits reachable from several starting points appear once.
    pub fn revisions(&self, name: Option<&str>, order: SortOrder) -> Result<Vec<Revision>, GitError> {
        let tips = match name {
            Some(name) => vec![self.lookup(name)?],
            None => self
                .branch_tips()?
                .into_iter()
                .map(|(_, oid)| oid)
                .collect(),
        };
        if tips.is_empty() {
            return Ok(Vec::new());
        }

        let mut walk = self.repo.revwalk()?;
        let sorting = match order {
            SortOrder::Time => git2::Sort::TIME,
            SortOrder::ReverseTime => git2::Sort::TIME | git2::Sort::REVERSE,
        };
        walk.set_sorting(sorting)?;
        for tip in &tips {
            walk.push(raw_oid(tip)?)?;
        }

        let mut seen = BTreeSet::new();
        let mut revisions = Vec::new();
        for id in walk {
            let id = id?;
            if seen.insert(id) {
                revisions.push(Revision::from_commit(&self.repo.find_commit(id)?)?);
            }
        }
        Ok(revisions)
    }

    // =========================================================================
    // Refs
    // =========================================================================

    /// Local branch names (short form).
    pub fn branches(&self) -> Result<Vec<String>, GitError> {
        let mut names = Vec::new();
        for branch in self.repo.branches(Some(git2::BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name().ok().flatten() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn tags(&self) -> Result<Vec<String>, GitError> {
        let mut names: Vec<String> = self
            .repo
            .tag_names(None)?
            .iter()
            .flatten()
            .map(String::from)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Tags followed by branches.
    pub fn tags_or_branches(&self) -> Result<Vec<String>, GitError> {
        let mut names = self.tags()?;
        names.extend(self.branches()?);
        Ok(names)
    }

    /// Every local branch and tag with the commit it points at.
    pub fn ref_tips(&self) -> Result<Vec<(RefName, Oid)>, GitError> {
        let mut tips = self.branch_tips()?;
        for tag in self.tags()? {
            let name = RefName::tag(&tag)?;
            if let Ok(commit) = self
                .repo
                .find_reference(name.as_str())
                .and_then(|r| r.peel_to_commit())
            {
                tips.push((name, oid_of(commit.id())?));
            }
        }
        Ok(tips)
    }

    fn branch_tips(&self) -> Result<Vec<(RefName, Oid)>, GitError> {
        let mut tips = Vec::new();
        for branch in self.branches()? {
            let name = RefName::branch(&branch)?;
            let commit = self
                .repo
                .find_reference(name.as_str())
                .and_then(|r| r.peel_to_commit())
                .map_err(|e| GitError::from_git2(e, name.as_str()))?;
            tips.push((name, oid_of(commit.id())?));
        }
        Ok(tips)
    }

    /// Short name of the branch HEAD points to, even when unborn.
    ///
    /// `None` when HEAD is detached.
    pub fn current_head(&self) -> Result<Option<String>, GitError> {
        let head = self
            .repo
            .find_reference("HEAD")
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;
        Ok(head
            .symbolic_target()
            .and_then(|target| target.strip_prefix("refs/heads/"))
            .map(String::from))
    }

    /// Qualify a ref name for writing: `HEAD` becomes the branch it points
    /// at, short names become `refs/heads/<name>`.
    pub fn qualify_ref(&self, name: &str) -> Result<RefName, GitError> {
        if name == "HEAD" {
            return match self.current_head()? {
                Some(branch) => Ok(RefName::branch(&branch)?),
                None => Ok(RefName::new("HEAD")?),
            };
        }
        Ok(RefName::branch(name)?)
    }

    /// Commit id a ref points at, `None` when it does not exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.repo.find_reference(refname) {
            Ok(reference) => {
                let commit = reference
                    .peel_to_commit()
                    .map_err(|e| GitError::from_git2(e, refname))?;
                Ok(Some(oid_of(commit.id())?))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, refname)),
        }
    }

    /// Move a ref with compare-and-swap semantics.
    ///
    /// `expected_old` of `None` requires that the ref does not exist yet.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefChanged`] if the current value differs from `expected_old`
    pub fn update_ref(
        &self,
        refname: &RefName,
        new_oid: &Oid,
        expected_old: Option<&Oid>,
        message: &str,
    ) -> Result<(), GitError> {
        let current = self.try_resolve_ref(refname.as_str())?;
        if current.as_ref() != expected_old {
            return Err(GitError::RefChanged {
                refname: refname.to_string(),
            });
        }

        let target = raw_oid(new_oid)?;
        match expected_old {
            Some(old) => self.repo.reference_matching(
                refname.as_str(),
                target,
                true,
                raw_oid(old)?,
                message,
            ),
            None => self.repo.reference(refname.as_str(), target, false, message),
        }
        .map_err(|e| GitError::from_git2(e, refname.as_str()))?;

        tracing::debug!(refname = %refname, oid = %new_oid.short(), "moved ref");
        Ok(())
    }

    /// Create branch `new` at the commit `old` resolves to.
    pub fn branch(&self, old: &str, new: &str) -> Result<Oid, GitError> {
        let id = self.lookup(old)?;
        let commit = self.repo.find_commit(raw_oid(&id)?)?;
        self.repo
            .branch(new, &commit, false)
            .map_err(|e| GitError::from_git2(e, new))?;
        tracing::info!(branch = new, from = old, "created branch");
        Ok(id)
    }

    /// Point HEAD at `refname` and force the working tree to match it.
    pub fn checkout(&self, refname: &RefName) -> Result<(), GitError> {
        if self.is_bare() {
            return Ok(());
        }
        if refname.as_str() != "HEAD" {
            self.repo
                .set_head(refname.as_str())
                .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
        }
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force();
        self.repo
            .checkout_head(Some(&mut checkout))
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
        Ok(())
    }

    // =========================================================================
    // Trees and nodes
    // =========================================================================

    /// Node at `path` in `revision` (`None`, `""` or `"."` for the root).
    pub fn node(&self, revision: &Revision, path: Option<&str>) -> Result<Node<'_>, GitError> {
        let path = path.unwrap_or("").trim_matches('/');
        if path.is_empty() || path == "." {
            return Ok(Node {
                repo: self,
                commit: revision.id.clone(),
                path: String::new(),
                kind: NodeKind::Directory,
                oid: revision.tree.clone(),
            });
        }

        let tree = self.repo.find_tree(raw_oid(&revision.tree)?)?;
        let not_found = || GitError::NodeNotFound {
            path: path.to_string(),
            commit: revision.id.to_string(),
        };
        let entry = tree.get_path(Path::new(path)).map_err(|_| not_found())?;
        let kind = node_kind(entry.kind()).ok_or_else(not_found)?;

        Ok(Node {
            repo: self,
            commit: revision.id.clone(),
            path: path.to_string(),
            kind,
            oid: oid_of(entry.id())?,
        })
    }

    /// Every blob path of a revision with its object id.
    pub fn blobs(&self, revision: &Revision) -> Result<BTreeMap<String, Oid>, GitError> {
        let tree = self.repo.find_tree(raw_oid(&revision.tree)?)?;
        let mut found = Vec::new();
        tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(git2::ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    found.push((format!("{root}{name}"), entry.id()));
                }
            }
            git2::TreeWalkResult::Ok
        })?;

        found
            .into_iter()
            .map(|(path, id)| Ok((path, oid_of(id)?)))
            .collect()
    }

    /// Object id and mode of `path` in `revision`, if present.
    pub fn tree_entry(&self, revision: &Revision, path: &str) -> Result<Option<(Oid, u32)>, GitError> {
        let tree = self.repo.find_tree(raw_oid(&revision.tree)?)?;
        match tree.get_path(Path::new(path)) {
            Ok(entry) => Ok(Some((oid_of(entry.id())?, entry.filemode() as u32))),
            Err(_) => Ok(None),
        }
    }

    /// Changed paths from `old` to `new`, recursing into subtrees.
    pub fn diff_trees(&self, old: &Revision, new: &Revision) -> Result<Vec<TreeChange>, GitError> {
        let old_tree = self.repo.find_tree(raw_oid(&old.tree)?)?;
        let new_tree = self.repo.find_tree(raw_oid(&new.tree)?)?;
        let diff = self
            .repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), None)?;

        let mut changes = Vec::new();
        for delta in diff.deltas() {
            let status = match delta.status() {
                git2::Delta::Unmodified => continue,
                git2::Delta::Added => ChangeStatus::Added,
                git2::Delta::Deleted => ChangeStatus::Deleted,
                git2::Delta::Modified => ChangeStatus::Modified,
                git2::Delta::Renamed => ChangeStatus::Renamed,
                git2::Delta::Copied => ChangeStatus::Copied,
                git2::Delta::Typechange => ChangeStatus::TypeChange,
                _ => ChangeStatus::Other,
            };
            let old_file = delta.old_file();
            let new_file = delta.new_file();
            let path = new_file
                .path()
                .or_else(|| old_file.path())
                .and_then(Path::to_str)
                .unwrap_or_default()
                .to_string();
            let side = |id: git2::Oid| -> Result<Option<Oid>, GitError> {
                if id.is_zero() {
                    Ok(None)
                } else {
                    oid_of(id).map(Some)
                }
            };

            changes.push(TreeChange {
                status,
                path,
                old: side(old_file.id())?,
                new: side(new_file.id())?,
                old_mode: u32::from(old_file.mode()),
                new_mode: u32::from(new_file.mode()),
            });
        }
        Ok(changes)
    }

    // =========================================================================
    // Ancestry
    // =========================================================================

    /// Common ancestor of two commits; `None` for unrelated histories.
    pub fn merge_base(&self, a: &Oid, b: &Oid) -> Result<Option<Oid>, GitError> {
        match self.repo.merge_base(raw_oid(a)?, raw_oid(b)?) {
            Ok(oid) => Ok(Some(oid_of(oid)?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether `ancestor` is reachable from `descendant` (or equal to it).
    pub fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        if ancestor == descendant {
            return Ok(true);
        }
        self.repo
            .graph_descendant_of(raw_oid(descendant)?, raw_oid(ancestor)?)
            .map_err(GitError::from)
    }

    // =========================================================================
    // Blobs
    // =========================================================================

    pub fn write_blob(&self, content: &[u8]) -> Result<Oid, GitError> {
        oid_of(self.repo.blob(content)?)
    }

    pub fn read_blob(&self, oid: &Oid) -> Result<Vec<u8>, GitError> {
        let blob = self
            .repo
            .find_blob(raw_oid(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        Ok(blob.content().to_vec())
    }

    /// # Errors
    ///
    /// - [`GitError::InvalidUtf8`] if the blob is not UTF-8
    pub fn read_blob_string(&self, oid: &Oid) -> Result<String, GitError> {
        String::from_utf8(self.read_blob(oid)?).map_err(|_| GitError::InvalidUtf8 {
            oid: oid.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod git_error {
        use super::*;

        #[test]
        fn display_formatting() {
            let err = GitError::NodeNotFound {
                path: "data/g.nt".to_string(),
                commit: "abc".to_string(),
            };
            assert!(err.to_string().contains("data/g.nt"));

            let err = GitError::PushRejected {
                refname: "refs/heads/master".to_string(),
                message: "not a fast-forward".to_string(),
            };
            assert!(err.to_string().contains("rejected"));
        }

        #[test]
        fn not_found_maps_by_context() {
            let err = git2::Error::new(git2::ErrorCode::NotFound, git2::ErrorClass::Reference, "x");
            assert!(matches!(
                GitError::from_git2(err, "refs/heads/x"),
                GitError::RefNotFound { .. }
            ));
            let err = git2::Error::new(git2::ErrorCode::NotFound, git2::ErrorClass::Object, "x");
            assert!(matches!(
                GitError::from_git2(err, "deadbeef"),
                GitError::RevisionNotFound { .. }
            ));
        }

        #[test]
        fn modified_maps_to_ref_changed() {
            let err = git2::Error::new(git2::ErrorCode::Modified, git2::ErrorClass::Object, "tip moved");
            assert!(matches!(
                GitError::from_git2(err, "refs/heads/master"),
                GitError::RefChanged { .. }
            ));
        }
    }

    mod signature {
        use super::*;

        #[test]
        fn roundtrips_through_git2() {
            let sig = Signature {
                name: "Ada".to_string(),
                email: "ada@example.org".to_string(),
                time: DateTime::parse_from_rfc3339("2024-03-01T12:30:00+02:00").unwrap(),
            };
            let raw = sig.to_git2().unwrap();
            assert_eq!(Signature::from_git2(&raw), sig);
        }

        #[test]
        fn display() {
            let sig = Signature::now("Ada", "ada@example.org");
            assert_eq!(sig.to_string(), "Ada <ada@example.org>");
        }
    }

    #[test]
    fn change_status_display() {
        assert_eq!(ChangeStatus::TypeChange.to_string(), "type change");
    }
}
