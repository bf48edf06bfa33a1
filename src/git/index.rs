//! git::index
//!
//! Single-use staging area that builds commits without a working directory.
//!
//! # Tree building
//!
//! Committing creates one tree builder per directory that holds a staged
//! change, plus every ancestor directory up to the root. Each builder is
//! seeded from the existing subtree of the base revision. Builders live in
//! an arena keyed by directory path; a directory's parent is found by
//! trimming its last component.
//!
//! Builders are finalized deepest first, ties broken by path, so a parent
//! only ever receives hashes of finished children. Directories left empty
//! are dropped from their parent.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::path::Path;

use super::interface::{oid_of, raw_oid, GitError, Repository, Revision, Signature, FILE_MODE};
use crate::core::types::Oid;

const TREE_MODE: i32 = 0o040000;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Staged {
    Blob { oid: Oid, mode: u32 },
    Tombstone,
}

/// Staged changes against a base revision (or an empty tree).
///
/// An index can be committed exactly once.
#[derive(Debug)]
pub struct Index<'r> {
    repo: &'r Repository,
    base: Option<Revision>,
    stash: BTreeMap<String, Staged>,
    committed: bool,
}

impl Repository {
    /// New index seeded from `base`, or empty.
    pub fn index(&self, base: Option<&Revision>) -> Index<'_> {
        Index {
            repo: self,
            base: base.cloned(),
            stash: BTreeMap::new(),
            committed: false,
        }
    }
}

impl<'r> Index<'r> {
    pub fn base(&self) -> Option<&Revision> {
        self.base.as_ref()
    }

    /// Write `content` as a blob and stage it at `path` with the default mode.
    pub fn add(&mut self, path: &str, content: &[u8]) -> Result<Oid, GitError> {
        let oid = self.repo.write_blob(content)?;
        self.add_oid(path, oid.clone(), FILE_MODE)?;
        Ok(oid)
    }

    /// Stage an existing object.
    pub fn add_oid(&mut self, path: &str, oid: Oid, mode: u32) -> Result<(), GitError> {
        let path = normalize(path)?;
        tracing::debug!(path = %path, oid = %oid.short(), "staged blob");
        self.stash.insert(path, Staged::Blob { oid, mode });
        Ok(())
    }

    /// Stage the deletion of `path`.
    ///
    /// A path that was only staged in this index is unstaged instead.
    ///
    /// # Errors
    ///
    /// - [`GitError::NodeNotFound`] if the path exists neither in the base
    ///   nor in this index
    pub fn remove(&mut self, path: &str) -> Result<(), GitError> {
        let path = normalize(path)?;
        let in_base = match &self.base {
            Some(base) => self.repo.tree_entry(base, &path)?.is_some(),
            None => false,
        };

        if in_base {
            tracing::debug!(path = %path, "staged removal");
            self.stash.insert(path, Staged::Tombstone);
            return Ok(());
        }
        match self.stash.remove(&path) {
            Some(Staged::Blob { .. }) => Ok(()),
            _ => Err(GitError::NodeNotFound {
                commit: self
                    .base
                    .as_ref()
                    .map(|b| b.id.to_string())
                    .unwrap_or_default(),
                path,
            }),
        }
    }

    /// Paths with a staged change, sorted.
    pub fn staged_paths(&self) -> impl Iterator<Item = &str> {
        self.stash.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.stash.is_empty()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Build the tree, create the commit and move `refname` to it.
    ///
    /// `parents` defaults to the base revision (none for an empty index).
    ///
    /// # Errors
    ///
    /// - [`GitError::IndexAlreadyCommitted`] once a call has succeeded; a
    ///   failed call leaves the index usable
    /// - [`GitError::NotATree`] if a staged path runs through a file
    /// - [`GitError::RefChanged`] if `refname` no longer points at the first parent
    pub fn commit(
        &mut self,
        message: &str,
        author: &Signature,
        committer: &Signature,
        parents: Option<&[Oid]>,
        refname: &str,
    ) -> Result<Oid, GitError> {
        if self.committed {
            return Err(GitError::IndexAlreadyCommitted);
        }

        let git = &self.repo.repo;
        let base_tree = match &self.base {
            Some(base) => Some(git.find_tree(raw_oid(&base.tree)?)?),
            None => None,
        };

        // Arena of builders keyed by directory path ("" is the root).
        let mut builders: HashMap<String, git2::TreeBuilder<'_>> = HashMap::new();
        let mut queue = BinaryHeap::new();

        for (path, staged) in &self.stash {
            let (dir, name) = split_path(path);

            let mut current = Some(dir);
            while let Some(d) = current {
                if !builders.contains_key(d) {
                    let existing = match (&base_tree, d.is_empty()) {
                        (Some(tree), true) => Some(tree.clone()),
                        (Some(tree), false) => match tree.get_path(Path::new(d)) {
                            Ok(entry) if entry.kind() == Some(git2::ObjectType::Tree) => {
                                Some(git.find_tree(entry.id())?)
                            }
                            Ok(_) => return Err(GitError::NotATree { path: d.to_string() }),
                            Err(_) => None,
                        },
                        (None, _) => None,
                    };
                    builders.insert(d.to_string(), git.treebuilder(existing.as_ref())?);
                    queue.push((depth(d), Reverse(d.to_string())));
                }
                current = parent(d);
            }

            let builder = builders.get_mut(dir).ok_or_else(|| GitError::Internal {
                message: format!("no tree builder for '{dir}'"),
            })?;
            match staged {
                Staged::Blob { oid, mode } => {
                    builder.insert(name, raw_oid(oid)?, *mode as i32)?;
                }
                Staged::Tombstone => {
                    if builder.get(name)?.is_some() {
                        builder.remove(name)?;
                    }
                }
            }
        }

        if builders.is_empty() {
            builders.insert(String::new(), git.treebuilder(base_tree.as_ref())?);
            queue.push((0, Reverse(String::new())));
        }

        let mut root = None;
        while let Some((_, Reverse(dir))) = queue.pop() {
            let builder = builders.remove(&dir).ok_or_else(|| GitError::Internal {
                message: format!("tree builder for '{dir}' finalized twice"),
            })?;

            let Some(parent_dir) = parent(&dir) else {
                root = Some(builder.write()?);
                continue;
            };
            let (_, name) = split_path(&dir);
            let parent_builder = builders.get_mut(parent_dir).ok_or_else(|| GitError::Internal {
                message: format!("no tree builder for '{parent_dir}'"),
            })?;

            if builder.len() == 0 {
                if parent_builder.get(name)?.is_some() {
                    parent_builder.remove(name)?;
                }
            } else {
                let tree_id = builder.write()?;
                parent_builder.insert(name, tree_id, TREE_MODE)?;
            }
        }

        let root = root.ok_or_else(|| GitError::Internal {
            message: "root tree was not built".to_string(),
        })?;
        let tree = git.find_tree(root)?;

        let parent_ids: Vec<Oid> = match parents {
            Some(ids) => ids.to_vec(),
            None => self.base.iter().map(|b| b.id.clone()).collect(),
        };
        let parent_commits = parent_ids
            .iter()
            .map(|id| {
                git.find_commit(raw_oid(id)?)
                    .map_err(|e| GitError::from_git2(e, id.as_str()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let id = git
            .commit(
                Some(refname),
                &author.to_git2()?,
                &committer.to_git2()?,
                message,
                &tree,
                &parent_refs,
            )
            .map_err(|e| GitError::from_git2(e, refname))?;
        let id = oid_of(id)?;
        self.committed = true;

        tracing::info!(
            commit = %id.short(),
            refname,
            paths = self.stash.len(),
            "created commit"
        );
        Ok(id)
    }
}

fn normalize(path: &str) -> Result<String, GitError> {
    let trimmed = path.trim_matches('/');
    let valid = !trimmed.is_empty()
        && trimmed
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != ".." && part != ".git");
    if !valid {
        return Err(GitError::InvalidName {
            message: format!("invalid path '{path}'"),
        });
    }
    Ok(trimmed.to_string())
}

/// Split `a/b/c` into (`a/b`, `c`); top-level names have directory `""`.
fn split_path(path: &str) -> (&str, &str) {
    path.rsplit_once('/').unwrap_or(("", path))
}

fn parent(dir: &str) -> Option<&str> {
    if dir.is_empty() {
        None
    } else {
        Some(split_path(dir).0)
    }
}

fn depth(dir: &str) -> usize {
    if dir.is_empty() {
        0
    } else {
        dir.split('/').count()
    }
}
