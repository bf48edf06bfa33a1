//! sync
//!
//! The synchronization engine: repository history as logical datasets.
//!
//! # Architecture
//!
//! [`SyncEngine`] owns the [`Repository`] and is the **single write path**
//! for data. Reads resolve a commit to its tracked blobs, parse each blob
//! into graph contexts and union them into a [`Dataset`]. Writes take a
//! [`Delta`], apply it to the affected files and commit the result.
//!
//! ```text
//! Delta -> route graphs to files -> apply to FileReferences -> Index -> commit
//!       -> re-cache blobs -> [checkout] -> [gc] -> sync new commit
//! ```
//!
//! # Caching
//!
//! Two LRU caches sit in front of the object store:
//! - commit id -> tracked `(path, blob)` pairs plus the graph map
//! - `(path, blob)` -> parsed [`FileReference`] and graph contexts
//!
//! Flushing either is always safe.
//!
//! # Sync state
//!
//! A commit is either unsynced or synced; syncing is idempotent. A synced
//! commit is recognized by its `prov:Activity` marker in the provenance
//! graph, or by the engine's own record when provenance is off.
//!
//! # Concurrency
//!
//! One writer per repository at a time. The engine does no locking of its
//! own; callers serialize `commit` calls.

pub mod gc;
pub mod provenance;

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use oxrdf::{GraphName, NamedNode, Triple};
use thiserror::Error;

use crate::core::cache::Cache;
use crate::core::config::{Config, ConfigError, GraphEntry, GraphMap};
use crate::core::delta::{Delta, DeltaError, DeltaOperation, GraphChange};
use crate::core::file_ref::FileReference;
use crate::core::message::MessageBuilder;
use crate::core::rdf::{parse_statements, statement_line, triple_of, Dataset, FileFormat};
use crate::core::types::Oid;
use crate::git::{GitError, Repository, Revision, Signature};
use gc::GarbageCollector;

/// Errors from the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid delta: {message}")]
    InvalidDelta { message: String },
}

impl From<DeltaError> for SyncError {
    fn from(err: DeltaError) -> Self {
        SyncError::InvalidDelta {
            message: err.to_string(),
        }
    }
}

/// Tracked blobs of one commit.
#[derive(Debug, Clone, Default)]
pub struct TrackedBlobs {
    /// Graph↔file map of the commit's tree
    pub graph_map: GraphMap,
    /// Tracked paths present in the tree, with their blob ids
    pub blobs: BTreeMap<String, Oid>,
}

impl TrackedBlobs {
    fn empty(entries: &[GraphEntry]) -> Self {
        Self {
            graph_map: GraphMap::from_tree(entries, &BTreeMap::new(), |_| None),
            blobs: BTreeMap::new(),
        }
    }
}

/// A parsed tracked blob.
#[derive(Debug, Clone)]
pub struct BlobEntry {
    pub file: FileReference,
    /// Triples per graph
    pub contexts: HashMap<GraphName, HashSet<Triple>>,
}

impl BlobEntry {
    /// Parse file content. `graph` is the graph of N-Triples lines.
    ///
    /// Content that fails to parse is kept verbatim with no contexts.
    fn parse(path: &str, content: &str, format: FileFormat, graph: &GraphName) -> Self {
        match parse_statements(path, content, format, graph) {
            Ok(quads) => {
                let mut contexts: HashMap<GraphName, HashSet<Triple>> = HashMap::new();
                let mut lines = Vec::with_capacity(quads.len());
                for quad in quads {
                    let triple = triple_of(&quad);
                    lines.push(statement_line(&triple, &quad.graph_name, format));
                    contexts.entry(quad.graph_name).or_default().insert(triple);
                }
                Self {
                    file: FileReference::new(path, &lines.join("\n")),
                    contexts,
                }
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "skipping unparseable statement file");
                Self {
                    file: FileReference::new(path, content),
                    contexts: HashMap::new(),
                }
            }
        }
    }
}

/// Inputs of [`SyncEngine::commit`] besides the delta.
#[derive(Debug, Clone, Default)]
pub struct CommitRequest {
    pub message: String,
    /// Ref to move; `HEAD` (the checked out branch) when `None`
    pub refname: Option<String>,
    /// Parent commit; the ref's current tip when `None`
    pub parent: Option<String>,
    /// Update text recorded as the `query` property
    pub query: Option<String>,
    pub default_graphs: Vec<String>,
    pub named_graphs: Vec<String>,
    /// Extra `key: "value"` properties
    pub properties: Vec<(String, String)>,
    /// Author; the configured identity when `None`
    pub author: Option<Signature>,
}

impl CommitRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn on_ref(mut self, refname: impl Into<String>) -> Self {
        self.refname = Some(refname.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    fn build_message(&self) -> String {
        let mut builder = MessageBuilder::new(self.message.clone())
            .query(self.query.as_deref())
            .graph_selection(&self.default_graphs, &self.named_graphs);
        for (key, value) in &self.properties {
            builder = builder.property(key, value.clone());
        }
        builder.build()
    }
}

/// A file being edited by one commit.
struct WorkingFile {
    /// Serialized content before the delta, `None` for new files
    before: Option<String>,
    file: FileReference,
}

/// Maps repository history to datasets and writes deltas as commits.
pub struct SyncEngine {
    repo: Repository,
    config: Config,
    commits: Cache<Oid, Arc<TrackedBlobs>>,
    blobs: Cache<(String, Oid), Arc<BlobEntry>>,
    /// Provenance records and materialized graph versions
    store: Dataset,
    synced: HashSet<Oid>,
    /// Materialized name of each (commit, graph)
    versions: HashMap<(Oid, GraphName), NamedNode>,
    gc: GarbageCollector,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("repo", &self.repo)
            .field("commits", &self.commits)
            .field("blobs", &self.blobs)
            .field("synced", &self.synced.len())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Open (or create, as configured) the repository at `path`.
    pub fn open(path: &Path, config: Config) -> Result<Self, SyncError> {
        let repo = Repository::create(path, config.origin(), config.create())?;
        Ok(Self::new(repo, config))
    }

    pub fn new(repo: Repository, config: Config) -> Self {
        if config.garbage_collection() {
            if let Err(e) = repo.init_garbage_collection() {
                tracing::warn!(error = %e, "cannot configure gc.auto");
            }
        }
        let gc = GarbageCollector::new(repo.path());
        Self {
            commits: Cache::new(config.commit_cache_capacity()),
            blobs: Cache::new(config.blob_cache_capacity()),
            store: Dataset::new(),
            synced: HashSet::new(),
            versions: HashMap::new(),
            gc,
            repo,
            config,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Provenance records and materialized graph versions.
    pub fn store(&self) -> &Dataset {
        &self.store
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Tracked blobs of a revision (cache first).
    pub fn tracked_blobs(&self, revision: &Revision) -> Result<Arc<TrackedBlobs>, SyncError> {
        if let Some(hit) = self.commits.get(&revision.id) {
            return Ok(hit);
        }
        tracing::debug!(commit = %revision.id.short(), "commit cache miss");

        let tree = self.repo.blobs(revision)?;
        let graph_map = GraphMap::from_tree(self.config.graph_entries(), &tree, |oid| {
            self.repo.read_blob_string(oid).ok()
        });
        let blobs = tree
            .into_iter()
            .filter(|(path, _)| graph_map.is_tracked(path))
            .collect();

        let tracked = Arc::new(TrackedBlobs { graph_map, blobs });
        self.commits.set(revision.id.clone(), Arc::clone(&tracked));
        Ok(tracked)
    }

    /// Parsed blob (cache first).
    pub fn blob_entry(&self, path: &str, oid: &Oid, map: &GraphMap) -> Result<Arc<BlobEntry>, SyncError> {
        let key = (path.to_string(), oid.clone());
        if let Some(hit) = self.blobs.get(&key) {
            return Ok(hit);
        }
        tracing::debug!(path, blob = %oid.short(), "blob cache miss");

        let (format, graph) = file_layout(path, map);
        let entry = match self.repo.read_blob_string(oid) {
            Ok(content) => BlobEntry::parse(path, &content, format, &graph),
            Err(GitError::InvalidUtf8 { .. }) => {
                tracing::warn!(path, blob = %oid.short(), "skipping statement file that is not UTF-8");
                BlobEntry {
                    file: FileReference::new(path, ""),
                    contexts: HashMap::new(),
                }
            }
            Err(e) => return Err(e.into()),
        };

        let entry = Arc::new(entry);
        self.blobs.set(key, Arc::clone(&entry));
        Ok(entry)
    }

    /// The dataset of a commit, branch or tag.
    pub fn instance(&self, name: &str) -> Result<Dataset, SyncError> {
        let revision = self.repo.revision(name)?;
        self.instance_of(&revision)
    }

    pub fn instance_of(&self, revision: &Revision) -> Result<Dataset, SyncError> {
        let tracked = self.tracked_blobs(revision)?;
        let mut dataset = Dataset::new();
        for (path, oid) in &tracked.blobs {
            let entry = self.blob_entry(path, oid, &tracked.graph_map)?;
            for (graph, triples) in &entry.contexts {
                dataset.extend_graph(graph, triples);
            }
        }
        Ok(dataset)
    }

    /// Graphs of a commit: mapped graphs plus graphs found in content.
    pub fn graphs(&self, name: &str) -> Result<Vec<GraphName>, SyncError> {
        let mut graphs: Vec<GraphName> = self
            .files(name)?
            .into_values()
            .flatten()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        graphs.sort_by_key(|g| g.to_string());
        Ok(graphs)
    }

    /// Tracked files of a commit and the graphs each holds.
    pub fn files(&self, name: &str) -> Result<BTreeMap<String, Vec<GraphName>>, SyncError> {
        let revision = self.repo.revision(name)?;
        let tracked = self.tracked_blobs(&revision)?;

        let mut files = BTreeMap::new();
        for (path, oid) in &tracked.blobs {
            let entry = self.blob_entry(path, oid, &tracked.graph_map)?;
            let mut graphs: Vec<GraphName> = tracked.graph_map.graphs_of(path).to_vec();
            for graph in entry.contexts.keys() {
                if !graphs.contains(graph) {
                    graphs.push(graph.clone());
                }
            }
            graphs.sort_by_key(|g| g.to_string());
            files.insert(path.clone(), graphs);
        }
        Ok(files)
    }

    // =========================================================================
    // Synchronization
    // =========================================================================

    pub fn is_synced(&self, id: &Oid) -> bool {
        self.synced.contains(id)
            || self
                .store
                .contains(&provenance::marker(id), &provenance::provenance_graph())
    }

    /// Sync every commit reachable from a branch or tag.
    ///
    /// Parents are always synced before their children. Returns the number
    /// of commits synced by this call.
    pub fn sync_all(&mut self) -> Result<usize, SyncError> {
        enum Visit {
            Enter(Oid),
            Leave(Revision),
        }

        let mut visited = HashSet::new();
        let mut order = Vec::new();

        for (refname, tip) in self.repo.ref_tips()? {
            tracing::debug!(%refname, tip = %tip.short(), "traversing");
            let mut stack = vec![Visit::Enter(tip)];
            while let Some(visit) = stack.pop() {
                match visit {
                    Visit::Leave(revision) => order.push(revision),
                    Visit::Enter(id) => {
                        if self.is_synced(&id) || !visited.insert(id.clone()) {
                            continue;
                        }
                        let revision = self.repo.revision_by_id(&id)?;
                        let parents = revision.parents.clone();
                        stack.push(Visit::Leave(revision));
                        // First parent on top, so its chain is flattened first.
                        stack.extend(parents.into_iter().rev().map(Visit::Enter));
                    }
                }
            }
        }

        let count = order.len();
        for revision in order {
            self.sync_revision(&revision)?;
        }
        if count > 0 {
            tracing::info!(commits = count, "synced history");
        }
        Ok(count)
    }

    /// Sync one commit. Returns false if it was already synced.
    pub fn sync_single(&mut self, id: &Oid) -> Result<bool, SyncError> {
        if self.is_synced(id) {
            return Ok(false);
        }
        let revision = self.repo.revision_by_id(id)?;
        self.sync_revision(&revision)?;
        Ok(true)
    }

    fn sync_revision(&mut self, revision: &Revision) -> Result<(), SyncError> {
        self.tracked_blobs(revision)?;
        self.changeset(revision)?;
        self.synced.insert(revision.id.clone());
        tracing::debug!(commit = %revision.id.short(), "synced");
        Ok(())
    }

    /// Record provenance and/or materialize graphs of a revision, as
    /// configured. A no-op when both are disabled.
    pub fn changeset(&mut self, revision: &Revision) -> Result<(), SyncError> {
        let provenance = self.config.provenance();
        let persistence = self.config.persistence();
        if !provenance && !persistence {
            return Ok(());
        }

        let instance = self.instance_of(revision)?;
        let first_parent = revision.parents.first();

        if provenance {
            let before = match first_parent {
                Some(parent) => self.instance_of(&self.repo.revision_by_id(parent)?)?,
                None => Dataset::new(),
            };
            let mut quads = provenance::activity(revision);
            quads.extend(provenance::updates(&revision.id, &before, &instance));
            for quad in quads {
                self.store.insert(quad);
            }
        }

        if persistence {
            let versions = &self.versions;
            let (quads, names) = provenance::materialize(&revision.id, &instance, |graph| {
                first_parent.and_then(|parent| versions.get(&(parent.clone(), graph.clone())).cloned())
            });
            for quad in quads {
                self.store.insert(quad);
            }
            for (graph, name) in names {
                self.versions.insert((revision.id.clone(), graph), name);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Apply `delta` on top of the parent commit and commit the result.
    ///
    /// Each graph goes to the first tracked file that holds it: a file with
    /// an explicit mapping, else an N-Quads file whose content already has
    /// the graph. Graphs with no file land in the fallback file. Within one
    /// operation additions are applied before removals.
    ///
    /// Returns `None` when the delta changes nothing.
    ///
    /// # Errors
    ///
    /// - [`GitError::RevisionNotFound`] if the requested parent does not exist
    /// - [`GitError::RefChanged`] if the ref no longer points at the parent
    pub fn commit(&mut self, delta: &Delta, request: &CommitRequest) -> Result<Option<Oid>, SyncError> {
        if delta.operations().iter().all(DeltaOperation::is_empty) {
            tracing::debug!("empty delta, nothing to commit");
            return Ok(None);
        }

        let refname = self
            .repo
            .qualify_ref(request.refname.as_deref().unwrap_or("HEAD"))?;
        let parent = match &request.parent {
            Some(name) => Some(self.repo.revision(name)?),
            None => match self.repo.try_resolve_ref(refname.as_str())? {
                Some(id) => Some(self.repo.revision_by_id(&id)?),
                None => None,
            },
        };
        let tracked = match &parent {
            Some(revision) => self.tracked_blobs(revision)?,
            None => Arc::new(TrackedBlobs::empty(self.config.graph_entries())),
        };

        let mut working: BTreeMap<String, WorkingFile> = BTreeMap::new();
        let fallback = self.config.fallback_file().to_string();
        let mut pending = delta.clone();

        for operation in pending.operations_mut() {
            let mut graphs: Vec<GraphName> = operation.graphs().map(|(g, _)| g.clone()).collect();
            graphs.sort_by_key(|g| g.to_string());

            for graph in graphs {
                let Some(path) = self.locate(&graph, &tracked)? else {
                    continue;
                };
                if let Some(change) = operation.take(&graph) {
                    let file = self.working_file(&mut working, &path, &tracked)?;
                    apply(&mut file.file, &graph, &change);
                }
            }

            for (graph, change) in operation.drain() {
                if change.additions.is_empty()
                    && !working.contains_key(&fallback)
                    && !tracked.blobs.contains_key(&fallback)
                {
                    continue;
                }
                tracing::debug!(graph = %graph, file = %fallback, "graph has no file, using fallback");
                let file = self.working_file(&mut working, &fallback, &tracked)?;
                apply(&mut file.file, &graph, &change);
            }
        }

        let mut index = self.repo.index(parent.as_ref());
        let mut staged = Vec::new();
        for (path, working_file) in &working {
            let content = working_file.file.content();
            let changed = match &working_file.before {
                Some(before) => *before != content,
                None => !content.is_empty(),
            };
            if !changed {
                continue;
            }
            let oid = index.add(path, content.as_bytes())?;
            tracing::debug!(path = %path, blob = %oid.short(), "staged");
            staged.push((path.clone(), oid, content));
        }
        if staged.is_empty() {
            tracing::info!("delta changed no file, nothing to commit");
            return Ok(None);
        }

        let message = request.build_message();
        let committer = Signature::now(self.config.author_name(), self.config.author_email());
        let author = request.author.clone().unwrap_or_else(|| committer.clone());
        let id = index.commit(&message, &author, &committer, None, refname.as_str())?;

        let revision = self.repo.revision_by_id(&id)?;
        let new_tracked = self.tracked_blobs(&revision)?;
        for (path, oid, content) in staged {
            let (format, graph) = file_layout(&path, &new_tracked.graph_map);
            let entry = BlobEntry::parse(&path, &content, format, &graph);
            self.blobs.set((path, oid), Arc::new(entry));
        }

        if self.config.checkout() && !self.repo.is_bare() {
            let on_head = refname.as_str() == "HEAD"
                || self.repo.current_head()?.as_deref() == Some(refname.short_name());
            if on_head {
                if let Err(e) = self.repo.checkout(&refname) {
                    tracing::warn!(%refname, error = %e, "checkout after commit failed");
                }
            }
        }

        if self.config.garbage_collection() {
            self.garbage_collection();
        }

        if let Err(e) = self.sync_single(&id) {
            tracing::warn!(commit = %id.short(), error = %e, "provenance bookkeeping failed");
        }

        tracing::info!(commit = %id.short(), %refname, files = working.len(), "committed delta");
        Ok(Some(id))
    }

    /// Start background garbage collection unless one is running.
    pub fn garbage_collection(&mut self) -> bool {
        self.gc.trigger()
    }

    /// File that takes changes to `graph`, if any.
    fn locate(&self, graph: &GraphName, tracked: &TrackedBlobs) -> Result<Option<String>, SyncError> {
        if let Some(path) = tracked.graph_map.file_for_graph(graph) {
            return Ok(Some(path.to_string()));
        }
        for (path, file) in tracked.graph_map.files() {
            if file.format != FileFormat::NQuads {
                continue;
            }
            let Some(oid) = tracked.blobs.get(path) else {
                continue;
            };
            if self
                .blob_entry(path, oid, &tracked.graph_map)?
                .contexts
                .contains_key(graph)
            {
                return Ok(Some(path.to_string()));
            }
        }
        Ok(None)
    }

    fn working_file<'w>(
        &self,
        working: &'w mut BTreeMap<String, WorkingFile>,
        path: &str,
        tracked: &TrackedBlobs,
    ) -> Result<&'w mut WorkingFile, SyncError> {
        match working.entry(path.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let loaded = match tracked.blobs.get(path) {
                    Some(oid) => {
                        let file = self.blob_entry(path, oid, &tracked.graph_map)?.file.clone();
                        WorkingFile {
                            before: Some(file.content()),
                            file,
                        }
                    }
                    None => WorkingFile {
                        before: None,
                        file: FileReference::new(path, ""),
                    },
                };
                Ok(entry.insert(loaded))
            }
        }
    }
}

/// Format of a tracked path and the graph of its N-Triples lines.
fn file_layout(path: &str, map: &GraphMap) -> (FileFormat, GraphName) {
    let format = map
        .get(path)
        .map(|file| file.format)
        .or_else(|| FileFormat::from_path(path))
        .unwrap_or(FileFormat::NQuads);
    let graph = map
        .graphs_of(path)
        .first()
        .cloned()
        .unwrap_or(GraphName::DefaultGraph);
    (format, graph)
}

fn apply(file: &mut FileReference, graph: &GraphName, change: &GraphChange) {
    for triple in &change.additions {
        file.add_triple(triple, graph);
    }
    for triple in &change.removals {
        if !file.remove_triple(triple, graph) {
            tracing::debug!(path = file.path(), %triple, "removal of absent statement");
        }
    }
}
