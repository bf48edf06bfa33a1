//! Integration tests for fetch, push and pull against a local bare remote.
//!
//! Local paths need no authentication, so the tests run with a provider
//! that never offers anything.

use std::path::Path;

use tempfile::TempDir;

use quadvc::core::config::{Config, GraphEntry, StoreConfig};
use quadvc::core::delta::Delta;
use quadvc::git::{AllowedKinds, Credential, CredentialProvider, GitError, Repository};
use quadvc::merge::{MergeOutcome, Merger, Strategy};
use quadvc::sync::{CommitRequest, SyncEngine};

const GRAPH: &str = "http://ex.org/g";
const ABC: &str = "<http://ex.org/a> <http://ex.org/p> <http://ex.org/b> .";
const ABD: &str = "<http://ex.org/a> <http://ex.org/p> <http://ex.org/d> .";

struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn provide(&self, _url: &str, _username: Option<&str>, _allowed: AllowedKinds) -> Option<Credential> {
        None
    }
}

fn config() -> Config {
    Config::from_store(StoreConfig {
        graphs: vec![GraphEntry {
            file: "graph.nt".to_string(),
            uri: GRAPH.to_string(),
        }],
        ..StoreConfig::default()
    })
    .unwrap()
}

fn insert(line: &str) -> Delta {
    let json = serde_json::json!([{ GRAPH: { "additions": [line] } }]);
    Delta::from_json(&json.to_string()).unwrap()
}

fn url(path: &Path) -> String {
    path.to_str().expect("temp path is UTF-8").to_string()
}

/// A working store, a bare remote it pushes to, and room for a clone.
struct Network {
    dir: TempDir,
    local: SyncEngine,
    branch: String,
}

impl Network {
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let remote = dir.path().join("remote.git");
        Repository::create_bare(&remote).unwrap();

        let mut local = SyncEngine::open(&dir.path().join("local"), config()).unwrap();
        local.commit(&insert(ABC), &CommitRequest::new("seed")).unwrap();
        let branch = local.repository().current_head().unwrap().expect("HEAD is a branch");
        local.repository().add_remote("origin", &url(&remote)).unwrap();

        Self { dir, local, branch }
    }

    fn remote_path(&self) -> std::path::PathBuf {
        self.dir.path().join("remote.git")
    }

    fn push(&self) {
        self.local
            .repository()
            .push(Some("origin"), Some(&self.branch), &NoCredentials)
            .unwrap();
    }

    fn clone_store(&self, name: &str) -> Repository {
        Repository::clone_from(&url(&self.remote_path()), &self.dir.path().join(name), &NoCredentials).unwrap()
    }
}

#[test]
fn push_then_clone_round_trips_history() {
    let net = Network::new();
    net.push();

    let remote = Repository::open(&net.remote_path()).unwrap();
    let pushed = remote.lookup(&net.branch).unwrap();
    assert_eq!(pushed, net.local.repository().lookup("HEAD").unwrap());

    let clone = net.clone_store("clone");
    let engine = SyncEngine::new(clone, config());
    let dataset = engine.instance("HEAD").unwrap();
    assert_eq!(dataset.len(), 1);
}

#[test]
fn remotes_are_listed() {
    let net = Network::new();
    let repo = net.local.repository();
    assert_eq!(repo.remotes().unwrap(), vec!["origin".to_string()]);
    assert_eq!(repo.remote_url("origin").unwrap(), url(&net.remote_path()));
    assert!(matches!(
        repo.remote_url("upstream"),
        Err(GitError::RemoteNotFound { .. })
    ));
}

#[test]
fn pull_fast_forwards_clone() {
    let mut net = Network::new();
    net.push();
    let clone = net.clone_store("clone");

    let tip = net
        .local
        .commit(&insert(ABD), &CommitRequest::new("more"))
        .unwrap()
        .unwrap();
    net.push();

    let outcome = Merger::new(&clone, &config())
        .pull(Some("origin"), Some(&net.branch), Strategy::ThreeWay, &NoCredentials)
        .unwrap();
    assert_eq!(outcome, MergeOutcome::FastForward(tip.clone()));
    assert_eq!(clone.lookup("HEAD").unwrap(), tip);
}

#[test]
fn fetch_records_remote_tracking_ref() {
    let net = Network::new();
    net.push();

    let other = Repository::create(&net.dir.path().join("other"), None, true).unwrap();
    other.add_remote("origin", &url(&net.remote_path())).unwrap();
    other.fetch(Some("origin"), Some(&net.branch), &NoCredentials).unwrap();

    let tracking = format!("refs/remotes/origin/{}", net.branch);
    assert_eq!(
        other.try_resolve_ref(&tracking).unwrap(),
        Some(net.local.repository().lookup("HEAD").unwrap())
    );
    assert_eq!(
        other.lookup("FETCH_HEAD").unwrap(),
        net.local.repository().lookup("HEAD").unwrap()
    );
}

#[test]
fn push_of_diverged_branch_is_rejected() {
    let mut net = Network::new();
    net.push();

    let clone = net.clone_store("clone");
    let mut other = SyncEngine::new(clone, config());
    other.commit(&insert(ABD), &CommitRequest::new("from clone")).unwrap();
    other
        .repository()
        .push(Some("origin"), Some(&net.branch), &NoCredentials)
        .unwrap();

    net.local
        .commit(&insert("<http://ex.org/x> <http://ex.org/p> <http://ex.org/y> ."), &CommitRequest::new("local"))
        .unwrap();
    let err = net
        .local
        .repository()
        .push(Some("origin"), Some(&net.branch), &NoCredentials)
        .unwrap_err();
    assert!(matches!(err, GitError::PushRejected { .. }), "got {err:?}");
}

#[test]
fn missing_remote_is_reported() {
    let net = Network::new();
    let err = net
        .local
        .repository()
        .fetch(Some("nowhere"), None, &NoCredentials)
        .unwrap_err();
    assert!(matches!(err, GitError::RemoteNotFound { .. }));
}
