//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! Searched in order, first match wins:
//! 1. `$QVC_CONFIG` if set
//! 2. `<repo>/.qvc.toml`
//! 3. `<repo>/.git/qvc/config.toml`
//!
//! A missing file is not an error; defaults apply.
//!
//! # Example
//!
//! ```no_run
//! use quadvc::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/path/to/store"))).unwrap();
//! println!("fallback file: {}", config.fallback_file());
//! println!("provenance: {}", config.provenance());
//! ```

pub mod graphs;
pub mod schema;

pub use graphs::{GraphMap, TrackedFile};
pub use schema::{AuthorConfig, CacheConfig, GraphEntry, StoreConfig};

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub store: StoreConfig,
    /// Path the configuration was read from, if any
    path: Option<PathBuf>,
}

impl Config {
    pub const DEFAULT_FALLBACK_FILE: &'static str = "unassigned.nq";
    pub const DEFAULT_COMMIT_CACHE: usize = 50;
    pub const DEFAULT_BLOB_CACHE: usize = 500;
    pub const DEFAULT_AUTHOR_NAME: &'static str = "QuadVC";
    pub const DEFAULT_AUTHOR_EMAIL: &'static str = "quadvc@localhost";

    /// Load configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed
    /// or validated.
    pub fn load(repo_path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = Self::locate(repo_path) else {
            return Ok(Self::default());
        };

        let contents = fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            source: e,
        })?;
        let store: StoreConfig = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            message: e.to_string(),
        })?;
        store.validate()?;

        tracing::debug!(path = %path.display(), "loaded store config");
        Ok(Self {
            store,
            path: Some(path),
        })
    }

    /// Wrap an in-memory configuration.
    pub fn from_store(store: StoreConfig) -> Result<Self, ConfigError> {
        store.validate()?;
        Ok(Self { store, path: None })
    }

    fn locate(repo_path: Option<&Path>) -> Option<PathBuf> {
        if let Ok(path) = std::env::var("QVC_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let repo = repo_path?;
        [repo.join(".qvc.toml"), repo.join(".git/qvc/config.toml")]
            .into_iter()
            .find(|candidate| candidate.exists())
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    pub fn origin(&self) -> Option<&str> {
        self.store.origin.as_deref()
    }

    /// Whether to initialize a missing repository. Defaults to `true`.
    pub fn create(&self) -> bool {
        self.store.create.unwrap_or(true)
    }

    /// Defaults to `false`.
    pub fn garbage_collection(&self) -> bool {
        self.store.garbage_collection.unwrap_or(false)
    }

    /// Defaults to `false`.
    pub fn provenance(&self) -> bool {
        self.store.provenance.unwrap_or(false)
    }

    /// Defaults to `false`.
    pub fn persistence(&self) -> bool {
        self.store.persistence.unwrap_or(false)
    }

    /// Defaults to `true`.
    pub fn checkout(&self) -> bool {
        self.store.checkout.unwrap_or(true)
    }

    pub fn fallback_file(&self) -> &str {
        self.store
            .fallback_file
            .as_deref()
            .unwrap_or(Self::DEFAULT_FALLBACK_FILE)
    }

    pub fn commit_cache_capacity(&self) -> usize {
        self.store
            .cache
            .as_ref()
            .and_then(|c| c.commits)
            .unwrap_or(Self::DEFAULT_COMMIT_CACHE)
    }

    pub fn blob_cache_capacity(&self) -> usize {
        self.store
            .cache
            .as_ref()
            .and_then(|c| c.blobs)
            .unwrap_or(Self::DEFAULT_BLOB_CACHE)
    }

    pub fn author_name(&self) -> &str {
        self.store
            .author
            .as_ref()
            .and_then(|a| a.name.as_deref())
            .unwrap_or(Self::DEFAULT_AUTHOR_NAME)
    }

    pub fn author_email(&self) -> &str {
        self.store
            .author
            .as_ref()
            .and_then(|a| a.email.as_deref())
            .unwrap_or(Self::DEFAULT_AUTHOR_EMAIL)
    }

    pub fn graph_entries(&self) -> &[GraphEntry] {
        &self.store.graphs
    }

    /// Get the path the configuration was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
