//! core::config::schema
//!
//! Store configuration schema.
//!
//! # Validation
//!
//! Values are validated after parsing: cache capacities must be positive,
//! the fallback file must be an N-Quads file, and every explicit graph
//! mapping must name an `.nt`/`.nq` file and an absolute IRI.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::rdf::FileFormat;

/// Store configuration.
///
/// # Example
///
/// ```toml
/// origin = "https://example.org/data.git"
/// garbage_collection = true
/// provenance = true
/// fallback_file = "unassigned.nq"
///
/// [cache]
/// commits = 50
/// blobs = 500
///
/// [author]
/// name = "Data Bot"
/// email = "bot@example.org"
///
/// [[graph]]
/// file = "people.nt"
/// uri = "http://example.org/people"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// URL to clone from when the repository path is empty
    pub origin: Option<String>,

    /// Initialize a repository when none exists (default: true)
    pub create: Option<bool>,

    /// Spawn `git gc --auto` after commits
    pub garbage_collection: Option<bool>,

    /// Record provenance for synced commits
    pub provenance: Option<bool>,

    /// Materialize each commit's graph contents into the provenance graph
    pub persistence: Option<bool>,

    /// Check out the ref after committing in non-bare repositories
    pub checkout: Option<bool>,

    /// File receiving statements for graphs that have no tracked file
    pub fallback_file: Option<String>,

    /// Cache capacities
    pub cache: Option<CacheConfig>,

    /// Signature used for commits and merges
    pub author: Option<AuthorConfig>,

    /// Explicit graph to file mappings
    #[serde(rename = "graph", skip_serializing_if = "Vec::is_empty")]
    pub graphs: Vec<GraphEntry>,
}

impl StoreConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(cache) = &self.cache {
            cache.validate()?;
        }

        if let Some(fallback) = &self.fallback_file {
            if FileFormat::from_path(fallback) != Some(FileFormat::NQuads) {
                return Err(ConfigError::InvalidValue(format!(
                    "fallback file '{fallback}' must end in .nq"
                )));
            }
        }

        if let Some(origin) = &self.origin {
            if origin.trim().is_empty() {
                return Err(ConfigError::InvalidValue("origin cannot be empty".to_string()));
            }
        }

        for entry in &self.graphs {
            entry.validate()?;
        }

        Ok(())
    }
}

/// Cache capacities.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Commit → tracked blobs entries (default: 50)
    pub commits: Option<usize>,

    /// Blob → parsed file entries (default: 500)
    pub blobs: Option<usize>,
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("commits", self.commits), ("blobs", self.blobs)] {
            if value == Some(0) {
                return Err(ConfigError::InvalidValue(format!(
                    "cache.{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

/// Commit signature.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorConfig {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// One explicit graph mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GraphEntry {
    /// Repository-relative file path
    pub file: String,

    /// Graph IRI stored in the file
    pub uri: String,
}

impl GraphEntry {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if FileFormat::from_path(&self.file).is_none() {
            return Err(ConfigError::InvalidValue(format!(
                "graph file '{}' must end in .nt or .nq",
                self.file
            )));
        }
        oxrdf::NamedNode::new(&self.uri).map_err(|e| {
            ConfigError::InvalidValue(format!("graph uri '{}' is not an absolute IRI: {e}", self.uri))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod store_config {
        use super::*;

        #[test]
        fn defaults() {
            let config = StoreConfig::default();
            assert!(config.origin.is_none());
            assert!(config.graphs.is_empty());
            assert!(config.validate().is_ok());
        }

        #[test]
        fn parses_graph_tables() {
            let config: StoreConfig = toml::from_str(
                r#"
                provenance = true

                [[graph]]
                file = "a.nt"
                uri = "http://ex.org/a"

                [[graph]]
                file = "b.nq"
                uri = "http://ex.org/b"
                "#,
            )
            .unwrap();

            assert_eq!(config.graphs.len(), 2);
            assert_eq!(config.provenance, Some(true));
            assert!(config.validate().is_ok());
        }

        #[test]
        fn fallback_must_be_nquads() {
            let config = StoreConfig {
                fallback_file: Some("rest.nt".to_string()),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn roundtrip() {
            let config = StoreConfig {
                origin: Some("file:///tmp/upstream".to_string()),
                checkout: Some(false),
                cache: Some(CacheConfig {
                    commits: Some(10),
                    blobs: Some(20),
                }),
                author: Some(AuthorConfig {
                    name: Some("Bot".to_string()),
                    email: Some("bot@example.org".to_string()),
                }),
                graphs: vec![GraphEntry {
                    file: "g.nt".to_string(),
                    uri: "http://ex.org/g".to_string(),
                }],
                ..Default::default()
            };

            let toml = toml::to_string_pretty(&config).unwrap();
            let parsed: StoreConfig = toml::from_str(&toml).unwrap();
            assert_eq!(config, parsed);
        }

        #[test]
        fn reject_unknown_fields() {
            let result: Result<StoreConfig, _> = toml::from_str("versioning = true");
            assert!(result.is_err());
        }
    }

    mod graph_entry {
        use super::*;

        #[test]
        fn rejects_relative_uri() {
            let entry = GraphEntry {
                file: "g.nt".to_string(),
                uri: "graph".to_string(),
            };
            assert!(entry.validate().is_err());
        }

        #[test]
        fn rejects_unknown_extension() {
            let entry = GraphEntry {
                file: "g.ttl".to_string(),
                uri: "http://ex.org/g".to_string(),
            };
            assert!(entry.validate().is_err());
        }
    }

    #[test]
    fn zero_capacity_rejected() {
        let cache = CacheConfig {
            commits: Some(0),
            blobs: None,
        };
        assert!(cache.validate().is_err());
    }
}
