//! cli
//!
//! Command-line interface layer for qvc.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Open the store and its configuration
//! - Delegate to [`crate::sync`] and [`crate::merge`], then format output
//!
//! The CLI layer is thin: it never touches the object store except through
//! the library's public types.

pub mod args;
pub mod commands;

pub use args::{Cli, Command};

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::core::config::Config;
use crate::git::Repository;
use crate::sync::SyncEngine;

/// Settings shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Store directory override
    pub cwd: Option<PathBuf>,
    pub debug: bool,
    pub quiet: bool,
}

impl Context {
    /// Directory of the store.
    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.cwd {
            Some(path) => Ok(path.clone()),
            None => std::env::current_dir().context("Failed to determine current directory"),
        }
    }

    /// Load the configuration of the store.
    pub fn config(&self) -> Result<Config> {
        let path = self.store_path()?;
        Config::load(Some(&path)).context("Failed to load configuration")
    }

    /// Open the store's repository, creating or cloning it as configured.
    pub fn repository(&self, config: &Config) -> Result<Repository> {
        let path = self.store_path()?;
        Repository::create(&path, config.origin(), config.create())
            .with_context(|| format!("Failed to open store at {}", path.display()))
    }

    /// Open the store and wrap it in a sync engine.
    pub fn engine(&self) -> Result<SyncEngine> {
        let config = self.config()?;
        let repo = self.repository(&config)?;
        Ok(SyncEngine::new(repo, config))
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run(cli: Cli) -> Result<()> {
    let ctx = Context {
        cwd: cli.cwd.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
    };
    commands::dispatch(cli.command, &ctx)
}
