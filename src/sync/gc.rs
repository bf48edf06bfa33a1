//! sync::gc
//!
//! Background `git gc --auto`.
//!
//! At most one collector process is alive per engine. The handle is polled
//! before spawning another; the caller never waits on it.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

/// Owner of the background collector process.
#[derive(Debug)]
pub struct GarbageCollector {
    repo_path: PathBuf,
    program: String,
    child: Option<Child>,
}

impl GarbageCollector {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            program: "git".to_string(),
            child: None,
        }
    }

    /// Use another executable in place of `git`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Whether the last spawned collector is still alive.
    ///
    /// Reaps the process once it has exited.
    pub fn is_running(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                if !status.success() {
                    tracing::warn!(%status, "garbage collection exited with failure");
                }
                self.child = None;
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot poll garbage collection process");
                self.child = None;
                false
            }
        }
    }

    /// Spawn a collector unless one is already running.
    ///
    /// Returns whether a process was started. Spawn failures are logged.
    pub fn trigger(&mut self) -> bool {
        if self.is_running() {
            tracing::debug!("garbage collection already running");
            return false;
        }

        let spawned = Command::new(&self.program)
            .args(["gc", "--auto", "--quiet"])
            .current_dir(&self.repo_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(child) => {
                tracing::info!(pid = child.id(), "started garbage collection");
                self.child = Some(child);
                true
            }
            Err(e) => {
                tracing::warn!(program = %self.program, error = %e, "failed to start garbage collection");
                false
            }
        }
    }
}
