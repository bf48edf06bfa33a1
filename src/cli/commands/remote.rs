//! fetch, pull and push commands
//!
//! Credentials come from the environment (`SSH_AUTH_SOCK`,
//! `QVC_SSH_KEY_HOME`, `GIT_USERNAME`, `GIT_PASSWORD`).

use crate::cli::Context;
use crate::git::EnvCredentials;
use crate::merge::{Merger, Strategy};
use anyhow::{Context as _, Result};

pub fn fetch(ctx: &Context, remote: Option<&str>, refspec: Option<&str>) -> Result<()> {
    let config = ctx.config()?;
    let repo = ctx.repository(&config)?;
    repo.fetch(remote, refspec, &EnvCredentials::from_env())
        .context("Fetch failed")?;
    Ok(())
}

pub fn pull(ctx: &Context, remote: Option<&str>, refspec: Option<&str>, strategy: Strategy) -> Result<()> {
    let config = ctx.config()?;
    let repo = ctx.repository(&config)?;
    let merger = Merger::new(&repo, &config);
    let result = merger.pull(remote, refspec, strategy, &EnvCredentials::from_env());
    super::merge::report(ctx, result)
}

pub fn push(ctx: &Context, remote: Option<&str>, refspec: Option<&str>) -> Result<()> {
    let config = ctx.config()?;
    let repo = ctx.repository(&config)?;
    repo.push(remote, refspec, &EnvCredentials::from_env())
        .context("Push failed")?;
    Ok(())
}
