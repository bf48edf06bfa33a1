//! merge command - Merge a branch into a target

use crate::cli::Context;
use crate::merge::{MergeError, MergeOutcome, Merger, Strategy};
use anyhow::{bail, Result};

/// Print the outcome of a merge; conflicts go to stdout as JSON.
pub(super) fn report(ctx: &Context, result: Result<MergeOutcome, MergeError>) -> Result<()> {
    match result {
        Ok(outcome) => {
            match outcome.commit() {
                Some(id) => println!("{id}"),
                None => {
                    if !ctx.quiet {
                        eprintln!("Already up to date.");
                    }
                }
            }
            Ok(())
        }
        Err(MergeError::Conflict { conflicts }) => {
            println!("{}", serde_json::to_string_pretty(&conflicts)?);
            bail!("merge stopped on conflicts in {} file(s)", conflicts.len())
        }
        Err(e) => Err(e.into()),
    }
}

/// Merge `branch` (default FETCH_HEAD) into `target` (default HEAD).
pub fn merge(ctx: &Context, target: Option<&str>, branch: Option<&str>, strategy: Strategy) -> Result<()> {
    let config = ctx.config()?;
    let repo = ctx.repository(&config)?;
    let merger = Merger::new(&repo, &config);
    report(ctx, merger.merge(target, branch, strategy))
}
