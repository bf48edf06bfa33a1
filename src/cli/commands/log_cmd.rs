//! log command - List the commits of a revision

use crate::cli::Context;
use crate::git::SortOrder;
use anyhow::{Context as _, Result};

/// Print the history of `revision` (HEAD by default), one commit per line.
///
/// A store without commits prints nothing.
pub fn log(ctx: &Context, revision: Option<&str>, reverse: bool, long: bool) -> Result<()> {
    let config = ctx.config()?;
    let repo = ctx.repository(&config)?;

    if repo.head_is_unborn() && revision.is_none() {
        if !ctx.quiet {
            eprintln!("No commits yet.");
        }
        return Ok(());
    }

    let order = if reverse {
        SortOrder::ReverseTime
    } else {
        SortOrder::Time
    };
    let revisions = repo
        .revisions(Some(revision.unwrap_or("HEAD")), order)
        .context("Failed to read history")?;

    for revision in &revisions {
        let summary = revision.message().lines().next().unwrap_or_default();
        println!("{} {}", revision.id.short(), summary);
        if long {
            println!("    Author: {}", revision.author);
            println!("    Date:   {}", revision.author.time.to_rfc3339());
            if revision.is_merge() {
                let parents: Vec<&str> = revision.parents.iter().map(|p| p.short()).collect();
                println!("    Merge:  {}", parents.join(" "));
            }
            for (key, value) in revision.properties() {
                println!("    {key}: {value}");
            }
        }
    }
    Ok(())
}
