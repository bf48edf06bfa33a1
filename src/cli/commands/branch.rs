//! branch command - Create a branch

use crate::cli::Context;
use anyhow::{Context as _, Result};

pub fn branch(ctx: &Context, old: &str, new: &str) -> Result<()> {
    let config = ctx.config()?;
    let repo = ctx.repository(&config)?;
    let id = repo
        .branch(old, new)
        .with_context(|| format!("Failed to create branch '{new}' from '{old}'"))?;
    if !ctx.quiet {
        println!("{new} {}", id.short());
    }
    Ok(())
}
