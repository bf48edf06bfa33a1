//! sync command - Record every commit in the provenance store

use crate::cli::Context;
use anyhow::{Context as _, Result};

pub fn sync(ctx: &Context) -> Result<()> {
    let mut engine = ctx.engine()?;
    let synced = engine.sync_all().context("Sync failed")?;
    if !ctx.quiet {
        println!("synced {synced} commit(s), {} provenance statement(s)", engine.store().len());
    }
    Ok(())
}
