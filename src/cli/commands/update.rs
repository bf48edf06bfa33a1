//! update command - Commit a JSON delta

use std::io::Read;
use std::path::Path;

use crate::cli::Context;
use crate::core::delta::Delta;
use crate::sync::CommitRequest;
use anyhow::{Context as _, Result};

fn read_delta(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read delta from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Apply the delta at `path` as one commit on `branch`.
pub fn update(
    ctx: &Context,
    path: &Path,
    message: &str,
    branch: &str,
    parent: Option<&str>,
    query: Option<&str>,
) -> Result<()> {
    let delta = Delta::from_json(&read_delta(path)?).context("Invalid delta")?;
    let mut engine = ctx.engine()?;

    let mut request = CommitRequest::new(message).on_ref(branch);
    if let Some(parent) = parent {
        request = request.with_parent(parent);
    }
    if let Some(query) = query {
        request = request.with_query(query);
    }

    match engine.commit(&delta, &request).context("Commit failed")? {
        Some(id) => println!("{id}"),
        None => {
            if !ctx.quiet {
                eprintln!("Nothing to commit.");
            }
        }
    }
    Ok(())
}
