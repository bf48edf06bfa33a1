//! show command - Print the dataset of a revision

use crate::cli::Context;
use anyhow::{Context as _, Result};

/// Print the instance of `revision` as sorted N-Quads, or its tracked files.
pub fn show(ctx: &Context, revision: Option<&str>, files: bool) -> Result<()> {
    let engine = ctx.engine()?;
    let name = revision.unwrap_or("HEAD");

    if files {
        let files = engine
            .files(name)
            .with_context(|| format!("Failed to list files of {name}"))?;
        for (path, graphs) in files {
            let graphs: Vec<String> = graphs.iter().map(ToString::to_string).collect();
            println!("{path}\t{}", graphs.join(" "));
        }
        return Ok(());
    }

    let dataset = engine
        .instance(name)
        .with_context(|| format!("Failed to read dataset of {name}"))?;
    let nquads = dataset.to_nquads();
    if !nquads.is_empty() {
        println!("{nquads}");
    }
    Ok(())
}
