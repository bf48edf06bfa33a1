//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! Each handler opens what it needs through [`Context`], calls into the
//! library and formats the result. Handlers never write to the repository
//! except through [`crate::sync::SyncEngine`] and [`crate::merge::Merger`].

mod branch;
mod log_cmd;
mod merge;
mod remote;
mod show;
mod sync;
mod update;

pub use branch::branch;
pub use log_cmd::log;
pub use merge::merge;
pub use remote::{fetch, pull, push};
pub use show::show;
pub use sync::sync;
pub use update::update;

use crate::cli::args::Command;
use crate::cli::Context;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Log {
            revision,
            reverse,
            long,
        } => log_cmd::log(ctx, revision.as_deref(), reverse, long),
        Command::Show { revision, files } => show::show(ctx, revision.as_deref(), files),
        Command::Update {
            delta,
            message,
            branch,
            parent,
            query,
        } => update::update(
            ctx,
            &delta,
            &message,
            &branch,
            parent.as_deref(),
            query.as_deref(),
        ),
        Command::Merge {
            target,
            branch,
            strategy,
        } => merge::merge(ctx, target.as_deref(), branch.as_deref(), strategy),
        Command::Branch { old, new } => branch::branch(ctx, &old, &new),
        Command::Fetch { remote, refspec } => {
            remote::fetch(ctx, remote.as_deref(), refspec.as_deref())
        }
        Command::Pull {
            remote,
            refspec,
            strategy,
        } => remote::pull(ctx, remote.as_deref(), refspec.as_deref(), strategy),
        Command::Push { remote, refspec } => {
            remote::push(ctx, remote.as_deref(), refspec.as_deref())
        }
        Command::Sync => sync::sync(ctx),
    }
}
