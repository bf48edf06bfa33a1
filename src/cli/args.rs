//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Use the store in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::merge::Strategy;

/// qvc - RDF datasets versioned in a git repository
#[derive(Parser, Debug)]
#[command(name = "qvc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Use the store in this directory instead of the current one
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the commits of a branch or tag
    #[command(
        name = "log",
        after_help = "\
EXAMPLES:
    # History of the current branch, newest first
    qvc log

    # Oldest first, with embedded commit properties
    qvc log develop --reverse --long"
    )]
    Log {
        /// Branch, tag or commit (defaults to HEAD)
        revision: Option<String>,

        /// Oldest commit first
        #[arg(short, long)]
        reverse: bool,

        /// Show author, date and commit properties
        #[arg(short, long)]
        long: bool,
    },

    /// Print the dataset of a revision as N-Quads
    #[command(name = "show")]
    Show {
        /// Branch, tag or commit (defaults to HEAD)
        revision: Option<String>,

        /// List tracked files and their graphs instead of statements
        #[arg(long)]
        files: bool,
    },

    /// Commit a JSON delta
    #[command(
        name = "update",
        long_about = "Commit a JSON delta.\n\n\
            The delta is a list of operations, each mapping a graph IRI to its \
            additions and removals, written as N-Triples statements.",
        after_help = "\
EXAMPLES:
    # Insert one statement into <http://ex.org/g> on the current branch
    echo '[{\"http://ex.org/g\": {\"additions\": [\"<http://ex.org/a> <http://ex.org/p> <http://ex.org/b> .\"]}}]' > delta.json
    qvc update delta.json -m \"add a\""
    )]
    Update {
        /// Path of the JSON delta, `-` for stdin
        delta: PathBuf,

        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Branch to commit on
        #[arg(long, default_value = "HEAD")]
        branch: String,

        /// Parent commit (defaults to the branch tip)
        #[arg(long)]
        parent: Option<String>,

        /// Update query recorded in the commit message
        #[arg(long)]
        query: Option<String>,
    },

    /// Merge a branch into a target
    #[command(
        name = "merge",
        after_help = "\
EXAMPLES:
    # Merge develop into master, union of both sides' changes
    qvc merge master develop

    # Stop on changes that touch the same blank node on both sides
    qvc merge master develop --strategy context"
    )]
    Merge {
        /// Target branch (defaults to HEAD)
        target: Option<String>,

        /// Branch to merge (defaults to FETCH_HEAD)
        branch: Option<String>,

        /// three-way or context
        #[arg(long, short, default_value_t = Strategy::ThreeWay)]
        strategy: Strategy,
    },

    /// Create a branch
    #[command(name = "branch")]
    Branch {
        /// Existing branch, tag or commit
        old: String,

        /// Name of the new branch
        new: String,
    },

    /// Fetch from a remote
    #[command(name = "fetch")]
    Fetch {
        /// Remote name (defaults to the upstream remote, else origin)
        remote: Option<String>,

        /// Refspec `[+]src[:dst]`
        refspec: Option<String>,
    },

    /// Fetch and merge into HEAD
    #[command(name = "pull")]
    Pull {
        /// Remote name (defaults to the upstream remote, else origin)
        remote: Option<String>,

        /// Refspec `[+]src[:dst]`
        refspec: Option<String>,

        /// three-way or context
        #[arg(long, short, default_value_t = Strategy::ThreeWay)]
        strategy: Strategy,
    },

    /// Push to a remote
    #[command(name = "push")]
    Push {
        /// Remote name (defaults to the upstream remote, else origin)
        remote: Option<String>,

        /// Refspec `[+]src[:dst]`
        refspec: Option<String>,
    },

    /// Record every commit in the provenance store
    #[command(name = "sync")]
    Sync,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn merge_defaults() {
        let cli = Cli::try_parse_from(["qvc", "merge"]).unwrap();
        match cli.command {
            Command::Merge {
                target,
                branch,
                strategy,
            } => {
                assert!(target.is_none());
                assert!(branch.is_none());
                assert_eq!(strategy, Strategy::ThreeWay);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn strategy_flag() {
        let cli = Cli::try_parse_from(["qvc", "merge", "master", "dev", "-s", "context"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Merge {
                strategy: Strategy::Context,
                ..
            }
        ));
    }

    #[test]
    fn update_requires_message() {
        assert!(Cli::try_parse_from(["qvc", "update", "delta.json"]).is_err());
    }
}
