//! CLI command definitions using clap.
//!
//! Two subcommands:
//! - review: run the Creator/Reviewer loop for one asset
//! - status: show review loop progress for the workspace

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Redraft - Creator/Reviewer convergence loop for episode copy
#[derive(Parser, Debug)]
#[command(name = "redraft")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the review loop for one asset
    Review {
        /// Asset id to draft (description, shownotes, slug, ...)
        #[arg(short, long)]
        asset: String,

        /// Episode workspace directory
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Iteration cap, overriding the configured default
        #[arg(short, long)]
        max_iterations: Option<u32>,

        /// YAML reply script driving scripted agents instead of real CLIs
        #[arg(long)]
        fake_replies: Option<PathBuf>,
    },

    /// Show review loop progress for each asset
    Status {
        /// Only show this asset
        #[arg(short, long)]
        asset: Option<String>,

        /// Episode workspace directory
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },
}
