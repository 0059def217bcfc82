//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

pub mod completions;
pub mod run;

/// Patchbay - apply a plan of edits to a checkout and keep only what succeeded.
#[derive(Debug, Parser)]
#[command(name = "patchbay", version, about)]
pub struct Cli {
    /// Suppress progress output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run every step of a plan and print the cumulative patch.
    Run(RunArgs),

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Plan file listing the steps to attempt.
    pub plan: PathBuf,

    /// Working tree to change (defaults to the current directory).
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Config file (defaults to .git/patchbay/config.toml).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Stop at the first failing step.
    #[arg(long)]
    pub fail_fast: bool,

    /// Print a JSON report of every attempt instead of the bare patch.
    #[arg(long)]
    pub json: bool,

    /// Write the patch to a file instead of stdout.
    #[arg(long, value_name = "FILE")]
    pub patch_out: Option<PathBuf>,
}
