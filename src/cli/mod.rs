//! Command-line interface

pub mod commands;
pub mod output;

use crate::core::PipelineResult;
use clap::{Parser, Subcommand};
use commands::{ExpandCommand, HistoryCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Matrix build/test/coverage pipeline runner
#[derive(Debug, Parser, Clone)]
#[command(name = "matrix-pipeline")]
#[command(version)]
#[command(about = "Run build, test and coverage jobs across a matrix of toolchains and targets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the workflow's job groups
    Run(RunCommand),

    /// Validate a workflow configuration
    Validate(ValidateCommand),

    /// Show the jobs a workflow's matrices expand to
    Expand(ExpandCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

/// Process exit status for a run: non-zero iff some group failed.
///
/// Tolerated and cancelled jobs don't fail a group on their own.
pub fn exit_code(results: &[PipelineResult]) -> i32 {
    if results.iter().all(PipelineResult::is_success) {
        0
    } else {
        1
    }
}
