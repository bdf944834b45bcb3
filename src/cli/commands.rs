//! CLI command definitions

use crate::execution::SchedulingStrategy;
use clap::Args;

/// Run the workflow's job groups
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: String,

    /// Only run these groups (repeatable); defaults to all, in declaration order
    #[arg(short, long)]
    pub group: Vec<String>,

    /// Maximum number of jobs running at once (overrides the group setting)
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Stop dispatching jobs after the first hard failure
    #[arg(long, conflicts_with = "no_fail_fast")]
    pub fail_fast: bool,

    /// Run every job regardless of failures
    #[arg(long)]
    pub no_fail_fast: bool,

    /// Directory commands run in (defaults to the current directory)
    #[arg(long)]
    pub workdir: Option<String>,

    /// Don't save runs to history
    #[arg(long)]
    pub no_history: bool,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunCommand {
    /// Fail-fast setting forced from the command line, if any
    pub fn fail_fast_override(&self) -> Option<bool> {
        match (self.fail_fast, self.no_fail_fast) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    /// Scheduling strategy for a group, honoring `--max-parallel`
    pub fn strategy(&self, group_max_parallel: Option<usize>) -> SchedulingStrategy {
        SchedulingStrategy::from_max_parallel(self.max_parallel.or(group_max_parallel))
    }
}

/// Validate a workflow configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show the jobs a workflow's matrices expand to
#[derive(Debug, Args, Clone)]
pub struct ExpandCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: String,

    /// Only expand these groups
    #[arg(short, long)]
    pub group: Vec<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Workflow name to filter by
    #[arg(short, long)]
    pub workflow: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
