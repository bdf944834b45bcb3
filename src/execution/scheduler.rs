//! Execution scheduler - decides how many jobs may run at once

/// Strategy for scheduling job execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// Execute jobs in emission order, one at a time
    Sequential,

    /// Execute all jobs at once
    #[default]
    Parallel,

    /// Limited parallelism (max N concurrent jobs)
    LimitedParallel(usize),
}

impl SchedulingStrategy {
    /// Strategy for a group's `max_parallel` setting
    pub fn from_max_parallel(max_parallel: Option<usize>) -> Self {
        match max_parallel {
            None => SchedulingStrategy::Parallel,
            Some(0) | Some(1) => SchedulingStrategy::Sequential,
            Some(n) => SchedulingStrategy::LimitedParallel(n),
        }
    }

    /// Number of jobs allowed to run concurrently, never less than one
    pub fn concurrency_limit(&self, job_count: usize) -> usize {
        let limit = match self {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => job_count,
            SchedulingStrategy::LimitedParallel(max) => (*max).min(job_count),
        };
        limit.max(1)
    }
}
