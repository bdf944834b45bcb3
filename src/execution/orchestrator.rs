//! Pipeline orchestrator - runs every job of one group under a concurrency limit

use crate::{
    core::{JobResult, JobSpec, PipelineResult},
    execution::{EventSink, ExecutionEvent, JobExecutor, SchedulingStrategy},
};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Dispatches jobs to a [`JobExecutor`] and aggregates their results
pub struct PipelineOrchestrator {
    runner: Arc<dyn JobExecutor>,
    strategy: SchedulingStrategy,
    events: EventSink,
}

impl PipelineOrchestrator {
    pub fn new(runner: Arc<dyn JobExecutor>, strategy: SchedulingStrategy, events: EventSink) -> Self {
        Self {
            runner,
            strategy,
            events,
        }
    }

    /// Run all `jobs` of `group`.
    ///
    /// Jobs are dispatched in emission order as permits free up. With
    /// `fail_fast`, once a job fails without being tolerated no further job
    /// is started; jobs already running finish normally. Results keep
    /// emission order regardless of completion order.
    pub async fn run(&self, group: &str, jobs: Vec<JobSpec>, fail_fast: bool) -> PipelineResult {
        let started_at = Utc::now();
        let total = jobs.len();
        let limit = self.strategy.concurrency_limit(total);

        info!(group, jobs = total, limit, fail_fast, "Starting pipeline");
        self.events.emit(ExecutionEvent::PipelineStarted {
            group: group.to_string(),
            total_jobs: total,
        });

        let semaphore = Arc::new(Semaphore::new(limit));
        let failed = Arc::new(AtomicBool::new(false));
        let mut slots: Vec<Option<JobResult>> = vec![None; total];
        let mut specs: Vec<JobSpec> = Vec::with_capacity(total);
        let mut tasks = JoinSet::new();

        for (position, spec) in jobs.into_iter().enumerate() {
            specs.push(spec.clone());

            // Acquired in order, so job N+1 never starts before job N
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Job semaphore closed: {}", e);
                    slots[position] = Some(JobResult::cancelled(spec));
                    continue;
                }
            };

            if fail_fast && failed.load(Ordering::SeqCst) {
                drop(permit);
                info!(job = %spec, "Cancelled by fail-fast");
                self.events.emit(ExecutionEvent::JobCancelled { job: spec.clone() });
                slots[position] = Some(JobResult::cancelled(spec));
                continue;
            }

            let runner = self.runner.clone();
            let failed = failed.clone();
            let events = self.events.clone();
            tasks.spawn(async move {
                events.emit(ExecutionEvent::JobStarted { job: spec.clone() });
                let job = spec.clone();
                let result = match tokio::spawn(async move { runner.run_job(&job).await }).await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(job = %spec, "Job aborted: {}", e);
                        aborted(spec)
                    }
                };
                if result.counts_as_failure() {
                    // Published before the permit is released
                    failed.store(true, Ordering::SeqCst);
                }
                drop(permit);
                events.emit(ExecutionEvent::JobFinished {
                    result: result.clone(),
                });
                (position, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, result)) => slots[position] = Some(result),
                Err(e) => error!("Job task panicked: {}", e),
            }
        }

        let results: Vec<JobResult> = slots
            .into_iter()
            .zip(specs)
            .map(|(slot, spec)| {
                slot.unwrap_or_else(|| {
                    warn!(job = %spec, "Job produced no result");
                    aborted(spec)
                })
            })
            .collect();

        let result = PipelineResult::new(group, results, started_at);
        info!(
            group,
            status = ?result.status,
            succeeded = result.succeeded(),
            failed = result.failed(),
            tolerated = result.tolerated(),
            cancelled = result.cancelled(),
            "Pipeline finished"
        );
        self.events.emit(ExecutionEvent::PipelineCompleted {
            run_id: result.run_id,
            group: group.to_string(),
            status: result.status,
        });
        result
    }
}

/// A job that ended without producing a result counts as a hard failure
fn aborted(spec: JobSpec) -> JobResult {
    let mut result = JobResult::cancelled(spec);
    result.fail_hard();
    result
}
