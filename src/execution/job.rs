//! Job execution - runs every step of one matrix job

use crate::{
    core::{JobResult, JobSpec, Step},
    execution::StepSequencer,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Trait for job execution - the orchestrator's view of a job
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Run a job to completion. Failures are reported in the result.
    async fn run_job(&self, spec: &JobSpec) -> JobResult;
}

/// Runs a group's steps for each job it is given
#[derive(Clone)]
pub struct JobRunner {
    sequencer: StepSequencer,
    steps: Arc<Vec<Step>>,
}

impl JobRunner {
    pub fn new(sequencer: StepSequencer, steps: Vec<Step>) -> Self {
        Self {
            sequencer,
            steps: Arc::new(steps),
        }
    }

    pub fn sequencer(&self) -> &StepSequencer {
        &self.sequencer
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

#[async_trait]
impl JobExecutor for JobRunner {
    async fn run_job(&self, spec: &JobSpec) -> JobResult {
        let start = Instant::now();
        let outcomes = self.sequencer.run_steps(&self.steps, spec).await;
        let result = JobResult::from_outcomes(spec.clone(), outcomes, start.elapsed().as_millis() as u64);

        info!(
            job = %spec,
            status = ?result.status,
            tolerated = result.tolerated,
            "Job finished"
        );
        result
    }
}
