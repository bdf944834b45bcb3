//! Step sequencer - runs a job's steps in order, stopping at the first failure

use crate::{
    core::{JobSpec, Step, StepOutcome},
    execution::{CommandExecutor, EventSink, ExecutionEvent},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const CONDITION_NOT_MET: &str = "condition not met";
const PREVIOUS_STEP_FAILED: &str = "previous step failed";

/// Runs steps sequentially through a [`CommandExecutor`]
#[derive(Clone)]
pub struct StepSequencer {
    executor: Arc<dyn CommandExecutor>,
    events: EventSink,
}

impl StepSequencer {
    pub fn new(executor: Arc<dyn CommandExecutor>, events: EventSink) -> Self {
        Self { executor, events }
    }

    /// Run `steps` for `spec`.
    ///
    /// Returns one outcome per step, in order. After a failure the remaining
    /// steps are recorded as skipped and never invoked.
    pub async fn run_steps(&self, steps: &[Step], spec: &JobSpec) -> Vec<StepOutcome> {
        let mut outcomes = Vec::with_capacity(steps.len());
        let mut failed = false;

        for step in steps {
            let outcome = if failed {
                StepOutcome::skipped(&step.name, PREVIOUS_STEP_FAILED)
            } else if !step.should_run(spec) {
                debug!(job = %spec, step = %step.name, "Guard not met, skipping");
                StepOutcome::skipped(&step.name, CONDITION_NOT_MET)
            } else {
                let outcome = self.run_step(step, spec).await;
                failed = outcome.is_failed();
                outcome
            };

            self.events.emit(ExecutionEvent::StepFinished {
                job: spec.clone(),
                outcome: outcome.clone(),
            });
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Run a single step, ignoring its guard
    pub async fn run_step(&self, step: &Step, spec: &JobSpec) -> StepOutcome {
        let rendered = step.render(spec);
        info!(job = %spec, step = %step.name, "Running step");

        let start = Instant::now();
        let result = self.executor.run(&rendered).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(output) if output.success() => {
                StepOutcome::succeeded(&step.name, output.exit_code, output.stdout, output.stderr, duration_ms)
            }
            Ok(output) => {
                warn!(job = %spec, step = %step.name, "Step exited with code {}", output.exit_code);
                StepOutcome::failed(&step.name, output.exit_code, output.stdout, output.stderr, duration_ms)
            }
            Err(e) => {
                warn!(job = %spec, step = %step.name, "Step could not run: {}", e);
                StepOutcome::errored(&step.name, e.to_string(), duration_ms)
            }
        }
    }
}
