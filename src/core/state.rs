//! Execution result models

use crate::core::matrix::JobSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal state of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// What happened to one step of one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Step name
    pub step: String,

    pub status: StepStatus,

    /// Exit code, when the process ran to completion
    pub exit_code: Option<i32>,

    #[serde(default)]
    pub stdout: String,

    #[serde(default)]
    pub stderr: String,

    /// Skip reason or launch error
    #[serde(default)]
    pub detail: Option<String>,

    #[serde(default)]
    pub duration_ms: u64,
}

impl StepOutcome {
    pub fn succeeded(step: &str, exit_code: i32, stdout: String, stderr: String, duration_ms: u64) -> Self {
        Self {
            step: step.to_string(),
            status: StepStatus::Succeeded,
            exit_code: Some(exit_code),
            stdout,
            stderr,
            detail: None,
            duration_ms,
        }
    }

    pub fn failed(step: &str, exit_code: i32, stdout: String, stderr: String, duration_ms: u64) -> Self {
        Self {
            step: step.to_string(),
            status: StepStatus::Failed,
            exit_code: Some(exit_code),
            stdout,
            stderr,
            detail: None,
            duration_ms,
        }
    }

    /// The step could not be launched at all
    pub fn errored(step: &str, error: String, duration_ms: u64) -> Self {
        Self {
            step: step.to_string(),
            status: StepStatus::Failed,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            detail: Some(error),
            duration_ms,
        }
    }

    pub fn skipped(step: &str, reason: &str) -> Self {
        Self {
            step: step.to_string(),
            status: StepStatus::Skipped,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            detail: Some(reason.to_string()),
            duration_ms: 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}

/// Terminal state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Failed,
    /// Never started because of fail-fast
    Cancelled,
}

/// Coverage measurement and upload outcome for one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageOutcome {
    /// Report path as rendered for the job
    pub report: String,

    pub uploaded: bool,

    /// Upload error, if any
    pub error: Option<String>,

    /// Whether an upload error fails the pipeline
    pub fatal: bool,
}

/// Result of running one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub spec: JobSpec,
    pub steps: Vec<StepOutcome>,
    pub status: JobStatus,

    /// Failed, but the job's soft-fail policy keeps it from failing the pipeline
    pub tolerated: bool,

    #[serde(default)]
    pub coverage: Option<CoverageOutcome>,

    #[serde(default)]
    pub duration_ms: u64,
}

impl JobResult {
    /// Build a result from step outcomes, applying the soft-fail policy
    pub fn from_outcomes(spec: JobSpec, steps: Vec<StepOutcome>, duration_ms: u64) -> Self {
        let failed = steps.iter().any(StepOutcome::is_failed);
        let status = if failed { JobStatus::Failed } else { JobStatus::Success };
        let tolerated = failed && spec.soft_fail;
        Self {
            spec,
            steps,
            status,
            tolerated,
            coverage: None,
            duration_ms,
        }
    }

    pub fn cancelled(spec: JobSpec) -> Self {
        Self {
            spec,
            steps: Vec::new(),
            status: JobStatus::Cancelled,
            tolerated: false,
            coverage: None,
            duration_ms: 0,
        }
    }

    /// Append an outcome produced after the regular steps
    pub fn push_outcome(&mut self, outcome: StepOutcome) {
        if outcome.is_failed() {
            self.status = JobStatus::Failed;
            self.tolerated = self.spec.soft_fail;
        }
        self.steps.push(outcome);
    }

    /// Mark the job as a hard failure regardless of its soft-fail policy
    pub fn fail_hard(&mut self) {
        self.status = JobStatus::Failed;
        self.tolerated = false;
    }

    /// Failed and not tolerated
    pub fn counts_as_failure(&self) -> bool {
        self.status == JobStatus::Failed && !self.tolerated
    }

    /// First step that failed
    pub fn first_failure(&self) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.is_failed())
    }

    pub fn outcome(&self, step: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == step)
    }
}

/// Aggregate status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Success,
    Failed,
}

/// Result of running one job group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Unique run ID
    pub run_id: Uuid,

    /// Job group name
    pub group: String,

    /// Job results in emission order
    pub jobs: Vec<JobResult>,

    pub status: PipelineStatus,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl PipelineResult {
    /// Aggregate job results; failed iff some job failed without being tolerated
    pub fn new(group: &str, jobs: Vec<JobResult>, started_at: DateTime<Utc>) -> Self {
        let status = if jobs.iter().any(JobResult::counts_as_failure) {
            PipelineStatus::Failed
        } else {
            PipelineStatus::Success
        };
        Self {
            run_id: Uuid::new_v4(),
            group: group.to_string(),
            jobs,
            status,
            started_at,
            completed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Success
    }

    pub fn succeeded(&self) -> usize {
        self.count(|j| j.status == JobStatus::Success)
    }

    pub fn failed(&self) -> usize {
        self.count(JobResult::counts_as_failure)
    }

    pub fn tolerated(&self) -> usize {
        self.count(|j| j.status == JobStatus::Failed && j.tolerated)
    }

    pub fn cancelled(&self) -> usize {
        self.count(|j| j.status == JobStatus::Cancelled)
    }

    fn count<F: Fn(&JobResult) -> bool>(&self, predicate: F) -> usize {
        self.jobs.iter().filter(|j| predicate(j)).count()
    }
}
