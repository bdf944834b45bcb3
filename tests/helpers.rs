//! Test utility functions for matrix-pipeline

#![allow(dead_code)]

use async_trait::async_trait;
use matrix_pipeline::core::{
    ExecutionError, JobResult, JobStatus, PipelineResult, RenderedStep, StepStatus, UploadError, WorkflowConfig,
};
use matrix_pipeline::coverage::{CoverageReporter, CoverageUploader};
use matrix_pipeline::execution::{
    CommandExecutor, CommandOutput, EventSink, JobExecutor, JobRunner, PipelineOrchestrator, SchedulingStrategy,
    StepSequencer,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Command executor that answers from a script instead of spawning processes.
///
/// Each invocation is rendered to a single command line (`command arg...`).
/// The first rule whose pattern is contained in that line decides the exit
/// code; everything else exits 0.
#[derive(Default)]
pub struct ScriptedExecutor {
    rules: Vec<(String, Result<i32, String>)>,
    delay: Option<Duration>,
    slow: Vec<(String, Duration)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit with `code` when the command line contains `pattern`
    pub fn exit(mut self, pattern: &str, code: i32) -> Self {
        self.rules.push((pattern.to_string(), Ok(code)));
        self
    }

    /// Fail to launch when the command line contains `pattern`
    pub fn unlaunchable(mut self, pattern: &str) -> Self {
        self.rules.push((pattern.to_string(), Err(pattern.to_string())));
        self
    }

    /// Sleep this long in every invocation
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep `delay` when the command line contains `pattern`
    pub fn slow(mut self, pattern: &str, delay: Duration) -> Self {
        self.slow.push((pattern.to_string(), delay));
        self
    }

    /// Command lines in invocation order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether any invocation contained `pattern`
    pub fn invoked(&self, pattern: &str) -> bool {
        self.calls().iter().any(|call| call.contains(pattern))
    }
}

pub fn command_line(step: &RenderedStep) -> String {
    std::iter::once(step.command.as_str())
        .chain(step.args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn run(&self, step: &RenderedStep) -> Result<CommandOutput, ExecutionError> {
        let line = command_line(step);
        self.calls.lock().unwrap().push(line.clone());

        let delay = self
            .slow
            .iter()
            .find(|(pattern, _)| line.contains(pattern.as_str()))
            .map(|(_, delay)| *delay)
            .or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let rule = self.rules.iter().find(|(pattern, _)| line.contains(pattern.as_str()));
        match rule {
            Some((_, Err(_))) => Err(ExecutionError::Launch {
                command: step.command.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
            Some((_, Ok(code))) => Ok(CommandOutput {
                exit_code: *code,
                stdout: format!("ran: {}", line),
                stderr: format!("exit {}", code),
            }),
            None => Ok(CommandOutput {
                exit_code: 0,
                stdout: format!("ran: {}", line),
                stderr: String::new(),
            }),
        }
    }
}

/// One recorded upload
#[derive(Debug, Clone)]
pub struct Upload {
    pub report: PathBuf,
    pub metadata: BTreeMap<String, String>,
}

/// Coverage uploader that records uploads and optionally fails them
#[derive(Default)]
pub struct RecordingUploader {
    fail_with_status: Option<u16>,
    uploads: Mutex<Vec<Upload>>,
}

impl RecordingUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every upload with this HTTP status
    pub fn rejecting(status: u16) -> Self {
        Self {
            fail_with_status: Some(status),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl CoverageUploader for RecordingUploader {
    async fn upload(&self, report: &Path, metadata: &BTreeMap<String, String>) -> Result<(), UploadError> {
        self.uploads.lock().unwrap().push(Upload {
            report: report.to_path_buf(),
            metadata: metadata.clone(),
        });
        match self.fail_with_status {
            Some(status) => Err(UploadError::Status {
                status,
                body: "rejected".to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Parse a workflow from YAML string
pub fn workflow_from_yaml(yaml: &str) -> WorkflowConfig {
    WorkflowConfig::from_yaml(yaml).unwrap_or_else(|e| panic!("Failed to parse workflow YAML: {}", e))
}

/// Run one group of a workflow against a scripted executor
pub async fn run_group(
    yaml: &str,
    group: &str,
    executor: Arc<ScriptedExecutor>,
    uploader: Arc<RecordingUploader>,
    strategy: SchedulingStrategy,
) -> PipelineResult {
    let config = workflow_from_yaml(yaml);
    let group = config
        .job_group(group)
        .unwrap_or_else(|e| panic!("Failed to build group: {}", e));
    let jobs = group.jobs().unwrap();

    let events = EventSink::new();
    let sequencer = StepSequencer::new(executor, events.clone());
    let runner = JobRunner::new(sequencer, group.steps.clone());
    let job_executor: Arc<dyn JobExecutor> = match &group.coverage {
        Some(settings) => Arc::new(CoverageReporter::new(
            runner,
            settings.clone(),
            uploader,
            "/work",
            events.clone(),
        )),
        None => Arc::new(runner),
    };

    PipelineOrchestrator::new(job_executor, strategy, events)
        .run(&group.name, jobs, group.fail_fast)
        .await
}

/// Find a job by its axis values, in axis order
pub fn job<'a>(result: &'a PipelineResult, values: &[&str]) -> &'a JobResult {
    result
        .jobs
        .iter()
        .find(|job| {
            job.spec
                .values
                .iter()
                .map(|(_, v)| v.as_str())
                .eq(values.iter().copied())
        })
        .unwrap_or_else(|| panic!("No job with values {:?}", values))
}

/// Step statuses of a job, in order
pub fn step_statuses(job: &JobResult) -> Vec<(String, StepStatus)> {
    job.steps.iter().map(|s| (s.step.clone(), s.status)).collect()
}

/// Assert the job ended with `status` and the given tolerance
pub fn assert_job(job: &JobResult, status: JobStatus, tolerated: bool) {
    assert_eq!(
        (job.status, job.tolerated),
        (status, tolerated),
        "job {} ended as {:?} (tolerated: {}), steps: {:?}",
        job.spec,
        job.status,
        job.tolerated,
        step_statuses(job)
    );
}
