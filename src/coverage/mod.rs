//! Coverage reporting
//!
//! A coverage group runs its steps like any other group. When the test step
//! succeeds, the coverage tool is run as an extra `coverage` step and the
//! report it writes is uploaded together with the job's axis values.

pub mod upload;

pub use upload::{CoverageUploader, HttpUploader};

use crate::{
    core::{
        config::{scalar_map, CoverageConfig},
        render_template, template_variables, ConfigError, CoverageOutcome, JobResult, JobSpec, JobStatus,
        Step, StepOutcome, StepStatus, UploadError,
    },
    execution::{EventSink, ExecutionEvent, JobExecutor, JobRunner},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Name of the step outcome recorded for the coverage tool
pub const COVERAGE_STEP: &str = "coverage";

/// Upload target and policy
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub endpoint: String,

    /// Environment variable holding a bearer token
    pub token_env: Option<String>,

    /// Whether a failed upload fails the pipeline
    pub fail_on_upload_error: bool,

    pub timeout_secs: u64,

    /// Static metadata sent with every upload (templates)
    pub flags: BTreeMap<String, String>,
}

impl UploadSettings {
    /// Build the HTTP uploader for these settings
    pub fn http_uploader(&self) -> Result<HttpUploader, UploadError> {
        HttpUploader::new(
            self.endpoint.clone(),
            HttpUploader::token_from_env(self.token_env.as_deref()),
            self.timeout_secs,
        )
    }
}

/// Validated coverage configuration of a group
#[derive(Debug, Clone)]
pub struct CoverageSettings {
    /// Step whose success gates coverage
    pub test_step: String,

    /// The coverage tool invocation
    pub step: Step,

    /// Report path template, relative to the run directory
    pub report: String,

    pub upload: UploadSettings,
}

impl CoverageSettings {
    pub fn from_config(
        group: &str,
        config: &CoverageConfig,
        steps: &[Step],
        inherited_env: &BTreeMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let test_step = match &config.test_step {
            Some(name) => name.clone(),
            None => steps
                .last()
                .map(|step| step.name.clone())
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: format!("{}.coverage", group),
                    reason: "a coverage group needs at least one step".to_string(),
                })?,
        };

        if !steps.iter().any(|step| step.name == test_step) {
            return Err(ConfigError::UnknownTestStep {
                group: group.to_string(),
                step: test_step,
            });
        }
        if steps.iter().any(|step| step.name == COVERAGE_STEP) {
            return Err(ConfigError::DuplicateStep {
                group: group.to_string(),
                step: COVERAGE_STEP.to_string(),
            });
        }
        if config.command.trim().is_empty() {
            return Err(ConfigError::InvalidStep {
                group: group.to_string(),
                step: COVERAGE_STEP.to_string(),
                reason: "'command' is empty".to_string(),
            });
        }
        if config.report.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: format!("{}.coverage.report", group),
                reason: "report path is empty".to_string(),
            });
        }
        if config.upload.endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: format!("{}.coverage.upload.endpoint", group),
                reason: "endpoint is empty".to_string(),
            });
        }

        let mut step = Step::new(
            COVERAGE_STEP.to_string(),
            config.command.clone(),
            config.args.iter().map(|arg| arg.to_string()).collect(),
        );
        step.env = inherited_env.clone();
        step.env.extend(scalar_map(&config.env));

        Ok(Self {
            test_step,
            step,
            report: config.report.clone(),
            upload: UploadSettings {
                endpoint: config.upload.endpoint.clone(),
                token_env: config.upload.token_env.clone(),
                fail_on_upload_error: config.upload.fail_on_upload_error,
                timeout_secs: config.upload.timeout_secs,
                flags: scalar_map(&config.upload.flags),
            },
        })
    }

    /// Metadata sent with the report: flags, then group, job name and axis values
    pub fn metadata(&self, spec: &JobSpec) -> BTreeMap<String, String> {
        let variables = template_variables(spec);
        let mut metadata: BTreeMap<String, String> = self
            .upload
            .flags
            .iter()
            .map(|(key, value)| (key.clone(), render_template(value, &variables)))
            .collect();

        metadata.insert("group".to_string(), spec.group.clone());
        metadata.insert("job".to_string(), spec.name());
        for (axis, value) in &spec.values {
            metadata.insert(axis.clone(), value.clone());
        }
        metadata
    }

    /// Report path for `spec`, relative to the run directory
    pub fn report_path(&self, spec: &JobSpec) -> String {
        render_template(&self.report, &template_variables(spec))
    }
}

/// Job runner that measures and uploads coverage after the regular steps
pub struct CoverageReporter {
    runner: JobRunner,
    settings: CoverageSettings,
    uploader: Arc<dyn CoverageUploader>,
    base_dir: PathBuf,
    events: EventSink,
}

impl CoverageReporter {
    pub fn new(
        runner: JobRunner,
        settings: CoverageSettings,
        uploader: Arc<dyn CoverageUploader>,
        base_dir: impl Into<PathBuf>,
        events: EventSink,
    ) -> Self {
        Self {
            runner,
            settings,
            uploader,
            base_dir: base_dir.into(),
            events,
        }
    }

    fn skip(&self, result: &mut JobResult, reason: &str) {
        let outcome = StepOutcome::skipped(COVERAGE_STEP, reason);
        self.events.emit(ExecutionEvent::StepFinished {
            job: result.spec.clone(),
            outcome: outcome.clone(),
        });
        result.push_outcome(outcome);
    }
}

#[async_trait]
impl JobExecutor for CoverageReporter {
    async fn run_job(&self, spec: &JobSpec) -> JobResult {
        let mut result = self.runner.run_job(spec).await;

        if result.status != JobStatus::Success {
            self.skip(&mut result, "job failed");
            return result;
        }
        let test_succeeded = result
            .outcome(&self.settings.test_step)
            .is_some_and(|outcome| outcome.status == StepStatus::Succeeded);
        if !test_succeeded {
            info!(job = %spec, step = %self.settings.test_step, "Test step did not run, skipping coverage");
            self.skip(&mut result, "test step did not run");
            return result;
        }

        let outcome = self.runner.sequencer().run_step(&self.settings.step, spec).await;
        self.events.emit(ExecutionEvent::StepFinished {
            job: spec.clone(),
            outcome: outcome.clone(),
        });
        result.duration_ms += outcome.duration_ms;
        let tool_failed = outcome.is_failed();
        result.push_outcome(outcome);
        if tool_failed {
            return result;
        }

        let report = self.settings.report_path(spec);
        let fatal = self.settings.upload.fail_on_upload_error;
        let metadata = self.settings.metadata(spec);

        match self.uploader.upload(&self.base_dir.join(&report), &metadata).await {
            Ok(()) => {
                info!(job = %spec, report = %report, "Coverage uploaded");
                self.events.emit(ExecutionEvent::CoverageUploaded {
                    job: spec.clone(),
                    report: report.clone(),
                });
                result.coverage = Some(CoverageOutcome {
                    report,
                    uploaded: true,
                    error: None,
                    fatal,
                });
            }
            Err(e) => {
                warn!(job = %spec, fatal, "Coverage upload failed: {}", e);
                self.events.emit(ExecutionEvent::CoverageUploadFailed {
                    job: spec.clone(),
                    error: e.to_string(),
                    fatal,
                });
                if fatal {
                    result.fail_hard();
                }
                result.coverage = Some(CoverageOutcome {
                    report,
                    uploaded: false,
                    error: Some(e.to_string()),
                    fatal,
                });
            }
        }

        result
    }
}
