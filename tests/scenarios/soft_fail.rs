//! Test: Soft-fail - tolerated failures don't fail the pipeline

use crate::helpers::*;
use matrix_pipeline::core::{JobStatus, PipelineStatus, StepStatus};
use matrix_pipeline::execution::SchedulingStrategy;
use std::sync::Arc;

const WORKFLOW: &str = r#"
name: ci
groups:
  - name: build
    fail_fast: false
    matrix:
      toolchain: [stable, nightly]
      target: [linux, musl]
    continue_on_error: "toolchain == 'nightly'"
    steps:
      - name: build
        run: "build {{ matrix.toolchain }} {{ matrix.target }}"
      - name: test
        run: "test {{ matrix.toolchain }} {{ matrix.target }}"
"#;

/// The nightly/musl test failure is tolerated; three successes plus one
/// tolerated failure is a successful pipeline
#[tokio::test]
async fn test_tolerated_nightly_failure() {
    let executor = Arc::new(ScriptedExecutor::new().exit("test nightly musl", 1));
    let result = run_group(
        WORKFLOW,
        "build",
        executor.clone(),
        Arc::new(RecordingUploader::new()),
        SchedulingStrategy::Parallel,
    )
    .await;

    assert_eq!(result.jobs.len(), 4);
    assert_eq!(result.status, PipelineStatus::Success);
    assert_eq!(result.succeeded(), 3);
    assert_eq!(result.tolerated(), 1);
    assert_eq!(result.failed(), 0);

    let nightly_musl = job(&result, &["nightly", "musl"]);
    assert_job(nightly_musl, JobStatus::Failed, true);
    assert_eq!(nightly_musl.outcome("test").unwrap().status, StepStatus::Failed);

    assert_job(job(&result, &["stable", "linux"]), JobStatus::Success, false);
    assert_job(job(&result, &["nightly", "linux"]), JobStatus::Success, false);
}

/// The same failure on a hard-fail toolchain fails the pipeline
#[tokio::test]
async fn test_stable_failure_is_not_tolerated() {
    let executor = Arc::new(ScriptedExecutor::new().exit("test stable musl", 1));
    let result = run_group(
        WORKFLOW,
        "build",
        executor.clone(),
        Arc::new(RecordingUploader::new()),
        SchedulingStrategy::Parallel,
    )
    .await;

    assert_eq!(result.status, PipelineStatus::Failed);
    assert_job(job(&result, &["stable", "musl"]), JobStatus::Failed, false);

    // fail_fast is off: every job still ran
    assert_eq!(result.cancelled(), 0);
    assert!(executor.invoked("test nightly musl"));
}

/// A soft-fail job that succeeds is a plain success
#[tokio::test]
async fn test_soft_fail_job_can_succeed() {
    let executor = Arc::new(ScriptedExecutor::new());
    let result = run_group(
        WORKFLOW,
        "build",
        executor,
        Arc::new(RecordingUploader::new()),
        SchedulingStrategy::Sequential,
    )
    .await;

    let nightly = job(&result, &["nightly", "linux"]);
    assert!(nightly.spec.soft_fail);
    assert_job(nightly, JobStatus::Success, false);
    assert_eq!(result.tolerated(), 0);
    assert!(result.is_success());
}

/// `continue_on_error: true` tolerates every job
#[tokio::test]
async fn test_boolean_policy() {
    let yaml = r#"
name: ci
groups:
  - name: lint
    continue_on_error: true
    matrix:
      toolchain: [stable, beta]
    steps:
      - name: clippy
        run: "clippy {{ toolchain }}"
"#;
    let executor = Arc::new(ScriptedExecutor::new().exit("clippy", 1));
    let result = run_group(
        yaml,
        "lint",
        executor.clone(),
        Arc::new(RecordingUploader::new()),
        SchedulingStrategy::Sequential,
    )
    .await;

    assert_eq!(result.tolerated(), 2);
    assert!(result.is_success());

    // Tolerated failures never trigger fail-fast
    assert_eq!(executor.calls().len(), 2);
}
