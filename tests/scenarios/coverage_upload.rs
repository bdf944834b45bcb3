//! Test: Coverage upload - measure after a successful test step, then upload

use crate::helpers::*;
use matrix_pipeline::core::{JobStatus, PipelineStatus, StepStatus};
use matrix_pipeline::execution::SchedulingStrategy;
use std::path::PathBuf;
use std::sync::Arc;

const WORKFLOW: &str = r#"
name: ci
groups:
  - name: coverage
    fail_fast: false
    continue_on_error: SOFT_FAIL
    matrix:
      toolchain: [stable]
      target: [linux, musl]
    steps:
      - name: build
        command: cargo
        args: [build, "{{ target }}"]
      - name: test
        command: cargo
        args: [test, "{{ target }}"]
      - name: bench
        command: cargo
        args: [bench]
        if: "target == linux"
    coverage:
      test_step: test
      command: cargo
      args: [llvm-cov, --lcov, --output-path, "lcov-{{ target }}.info"]
      report: "lcov-{{ target }}.info"
      upload:
        endpoint: https://collector.example/upload
        fail_on_upload_error: FATAL
        flags: { os: ubuntu-latest }
"#;

fn workflow(soft_fail: bool, fatal: bool) -> String {
    WORKFLOW
        .replace("SOFT_FAIL", &soft_fail.to_string())
        .replace("FATAL", &fatal.to_string())
}

async fn run(yaml: &str, executor: Arc<ScriptedExecutor>, uploader: Arc<RecordingUploader>) -> matrix_pipeline::core::PipelineResult {
    run_group(yaml, "coverage", executor, uploader, SchedulingStrategy::Sequential).await
}

/// Successful jobs upload their report tagged with group and axis values
#[tokio::test]
async fn test_upload_after_successful_tests() {
    let executor = Arc::new(ScriptedExecutor::new());
    let uploader = Arc::new(RecordingUploader::new());
    let result = run(&workflow(false, true), executor.clone(), uploader.clone()).await;

    assert!(result.is_success());
    assert!(executor.invoked("cargo llvm-cov --lcov --output-path lcov-linux.info"));

    let uploads = uploader.uploads();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].report, PathBuf::from("/work/lcov-linux.info"));
    assert_eq!(uploads[0].metadata["group"], "coverage");
    assert_eq!(uploads[0].metadata["toolchain"], "stable");
    assert_eq!(uploads[0].metadata["target"], "linux");
    assert_eq!(uploads[0].metadata["os"], "ubuntu-latest");
    assert_eq!(uploads[1].metadata["target"], "musl");

    let linux = job(&result, &["stable", "linux"]);
    assert_eq!(linux.outcome("coverage").unwrap().status, StepStatus::Succeeded);
    let coverage = linux.coverage.as_ref().unwrap();
    assert!(coverage.uploaded);
    assert_eq!(coverage.report, "lcov-linux.info");
}

/// No coverage is measured when the test step fails
#[tokio::test]
async fn test_no_coverage_after_failed_tests() {
    let executor = Arc::new(ScriptedExecutor::new().exit("cargo test musl", 101));
    let uploader = Arc::new(RecordingUploader::new());
    let result = run(&workflow(false, true), executor.clone(), uploader.clone()).await;

    let musl = job(&result, &["stable", "musl"]);
    assert_job(musl, JobStatus::Failed, false);
    assert_eq!(musl.outcome("coverage").unwrap().status, StepStatus::Skipped);
    assert!(musl.coverage.is_none());
    assert!(!executor.invoked("lcov-musl.info"));

    // Only the linux job uploaded
    let uploads = uploader.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].metadata["target"], "linux");
}

/// A failing coverage tool fails the job and nothing is uploaded
#[tokio::test]
async fn test_coverage_tool_failure() {
    let executor = Arc::new(ScriptedExecutor::new().exit("llvm-cov", 1));
    let uploader = Arc::new(RecordingUploader::new());
    let result = run(&workflow(false, true), executor, uploader.clone()).await;

    assert_eq!(result.status, PipelineStatus::Failed);
    let linux = job(&result, &["stable", "linux"]);
    assert_job(linux, JobStatus::Failed, false);
    assert_eq!(linux.first_failure().unwrap().step, "coverage");
    assert!(uploader.uploads().is_empty());
}

/// Fatal upload errors fail the pipeline
#[tokio::test]
async fn test_fatal_upload_failure() {
    let executor = Arc::new(ScriptedExecutor::new());
    let uploader = Arc::new(RecordingUploader::rejecting(503));
    let result = run(&workflow(false, true), executor, uploader).await;

    assert_eq!(result.status, PipelineStatus::Failed);
    let linux = job(&result, &["stable", "linux"]);
    assert_job(linux, JobStatus::Failed, false);

    let coverage = linux.coverage.as_ref().unwrap();
    assert!(!coverage.uploaded);
    assert!(coverage.fatal);
    assert!(coverage.error.as_deref().unwrap().contains("503"));
}

/// Fatal upload errors are not softened by the soft-fail policy
#[tokio::test]
async fn test_fatal_upload_failure_ignores_soft_fail() {
    let executor = Arc::new(ScriptedExecutor::new());
    let uploader = Arc::new(RecordingUploader::rejecting(500));
    let result = run(&workflow(true, true), executor, uploader).await;

    assert_eq!(result.status, PipelineStatus::Failed);
    assert_job(job(&result, &["stable", "musl"]), JobStatus::Failed, false);
}

/// Non-fatal upload errors are recorded but the jobs keep their status
#[tokio::test]
async fn test_tolerated_upload_failure() {
    let executor = Arc::new(ScriptedExecutor::new());
    let uploader = Arc::new(RecordingUploader::rejecting(500));
    let result = run(&workflow(false, false), executor, uploader.clone()).await;

    assert!(result.is_success());
    assert_eq!(uploader.uploads().len(), 2);

    let linux = job(&result, &["stable", "linux"]);
    assert_job(linux, JobStatus::Success, false);
    let coverage = linux.coverage.as_ref().unwrap();
    assert!(!coverage.uploaded);
    assert!(!coverage.fatal);
    assert!(coverage.error.is_some());
}

/// Coverage is skipped when the gating test step was skipped by its guard
#[tokio::test]
async fn test_skipped_test_step_skips_coverage() {
    let yaml = workflow(false, true).replace(
        "      - name: test\n        command: cargo\n        args: [test, \"{{ target }}\"]\n",
        "      - name: test\n        command: cargo\n        args: [test, \"{{ target }}\"]\n        if: \"target == linux\"\n",
    );
    let executor = Arc::new(ScriptedExecutor::new());
    let uploader = Arc::new(RecordingUploader::new());
    let result = run(&yaml, executor, uploader.clone()).await;

    assert!(result.is_success());
    let musl = job(&result, &["stable", "musl"]);
    let coverage = musl.outcome("coverage").unwrap();
    assert_eq!(coverage.status, StepStatus::Skipped);
    assert_eq!(coverage.detail.as_deref(), Some("test step did not run"));
    assert_eq!(uploader.uploads().len(), 1);
}
