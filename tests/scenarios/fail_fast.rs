//! Test: Fail-fast - stop dispatching after the first hard failure

use crate::helpers::*;
use matrix_pipeline::core::{JobStatus, PipelineStatus};
use matrix_pipeline::execution::SchedulingStrategy;
use std::sync::Arc;
use std::time::Duration;

fn workflow(fail_fast: bool) -> String {
    format!(
        r#"
name: ci
groups:
  - name: build
    fail_fast: {}
    matrix:
      shard: [j1, j2, j3]
    steps:
      - name: test
        command: run-tests
        args: ["{{{{ shard }}}}"]
"#,
        fail_fast
    )
}

/// With one job at a time, J3 never starts once J1's failure is observed
#[tokio::test]
async fn test_sequential_fail_fast_cancels_remaining_jobs() {
    let executor = Arc::new(ScriptedExecutor::new().exit("run-tests j1", 1));
    let result = run_group(
        &workflow(true),
        "build",
        executor.clone(),
        Arc::new(RecordingUploader::new()),
        SchedulingStrategy::Sequential,
    )
    .await;

    assert_eq!(executor.calls(), vec!["run-tests j1"]);
    assert_job(job(&result, &["j1"]), JobStatus::Failed, false);
    assert_job(job(&result, &["j2"]), JobStatus::Cancelled, false);
    assert_job(job(&result, &["j3"]), JobStatus::Cancelled, false);
    assert_eq!(result.status, PipelineStatus::Failed);
    assert_eq!(result.cancelled(), 2);
}

/// Without fail-fast every job runs and the pipeline still fails
#[tokio::test]
async fn test_continue_on_all_errors() {
    let executor = Arc::new(ScriptedExecutor::new().exit("run-tests j1", 1));
    let result = run_group(
        &workflow(false),
        "build",
        executor.clone(),
        Arc::new(RecordingUploader::new()),
        SchedulingStrategy::Sequential,
    )
    .await;

    assert_eq!(executor.calls(), vec!["run-tests j1", "run-tests j2", "run-tests j3"]);
    assert_eq!(result.failed(), 1);
    assert_eq!(result.succeeded(), 2);
    assert_eq!(result.status, PipelineStatus::Failed);
}

/// In-flight jobs finish; results still follow emission order
#[tokio::test]
async fn test_in_flight_jobs_finish() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .exit("run-tests j1", 1)
            .slow("run-tests j2", Duration::from_millis(100)),
    );
    let result = run_group(
        &workflow(true),
        "build",
        executor.clone(),
        Arc::new(RecordingUploader::new()),
        SchedulingStrategy::LimitedParallel(2),
    )
    .await;

    // j1 and j2 were dispatched together; j3 waited for a permit
    assert_job(job(&result, &["j1"]), JobStatus::Failed, false);
    assert_job(job(&result, &["j2"]), JobStatus::Success, false);
    assert_job(job(&result, &["j3"]), JobStatus::Cancelled, false);
    assert!(!executor.invoked("j3"));

    let order: Vec<usize> = result.jobs.iter().map(|j| j.spec.index).collect();
    assert_eq!(order, vec![0, 1, 2]);
}

/// A successful run never cancels anything
#[tokio::test]
async fn test_fail_fast_all_succeed() {
    let executor = Arc::new(ScriptedExecutor::new());
    let result = run_group(
        &workflow(true),
        "build",
        executor,
        Arc::new(RecordingUploader::new()),
        SchedulingStrategy::Parallel,
    )
    .await;

    assert!(result.is_success());
    assert_eq!(result.succeeded(), 3);
}
