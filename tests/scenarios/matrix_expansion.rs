//! Test: Matrix expansion - jobs from axes, include and exclude rules

use crate::helpers::*;
use matrix_pipeline::core::{ConfigError, JobSpec, WorkflowConfig};
use matrix_pipeline::execution::SchedulingStrategy;
use std::sync::Arc;

const WORKFLOW: &str = r#"
name: ci
groups:
  - name: build
    matrix:
      toolchain: [stable, beta, nightly]
      target: [linux, musl]
      exclude:
        - { toolchain: beta, target: musl }
      include:
        - { toolchain: "1.70", target: linux }
        - { toolchain: stable, target: linux }
    continue_on_error: "toolchain == nightly"
    steps:
      - name: build
        command: cargo
        args: [build, --target, "{{ matrix.target }}", "+{{ toolchain }}"]
"#;

fn names(jobs: &[JobSpec]) -> Vec<String> {
    jobs.iter().map(|j| j.name()).collect()
}

/// Cross product in declaration order, new includes appended, excludes removed
#[test]
fn test_expansion_order_and_rules() {
    let jobs = workflow_from_yaml(WORKFLOW).job_group("build").unwrap().jobs().unwrap();

    assert_eq!(
        names(&jobs),
        vec![
            "build (stable, linux)",
            "build (stable, musl)",
            "build (beta, linux)",
            "build (nightly, linux)",
            "build (nightly, musl)",
            "build (1.70, linux)",
        ]
    );

    let indices: Vec<usize> = jobs.iter().map(|j| j.index).collect();
    assert_eq!(indices, (0..6).collect::<Vec<_>>());

    let soft: Vec<bool> = jobs.iter().map(|j| j.soft_fail).collect();
    assert_eq!(soft, vec![false, false, false, true, true, false]);
}

/// Re-expanding yields identical jobs
#[test]
fn test_expansion_is_deterministic() {
    let config = workflow_from_yaml(WORKFLOW);
    let first = config.job_group("build").unwrap().jobs().unwrap();
    let second = config.job_group("build").unwrap().jobs().unwrap();
    assert_eq!(first, second);
}

/// Every expanded job runs with its own axis values substituted
#[tokio::test]
async fn test_each_job_renders_its_values() {
    let executor = Arc::new(ScriptedExecutor::new());
    let result = run_group(
        WORKFLOW,
        "build",
        executor.clone(),
        Arc::new(RecordingUploader::new()),
        SchedulingStrategy::Sequential,
    )
    .await;

    assert!(result.is_success());
    assert_eq!(
        executor.calls(),
        vec![
            "cargo build --target linux +stable",
            "cargo build --target musl +stable",
            "cargo build --target linux +beta",
            "cargo build --target linux +nightly",
            "cargo build --target musl +nightly",
            "cargo build --target linux +1.70",
        ]
    );
}

/// Rules naming an unknown axis are rejected before anything runs
#[test]
fn test_unknown_axis_in_include() {
    let yaml = r#"
name: ci
groups:
  - name: build
    matrix:
      toolchain: [stable]
      include:
        - { toolchain: beta, os: windows }
    steps:
      - name: build
        command: cargo
"#;
    let err = WorkflowConfig::from_yaml(yaml).unwrap_err();
    assert!(
        matches!(&err, ConfigError::UnknownAxis { axis, .. } if axis == "os"),
        "unexpected error: {}",
        err
    );
}

/// An axis with no values is rejected
#[test]
fn test_empty_axis() {
    let yaml = r#"
name: ci
groups:
  - name: build
    matrix:
      toolchain: []
    steps:
      - name: build
        command: cargo
"#;
    let err = WorkflowConfig::from_yaml(yaml).unwrap_err();
    assert!(matches!(&err, ConfigError::EmptyAxis { axis } if axis == "toolchain"));
}

/// Numeric and boolean YAML values become strings
#[test]
fn test_scalar_values() {
    let yaml = r#"
name: ci
groups:
  - name: build
    matrix:
      toolchain: ["1.70.0", 1.75]
      std: [true, false]
    steps:
      - name: build
        command: cargo
"#;
    let jobs = workflow_from_yaml(yaml).job_group("build").unwrap().jobs().unwrap();
    assert_eq!(jobs.len(), 4);
    assert_eq!(jobs[0].value("toolchain"), Some("1.70.0"));
    assert_eq!(jobs[2].value("toolchain"), Some("1.75"));
    assert_eq!(jobs[1].value("std"), Some("false"));
}

/// Excludes also filter forced includes
#[test]
fn test_exclude_filters_included_jobs() {
    let yaml = r#"
name: ci
groups:
  - name: build
    matrix:
      toolchain: [stable, nightly]
      target: [linux, musl]
      include:
        - { toolchain: "1.70", target: musl }
      exclude:
        - { target: musl }
    steps:
      - name: build
        command: cargo
"#;
    let jobs = workflow_from_yaml(yaml).job_group("build").unwrap().jobs().unwrap();
    assert_eq!(names(&jobs), vec!["build (stable, linux)", "build (nightly, linux)"]);
}

/// Repeated axis values and reserved axis names are rejected
#[test]
fn test_duplicate_value_and_reserved_axis() {
    let yaml = |matrix: &str| {
        format!(
            "name: ci\ngroups:\n  - name: build\n    matrix: {}\n    steps: [{{ name: build, command: cargo }}]\n",
            matrix
        )
    };

    let err = WorkflowConfig::from_yaml(&yaml("{ toolchain: [stable, stable] }")).unwrap_err();
    assert!(matches!(&err, ConfigError::DuplicateValue { axis, value } if axis == "toolchain" && value == "stable"));

    let err = WorkflowConfig::from_yaml(&yaml("{ group: [a, b] }")).unwrap_err();
    assert!(matches!(&err, ConfigError::ReservedAxis { axis } if axis == "group"));
}
