//! Error types for configuration, execution and coverage upload

use std::path::PathBuf;
use thiserror::Error;

/// Malformed workflow, matrix or rule definitions.
///
/// Raised before any job runs; the run is aborted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read workflow file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid workflow YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("matrix for group '{group}' declares no axes")]
    NoAxes { group: String },

    #[error("axis '{axis}' has no values")]
    EmptyAxis { axis: String },

    #[error("axis '{axis}' is declared more than once")]
    DuplicateAxis { axis: String },

    #[error("axis '{axis}' lists value '{value}' more than once")]
    DuplicateValue { axis: String, value: String },

    #[error("axis name '{axis}' is reserved")]
    ReservedAxis { axis: String },

    #[error("{context} references unknown axis '{axis}'")]
    UnknownAxis { context: String, axis: String },

    #[error("include rule #{index} does not assign axis '{axis}'")]
    IncompleteInclude { index: usize, axis: String },

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("invalid condition '{expression}': {reason}")]
    InvalidCondition { expression: String, reason: String },

    #[error("duplicate group name: {0}")]
    DuplicateGroup(String),

    #[error("group '{group}' has duplicate step name '{step}'")]
    DuplicateStep { group: String, step: String },

    #[error("step '{step}' in group '{group}': {reason}")]
    InvalidStep {
        group: String,
        step: String,
        reason: String,
    },

    #[error("unknown group: {0}")]
    UnknownGroup(String),

    #[error("coverage for group '{group}' refers to unknown test step '{step}'")]
    UnknownTestStep { group: String, step: String },
}

/// A command could not be run at all.
///
/// A non-zero exit is not an error; see [`crate::core::StepStatus::Failed`].
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },
}

/// Coverage report upload failed.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to read coverage report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("collector responded with {status}: {body}")]
    Status { status: u16, body: String },
}
