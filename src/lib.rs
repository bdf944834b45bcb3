//! matrix-pipeline - run build, test and coverage jobs across a matrix of
//! toolchains and targets

pub mod cli;
pub mod core;
pub mod coverage;
pub mod execution;
pub mod persistence;

// Re-export commonly used types
pub use core::{
    Condition, ConfigError, JobGroup, JobResult, JobSpec, MatrixConfig, MatrixExpander, PipelineResult, Step,
    WorkflowConfig,
};
pub use coverage::{CoverageReporter, CoverageUploader, HttpUploader};
pub use execution::{
    CommandExecutor, EventSink, ExecutionEvent, JobExecutor, JobRunner, PipelineOrchestrator, ProcessExecutor,
    SchedulingStrategy, StepSequencer,
};
