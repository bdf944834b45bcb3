//! Core domain models
//!
//! This module defines the workflow configuration, the build matrix and the
//! job, step and result types the execution layer works with.

pub mod condition;
pub mod config;
pub mod error;
pub mod group;
pub mod matrix;
pub mod state;
pub mod step;

pub use condition::Condition;
pub use config::WorkflowConfig;
pub use error::{ConfigError, ExecutionError, UploadError};
pub use group::JobGroup;
pub use matrix::{Axis, JobSpec, MatrixConfig, MatrixExpander, MatrixRule};
pub use state::*;
pub use step::{render_template, template_variables, RenderedStep, Step};
