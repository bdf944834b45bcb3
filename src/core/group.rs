//! Job group domain model

use crate::core::{
    condition::Condition,
    config::{GroupConfig, WorkflowConfig},
    error::ConfigError,
    matrix::{JobSpec, MatrixConfig, MatrixExpander},
    step::Step,
};
use crate::coverage::CoverageSettings;
use std::collections::HashSet;

/// A fully validated job group, ready to expand and run
#[derive(Debug, Clone)]
pub struct JobGroup {
    /// Group name
    pub name: String,

    /// Matrix definition
    pub matrix: MatrixConfig,

    /// Soft-fail policy, evaluated once per job at expansion
    pub soft_fail: Condition,

    /// Ordered steps every job runs
    pub steps: Vec<Step>,

    /// Stop dispatching new jobs after the first hard failure
    pub fail_fast: bool,

    /// Maximum number of jobs running at once
    pub max_parallel: Option<usize>,

    /// Coverage measurement and upload
    pub coverage: Option<CoverageSettings>,
}

impl JobGroup {
    /// Create a group from configuration
    pub fn from_config(workflow: &WorkflowConfig, config: &GroupConfig) -> Result<Self, ConfigError> {
        let matrix = config.matrix_config()?;
        matrix.validate(&config.name)?;

        let soft_fail = config.soft_fail_condition()?;

        let mut env = workflow.env_map();
        env.extend(config.env_map());

        let mut names = HashSet::new();
        let mut steps = Vec::with_capacity(config.steps.len());
        for step_config in &config.steps {
            if !names.insert(step_config.name.as_str()) {
                return Err(ConfigError::DuplicateStep {
                    group: config.name.clone(),
                    step: step_config.name.clone(),
                });
            }

            let step = Step::from_config(&config.name, step_config, &env, workflow.default_timeout_secs)?;
            if let Some(guard) = &step.guard {
                check_axes(&matrix, guard, &format!("condition of step '{}'", step.name))?;
            }
            steps.push(step);
        }

        let coverage = config
            .coverage
            .as_ref()
            .map(|coverage| CoverageSettings::from_config(&config.name, coverage, &steps, &env))
            .transpose()?;

        Ok(Self {
            name: config.name.clone(),
            matrix,
            soft_fail,
            steps,
            fail_fast: config.fail_fast,
            max_parallel: config.max_parallel,
            coverage,
        })
    }

    /// Expand the matrix into concrete jobs
    pub fn jobs(&self) -> Result<Vec<JobSpec>, ConfigError> {
        MatrixExpander::expand(&self.name, &self.matrix, &self.soft_fail)
    }

    /// Whether this group measures and uploads coverage
    pub fn is_coverage(&self) -> bool {
        self.coverage.is_some()
    }
}

fn check_axes(matrix: &MatrixConfig, condition: &Condition, context: &str) -> Result<(), ConfigError> {
    for axis in condition.axes() {
        if matrix.axis(axis).is_none() {
            return Err(ConfigError::UnknownAxis {
                context: context.to_string(),
                axis: axis.to_string(),
            });
        }
    }
    Ok(())
}
