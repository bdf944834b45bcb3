//! Build matrix model and expansion

use crate::core::condition::Condition;
use crate::core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// One dimension of the build matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    pub values: Vec<String>,
}

impl Axis {
    pub fn new<S: Into<String>>(name: S, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Names bound by templates and upload metadata; axes may not shadow them
pub const RESERVED_AXES: &[&str] = &["group", "job"];

/// A partial assignment of axis values, used by include and exclude rules
pub type MatrixRule = BTreeMap<String, String>;

/// Axes plus include/exclude rules for one job group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixConfig {
    pub axes: Vec<Axis>,
    #[serde(default)]
    pub include: Vec<MatrixRule>,
    #[serde(default)]
    pub exclude: Vec<MatrixRule>,
}

impl MatrixConfig {
    pub fn new(axes: Vec<Axis>) -> Self {
        Self {
            axes,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    pub fn with_include(mut self, rule: MatrixRule) -> Self {
        self.include.push(rule);
        self
    }

    pub fn with_exclude(mut self, rule: MatrixRule) -> Self {
        self.exclude.push(rule);
        self
    }

    /// Look up an axis by name
    pub fn axis(&self, name: &str) -> Option<&Axis> {
        self.axes.iter().find(|a| a.name == name)
    }

    /// Check axis and rule invariants
    pub fn validate(&self, group: &str) -> Result<(), ConfigError> {
        if self.axes.is_empty() {
            return Err(ConfigError::NoAxes {
                group: group.to_string(),
            });
        }

        let mut seen = HashSet::new();
        for axis in &self.axes {
            if !seen.insert(axis.name.as_str()) {
                return Err(ConfigError::DuplicateAxis {
                    axis: axis.name.clone(),
                });
            }
            if RESERVED_AXES.contains(&axis.name.as_str()) {
                return Err(ConfigError::ReservedAxis {
                    axis: axis.name.clone(),
                });
            }
            if axis.values.is_empty() {
                return Err(ConfigError::EmptyAxis {
                    axis: axis.name.clone(),
                });
            }
            let mut values = HashSet::new();
            for value in &axis.values {
                if !values.insert(value.as_str()) {
                    return Err(ConfigError::DuplicateValue {
                        axis: axis.name.clone(),
                        value: value.clone(),
                    });
                }
            }
        }

        for (index, rule) in self.exclude.iter().enumerate() {
            for axis in rule.keys() {
                if !seen.contains(axis.as_str()) {
                    return Err(ConfigError::UnknownAxis {
                        context: format!("exclude rule #{}", index),
                        axis: axis.clone(),
                    });
                }
            }
        }

        for (index, rule) in self.include.iter().enumerate() {
            for axis in rule.keys() {
                if !seen.contains(axis.as_str()) {
                    return Err(ConfigError::UnknownAxis {
                        context: format!("include rule #{}", index),
                        axis: axis.clone(),
                    });
                }
            }
            for axis in &self.axes {
                if !rule.contains_key(&axis.name) {
                    return Err(ConfigError::IncompleteInclude {
                        index,
                        axis: axis.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// One concrete combination of axis values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Job group this job belongs to
    pub group: String,

    /// Position in emission order
    pub index: usize,

    /// Axis assignments in axis declaration order
    pub values: Vec<(String, String)>,

    /// Failure of this job is tolerated by the pipeline
    pub soft_fail: bool,
}

impl JobSpec {
    pub fn new<S: Into<String>>(group: S, index: usize, values: Vec<(String, String)>) -> Self {
        Self {
            group: group.into(),
            index,
            values,
            soft_fail: false,
        }
    }

    /// Value assigned to an axis
    pub fn value(&self, axis: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == axis)
            .map(|(_, value)| value.as_str())
    }

    /// Display name, e.g. `build (stable, linux)`
    pub fn name(&self) -> String {
        let values: Vec<&str> = self.values.iter().map(|(_, v)| v.as_str()).collect();
        format!("{} ({})", self.group, values.join(", "))
    }

    /// Whether every axis in `rule` carries the rule's value
    pub fn matches(&self, rule: &MatrixRule) -> bool {
        rule.iter()
            .all(|(axis, value)| self.value(axis) == Some(value.as_str()))
    }

}

impl fmt::Display for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Expands a [`MatrixConfig`] into concrete [`JobSpec`]s
pub struct MatrixExpander;

impl MatrixExpander {
    /// Expand the matrix for `group`.
    ///
    /// Output order is the cross-product, outer-to-inner in axis declaration
    /// order, followed by forced includes in rule order. Exclude rules apply
    /// to both. `soft_fail` is evaluated once per job.
    pub fn expand(
        group: &str,
        config: &MatrixConfig,
        soft_fail: &Condition,
    ) -> Result<Vec<JobSpec>, ConfigError> {
        config.validate(group)?;

        for axis in soft_fail.axes() {
            if config.axis(axis).is_none() {
                return Err(ConfigError::UnknownAxis {
                    context: format!("continue_on_error of group '{}'", group),
                    axis: axis.to_string(),
                });
            }
        }

        let mut assignments: Vec<Vec<(String, String)>> = vec![Vec::new()];
        for axis in &config.axes {
            let mut next = Vec::with_capacity(assignments.len() * axis.values.len());
            for partial in &assignments {
                for value in &axis.values {
                    let mut assignment = partial.clone();
                    assignment.push((axis.name.clone(), value.clone()));
                    next.push(assignment);
                }
            }
            assignments = next;
        }

        for rule in &config.include {
            let values: Vec<(String, String)> = config
                .axes
                .iter()
                .filter_map(|axis| {
                    rule.get(&axis.name)
                        .map(|value| (axis.name.clone(), value.clone()))
                })
                .collect();

            if !assignments.contains(&values) {
                assignments.push(values);
            }
        }

        let mut jobs: Vec<JobSpec> = assignments
            .into_iter()
            .map(|values| JobSpec::new(group, 0, values))
            .filter(|job| !config.exclude.iter().any(|rule| job.matches(rule)))
            .collect();

        for (index, job) in jobs.iter_mut().enumerate() {
            job.index = index;
            job.soft_fail = soft_fail.evaluate(job);
        }

        Ok(jobs)
    }
}
