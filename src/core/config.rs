//! Workflow configuration from YAML

use crate::core::{
    condition::Condition,
    error::ConfigError,
    group::JobGroup,
    matrix::{Axis, MatrixConfig, MatrixRule},
};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

/// A YAML scalar (string, number or boolean) kept as a string
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Scalar(pub String);

impl Scalar {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        scalar_string(&value)
            .map(Scalar)
            .ok_or_else(|| D::Error::custom("expected a string, number or boolean"))
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name
    pub name: String,

    /// Environment applied to every step of every group
    #[serde(default)]
    pub env: BTreeMap<String, Scalar>,

    /// Default timeout for steps (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Job groups, run in declaration order
    pub groups: Vec<GroupConfig>,
}

/// One job group (e.g. "build" or "coverage")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Unique group name
    pub name: String,

    /// Axes plus the reserved `include` / `exclude` keys, in declaration order
    pub matrix: Mapping,

    /// Soft-fail policy: a boolean or a condition over axis values
    #[serde(default)]
    pub continue_on_error: Option<Value>,

    /// Stop dispatching new jobs after the first hard failure
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,

    /// Maximum number of jobs running at once
    #[serde(default)]
    pub max_parallel: Option<usize>,

    /// Environment applied to every step in this group
    #[serde(default)]
    pub env: BTreeMap<String, Scalar>,

    /// Ordered steps run by every job
    pub steps: Vec<StepConfig>,

    /// Coverage measurement and upload, for coverage groups
    #[serde(default)]
    pub coverage: Option<CoverageConfig>,
}

fn default_fail_fast() -> bool {
    true
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Step name, unique within the group
    pub name: String,

    /// Executable to run
    #[serde(default)]
    pub command: Option<String>,

    /// Arguments for `command`
    #[serde(default)]
    pub args: Vec<Scalar>,

    /// Shell script, run with `shell -c`
    #[serde(default)]
    pub run: Option<String>,

    /// Shell used for `run` (defaults to `sh`)
    #[serde(default)]
    pub shell: Option<String>,

    /// Environment overlay
    #[serde(default)]
    pub env: BTreeMap<String, Scalar>,

    /// Working directory relative to the run directory
    #[serde(default)]
    pub working_dir: Option<String>,

    /// Guard condition
    #[serde(default, rename = "if")]
    pub condition: Option<String>,

    /// Timeout for this step (overrides the workflow default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Coverage measurement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageConfig {
    /// Step that must succeed before coverage runs (defaults to the last step)
    #[serde(default)]
    pub test_step: Option<String>,

    /// Coverage tool executable
    pub command: String,

    /// Arguments for the coverage tool
    #[serde(default)]
    pub args: Vec<Scalar>,

    /// Environment overlay for the coverage tool
    #[serde(default)]
    pub env: BTreeMap<String, Scalar>,

    /// Path of the report the tool writes, relative to the run directory
    pub report: String,

    /// Where to send the report
    pub upload: UploadConfig,
}

/// Coverage upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Collector endpoint URL
    pub endpoint: String,

    /// Environment variable holding a bearer token
    #[serde(default)]
    pub token_env: Option<String>,

    /// Whether a failed upload fails the pipeline
    #[serde(default = "default_fail_on_upload_error")]
    pub fail_on_upload_error: bool,

    /// Request timeout in seconds
    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u64,

    /// Extra metadata sent with every upload
    #[serde(default)]
    pub flags: BTreeMap<String, Scalar>,
}

fn default_fail_on_upload_error() -> bool {
    true
}

fn default_upload_timeout() -> u64 {
    60
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse workflow configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the workflow configuration.
    ///
    /// Builds every group and expands its matrix, so any `ConfigError`
    /// surfaces before a job runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for group in &self.groups {
            if !seen.insert(group.name.as_str()) {
                return Err(ConfigError::DuplicateGroup(group.name.clone()));
            }
        }

        for group in self.job_groups()? {
            group.jobs()?;
        }

        Ok(())
    }

    /// Workflow-level environment as plain strings
    pub fn env_map(&self) -> BTreeMap<String, String> {
        scalar_map(&self.env)
    }

    /// Build every job group domain model
    pub fn job_groups(&self) -> Result<Vec<JobGroup>, ConfigError> {
        self.groups
            .iter()
            .map(|group| JobGroup::from_config(self, group))
            .collect()
    }

    /// Build the named job group
    pub fn job_group(&self, name: &str) -> Result<JobGroup, ConfigError> {
        let group = self
            .groups
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| ConfigError::UnknownGroup(name.to_string()))?;
        JobGroup::from_config(self, group)
    }
}

impl GroupConfig {
    /// Split the raw matrix mapping into axes and rules
    pub fn matrix_config(&self) -> Result<MatrixConfig, ConfigError> {
        let mut config = MatrixConfig::default();

        for (key, value) in &self.matrix {
            let key = scalar_string(key).ok_or_else(|| ConfigError::InvalidValue {
                key: format!("{}.matrix", self.name),
                reason: "axis names must be strings".to_string(),
            })?;

            match key.as_str() {
                "include" => config.include = self.parse_rules(&key, value)?,
                "exclude" => config.exclude = self.parse_rules(&key, value)?,
                _ => {
                    let values = self.parse_axis_values(&key, value)?;
                    config.axes.push(Axis::new(key, values));
                }
            }
        }

        Ok(config)
    }

    fn parse_axis_values(&self, axis: &str, value: &Value) -> Result<Vec<String>, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: format!("{}.matrix.{}", self.name, axis),
            reason: reason.to_string(),
        };

        match value {
            Value::Sequence(items) => items
                .iter()
                .map(|item| scalar_string(item).ok_or_else(|| invalid("axis values must be scalars")))
                .collect(),
            other => scalar_string(other)
                .map(|single| vec![single])
                .ok_or_else(|| invalid("expected a list of values")),
        }
    }

    fn parse_rules(&self, key: &str, value: &Value) -> Result<Vec<MatrixRule>, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: format!("{}.matrix.{}", self.name, key),
            reason: reason.to_string(),
        };

        let items = value
            .as_sequence()
            .ok_or_else(|| invalid("expected a list of rules"))?;

        items
            .iter()
            .map(|item| -> Result<MatrixRule, ConfigError> {
                let mapping = item
                    .as_mapping()
                    .ok_or_else(|| invalid("each rule must be a mapping of axis to value"))?;
                mapping
                    .iter()
                    .map(|(axis, value)| -> Result<(String, String), ConfigError> {
                        let axis = scalar_string(axis).ok_or_else(|| invalid("axis names must be strings"))?;
                        let value = scalar_string(value).ok_or_else(|| invalid("rule values must be scalars"))?;
                        Ok((axis, value))
                    })
                    .collect()
            })
            .collect()
    }

    /// Parse the soft-fail policy
    pub fn soft_fail_condition(&self) -> Result<Condition, ConfigError> {
        match &self.continue_on_error {
            None | Some(Value::Null) => Ok(Condition::never()),
            Some(Value::Bool(true)) => Ok(Condition::always()),
            Some(Value::Bool(false)) => Ok(Condition::never()),
            Some(Value::String(expression)) => Condition::parse(expression),
            Some(_) => Err(ConfigError::InvalidValue {
                key: format!("{}.continue_on_error", self.name),
                reason: "expected a boolean or a condition string".to_string(),
            }),
        }
    }

    /// Group-level environment as plain strings
    pub fn env_map(&self) -> BTreeMap<String, String> {
        scalar_map(&self.env)
    }
}

/// Convert a scalar map to plain strings
pub fn scalar_map(map: &BTreeMap<String, Scalar>) -> BTreeMap<String, String> {
    map.iter().map(|(k, v)| (k.clone(), v.0.clone())).collect()
}
