//! Step domain model

use crate::core::{
    condition::Condition,
    config::{scalar_map, StepConfig},
    error::ConfigError,
    matrix::JobSpec,
};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A single step in a job
#[derive(Debug, Clone)]
pub struct Step {
    /// Step name, unique within its group
    pub name: String,

    /// Executable to run
    pub command: String,

    /// Argument templates
    pub args: Vec<String>,

    /// Environment overlay (templates)
    pub env: BTreeMap<String, String>,

    /// Working directory (template), relative to the run directory
    pub working_dir: Option<String>,

    /// Guard; the step is skipped when it does not hold
    pub guard: Option<Condition>,

    /// Timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// A step with all placeholders substituted for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedStep {
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

impl Step {
    /// Create a step that runs `command` with `args`
    pub fn new<S: Into<String>>(name: S, command: S, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
            env: BTreeMap::new(),
            working_dir: None,
            guard: None,
            timeout_secs: None,
        }
    }

    pub fn with_guard(mut self, guard: Condition) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Create a step from a step config.
    ///
    /// `inherited_env` is the workflow and group env, overridden by the
    /// step's own entries.
    pub fn from_config(
        group: &str,
        config: &StepConfig,
        inherited_env: &BTreeMap<String, String>,
        default_timeout_secs: Option<u64>,
    ) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidStep {
            group: group.to_string(),
            step: config.name.clone(),
            reason: reason.to_string(),
        };

        let (command, args) = match (&config.command, &config.run) {
            (Some(_), Some(_)) => return Err(invalid("'command' and 'run' are mutually exclusive")),
            (None, None) => return Err(invalid("one of 'command' or 'run' is required")),
            (Some(command), None) => {
                if command.trim().is_empty() {
                    return Err(invalid("'command' is empty"));
                }
                (
                    command.clone(),
                    config.args.iter().map(|arg| arg.to_string()).collect(),
                )
            }
            (None, Some(script)) => {
                if !config.args.is_empty() {
                    return Err(invalid("'args' cannot be combined with 'run'"));
                }
                (
                    config.shell.clone().unwrap_or_else(|| "sh".to_string()),
                    vec!["-c".to_string(), script.clone()],
                )
            }
        };

        let guard = config.condition.as_deref().map(Condition::parse).transpose()?;

        let mut env = inherited_env.clone();
        env.extend(scalar_map(&config.env));

        Ok(Step {
            name: config.name.clone(),
            command,
            args,
            env,
            working_dir: config.working_dir.clone(),
            guard,
            timeout_secs: config.timeout_secs.or(default_timeout_secs),
        })
    }

    /// Whether the step's guard holds for `spec`
    pub fn should_run(&self, spec: &JobSpec) -> bool {
        self.guard.as_ref().map_or(true, |guard| guard.evaluate(spec))
    }

    /// Substitute `{{ matrix.<axis> }}`, `{{ <axis> }}` and `{{ group }}`
    pub fn render(&self, spec: &JobSpec) -> RenderedStep {
        let variables = template_variables(spec);
        RenderedStep {
            command: render_template(&self.command, &variables),
            args: self
                .args
                .iter()
                .map(|arg| render_template(arg, &variables))
                .collect(),
            env: self
                .env
                .iter()
                .map(|(k, v)| (k.clone(), render_template(v, &variables)))
                .collect(),
            working_dir: self
                .working_dir
                .as_ref()
                .map(|dir| PathBuf::from(render_template(dir, &variables))),
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Template variables for a job: `group`, `matrix.<axis>` and `<axis>`
pub fn template_variables(spec: &JobSpec) -> Vec<(String, String)> {
    let mut variables = vec![("group".to_string(), spec.group.clone())];
    for (axis, value) in &spec.values {
        variables.push((format!("matrix.{}", axis), value.clone()));
        variables.push((axis.clone(), value.clone()));
    }
    variables
}

/// Replace placeholders of the form `{{ name }}`
pub fn render_template(template: &str, variables: &[(String, String)]) -> String {
    let mut rendered = template.to_string();
    for (key, value) in variables {
        let placeholder = format!("{{{{ {} }}}}", key);
        rendered = rendered.replace(&placeholder, value);
    }
    rendered
}
