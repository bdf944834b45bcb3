//! Command executor - runs one external process and captures its output

use crate::core::{ExecutionError, RenderedStep};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Exit status and captured streams of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a command to completion.
    ///
    /// A non-zero exit is returned as data; `ExecutionError` means the
    /// process could not be launched or timed out.
    async fn run(&self, command: &RenderedStep) -> Result<CommandOutput, ExecutionError>;
}

/// Runs commands as child processes
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    /// Directory commands run in; relative working directories resolve against it
    base_dir: PathBuf,
}

impl ProcessExecutor {
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &std::path::Path {
        &self.base_dir
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn run(&self, step: &RenderedStep) -> Result<CommandOutput, ExecutionError> {
        let working_dir = match &step.working_dir {
            Some(dir) => self.base_dir.join(dir),
            None => self.base_dir.clone(),
        };

        debug!(
            command = %step.command,
            args = ?step.args,
            dir = %working_dir.display(),
            "Spawning process"
        );

        let mut command = Command::new(&step.command);
        command
            .args(&step.args)
            .envs(&step.env)
            .current_dir(&working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match step.timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), command.output())
                .await
                .map_err(|_| {
                    warn!("'{}' timed out after {}s", step.command, secs);
                    ExecutionError::Timeout {
                        command: step.command.clone(),
                        secs,
                    }
                })?,
            None => command.output().await,
        };

        let output = output.map_err(|source| ExecutionError::Launch {
            command: step.command.clone(),
            source,
        })?;

        // Killed by a signal: no exit code
        let exit_code = output.status.code().unwrap_or(-1);
        debug!("'{}' exited with code {}", step.command, exit_code);

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
