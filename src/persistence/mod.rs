//! Persistence layer for run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

use crate::core::{PipelineResult, PipelineStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of one job group run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Workflow name
    pub workflow: String,

    /// Job group name
    pub group: String,

    /// Aggregate status
    pub status: PipelineStatus,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Number of jobs the matrix expanded to
    pub total: usize,

    pub succeeded: usize,
    pub failed: usize,
    pub tolerated: usize,
    pub cancelled: usize,
}

impl RunSummary {
    /// Create a summary from a group run
    pub fn from_result(workflow: &str, result: &PipelineResult) -> Self {
        Self {
            run_id: result.run_id,
            workflow: workflow.to_string(),
            group: result.group.clone(),
            status: result.status,
            started_at: result.started_at,
            completed_at: result.completed_at,
            total: result.jobs.len(),
            succeeded: result.succeeded(),
            failed: result.failed(),
            tolerated: result.tolerated(),
            cancelled: result.cancelled(),
        }
    }
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run summary
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List the most recent runs, newest first, optionally for one workflow
    async fn list_runs(&self, workflow: Option<&str>, limit: usize) -> Result<Vec<RunSummary>>;
}

/// In-memory persistence (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemoryPersistence {
    runs: RwLock<HashMap<Uuid, RunSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        self.runs.write().await.insert(run.run_id, run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }

    async fn list_runs(&self, workflow: Option<&str>, limit: usize) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut result: Vec<RunSummary> = runs
            .values()
            .filter(|run| workflow.map_or(true, |w| run.workflow == w))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        result.truncate(limit);
        Ok(result)
    }
}
