//! SQLite-based run history store

use crate::core::PipelineStatus;
use crate::persistence::{InMemoryPersistence, PersistenceBackend, RunSummary};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

const COLUMNS: &str = "id, workflow, group_name, status, started_at, completed_at, \
                       total, succeeded, failed, tolerated, cancelled";

/// SQLite run store
pub struct SqliteRunStore {
    pool: SqlitePool,
}

impl SqliteRunStore {
    /// Open (creating if needed) the database at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(dir) = db_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("Failed to open run history at {}", db_path.display()))?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Default database location under the user's local data directory
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("matrix-pipeline")
            .join("runs.db")
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        Self::new(&Self::default_path()).await
    }

    /// Open the store at `db_path`, keeping history in memory if that fails.
    ///
    /// A run never fails because its history can't be recorded.
    pub async fn open_or_in_memory(db_path: &Path) -> Arc<dyn PersistenceBackend> {
        match Self::new(db_path).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!("Run history unavailable, keeping it in memory: {:#}", e);
                Arc::new(InMemoryPersistence::new())
            }
        }
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                workflow TEXT NOT NULL,
                group_name TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT NOT NULL,
                total INTEGER NOT NULL DEFAULT 0,
                succeeded INTEGER NOT NULL DEFAULT 0,
                failed INTEGER NOT NULL DEFAULT 0,
                tolerated INTEGER NOT NULL DEFAULT 0,
                cancelled INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_runs_workflow ON runs(workflow);
            CREATE INDEX IF NOT EXISTS idx_runs_started_at ON runs(started_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn status_str(status: PipelineStatus) -> &'static str {
        match status {
            PipelineStatus::Success => "success",
            PipelineStatus::Failed => "failed",
        }
    }

    fn from_row(row: &SqliteRow) -> Result<RunSummary> {
        let status = match row.get::<String, _>("status").as_str() {
            "success" => PipelineStatus::Success,
            _ => PipelineStatus::Failed,
        };
        Ok(RunSummary {
            run_id: Uuid::parse_str(&row.get::<String, _>("id"))?,
            workflow: row.get("workflow"),
            group: row.get("group_name"),
            status,
            started_at: Self::from_naive(row.get("started_at")),
            completed_at: Self::from_naive(row.get("completed_at")),
            total: row.get::<i64, _>("total") as usize,
            succeeded: row.get::<i64, _>("succeeded") as usize,
            failed: row.get::<i64, _>("failed") as usize,
            tolerated: row.get::<i64, _>("tolerated") as usize,
            cancelled: row.get::<i64, _>("cancelled") as usize,
        })
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for SqliteRunStore {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO runs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            COLUMNS
        ))
        .bind(run.run_id.to_string())
        .bind(&run.workflow)
        .bind(&run.group)
        .bind(Self::status_str(run.status))
        .bind(Self::to_naive(run.started_at))
        .bind(Self::to_naive(run.completed_at))
        .bind(run.total as i64)
        .bind(run.succeeded as i64)
        .bind(run.failed as i64)
        .bind(run.tolerated as i64)
        .bind(run.cancelled as i64)
        .execute(&self.pool)
        .await
        .context("Failed to save run")?;

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        let row = sqlx::query(&format!("SELECT {} FROM runs WHERE id = ?1", COLUMNS))
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load run")?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn list_runs(&self, workflow: Option<&str>, limit: usize) -> Result<Vec<RunSummary>> {
        let rows = match workflow {
            Some(workflow) => {
                sqlx::query(&format!(
                    "SELECT {} FROM runs WHERE workflow = ?1 ORDER BY started_at DESC LIMIT ?2",
                    COLUMNS
                ))
                .bind(workflow)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM runs ORDER BY started_at DESC LIMIT ?1",
                    COLUMNS
                ))
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to list runs")?;

        rows.iter().map(Self::from_row).collect()
    }
}
