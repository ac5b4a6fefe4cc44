//! Process environment and queue handles shared by the commands

use anyhow::{Context, Result};
use jobq_persist::{ConfigStore, FileLogSink, SqliteBackend, SqliteJobStore};
use jobq_queue::QueueManager;
use std::path::PathBuf;
use std::sync::Arc;

/// Locations resolved from `JOBQ_HOME` / `JOBQ_DATABASE_URL`
#[derive(Debug, Clone)]
pub struct Env {
    pub home: PathBuf,
    pub database_url: String,
}

impl Env {
    pub fn from_env() -> Self {
        let home = std::env::var("JOBQ_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));
        let database_url = std::env::var("JOBQ_DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite:{}?mode=rwc", home.join("jobq.db").display()));
        Self { home, database_url }
    }

    pub fn pid_file(&self) -> PathBuf {
        self.home.join("workers.pid")
    }

    pub fn log_sink(&self) -> FileLogSink {
        FileLogSink::new(self.home.join("logs"))
    }

    /// Open the database, seed config defaults and build a manager with the
    /// stored settings.
    pub async fn open(&self) -> Result<Queue> {
        tokio::fs::create_dir_all(&self.home)
            .await
            .with_context(|| format!("Failed to create {}", self.home.display()))?;

        let backend = SqliteBackend::new(&self.database_url)
            .await
            .with_context(|| format!("Failed to open database {}", self.database_url))?;

        let config = ConfigStore::new(backend.pool().clone());
        config.seed_defaults().await.context("Failed to seed config")?;
        let settings = config.load_settings().await.context("Invalid stored config")?;

        let store = Arc::new(SqliteJobStore::new(backend.pool().clone()));
        let manager = Arc::new(QueueManager::new(store, settings));

        Ok(Queue {
            backend,
            config,
            manager,
        })
    }
}

pub struct Queue {
    pub backend: SqliteBackend,
    pub config: ConfigStore,
    pub manager: Arc<QueueManager>,
}
