//! Job Store trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::QueueError;
use crate::job::{Job, JobId, JobState, JobUpdate};

/// Number of jobs per state. Always contains all five states.
pub type StateCounts = BTreeMap<JobState, u64>;

pub fn empty_counts() -> StateCounts {
    JobState::ALL.iter().map(|s| (*s, 0)).collect()
}

/// Execution metrics aggregated over the whole table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueMetrics {
    pub total: u64,
    pub completed: u64,
    /// Percentage of all jobs that completed (0-100)
    pub success_rate: f64,
    pub avg_execution_ms: Option<f64>,
    pub jobs_last_24h: u64,
    pub priority_distribution: BTreeMap<i32, u64>,
}

/// Durable job table.
///
/// `claim_next` is the sole synchronisation point between workers: an
/// implementation must select and transition the row in one critical section
/// so that two concurrent callers never receive the same job.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job. Fails with `AlreadyExists` on an id collision.
    async fn insert(&self, job: Job) -> Result<JobId, QueueError>;

    /// Claim the best eligible job: claimable state and `run_at <= now`,
    /// ordered by priority desc, created_at asc, id asc. The returned record
    /// is already `processing` with `attempts` incremented.
    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Job>, QueueError>;

    /// Apply a partial update, returning the record after the update.
    async fn update(&self, id: &str, update: JobUpdate) -> Result<Job, QueueError>;

    async fn get(&self, id: &str) -> Result<Job, QueueError>;

    /// Jobs in `state` (or all), highest priority first, newest first within a priority.
    async fn list(&self, state: Option<JobState>) -> Result<Vec<Job>, QueueError>;

    async fn count_by_state(&self) -> Result<StateCounts, QueueError>;

    async fn metrics(&self, now: DateTime<Utc>) -> Result<QueueMetrics, QueueError>;

    /// Ids of `processing` jobs not touched since `cutoff`.
    async fn stale_processing(&self, cutoff: DateTime<Utc>) -> Result<Vec<JobId>, QueueError>;
}
