//! In-memory job store (tests, single-process embedding)

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::QueueError;
use crate::job::{Job, JobId, JobState, JobUpdate};
use crate::store::{empty_counts, JobStore, QueueMetrics, StateCounts};

/// Claim order: priority desc, then created_at asc, then id asc.
pub fn claim_order(a: &Job, b: &Job) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Listing order: priority desc, then newest first.
pub fn list_order(a: &Job, b: &Job) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// The whole table sits behind one mutex, which makes every operation,
/// including the claim, a single critical section.
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert(&self, job: Job) -> Result<JobId, QueueError> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&job.id) {
            return Err(QueueError::AlreadyExists(job.id));
        }
        let id = job.id.clone();
        jobs.insert(id.clone(), job);
        Ok(id)
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Job>, QueueError> {
        let mut jobs = self.jobs.lock().await;

        let best = jobs
            .values()
            .filter(|job| job.is_eligible(now))
            .min_by(|a, b| claim_order(a, b))
            .map(|job| job.id.clone());

        let Some(id) = best else {
            return Ok(None);
        };
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(None);
        };

        job.state = JobState::Processing;
        job.attempts += 1;
        job.updated_at = now;
        job.started_at = Some(now);
        Ok(Some(job.clone()))
    }

    async fn update(&self, id: &str, update: JobUpdate) -> Result<Job, QueueError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        if let Some(expected) = update.expect {
            if job.state != expected {
                return Err(QueueError::InvalidState {
                    id: id.to_string(),
                    expected,
                    actual: job.state,
                });
            }
        }

        update.apply_to(job);
        Ok(job.clone())
    }

    async fn get(&self, id: &str) -> Result<Job, QueueError> {
        let jobs = self.jobs.lock().await;
        jobs.get(id)
            .cloned()
            .ok_or_else(|| QueueError::NotFound(id.to_string()))
    }

    async fn list(&self, state: Option<JobState>) -> Result<Vec<Job>, QueueError> {
        let jobs = self.jobs.lock().await;
        let mut out: Vec<Job> = jobs
            .values()
            .filter(|job| state.map_or(true, |s| job.state == s))
            .cloned()
            .collect();
        out.sort_by(list_order);
        Ok(out)
    }

    async fn count_by_state(&self) -> Result<StateCounts, QueueError> {
        let jobs = self.jobs.lock().await;
        let mut counts = empty_counts();
        for job in jobs.values() {
            *counts.entry(job.state).or_default() += 1;
        }
        Ok(counts)
    }

    async fn metrics(&self, now: DateTime<Utc>) -> Result<QueueMetrics, QueueError> {
        let jobs = self.jobs.lock().await;
        let day_ago = now - Duration::days(1);

        let mut metrics = QueueMetrics::default();
        let mut timed = 0u64;
        let mut time_sum = 0f64;

        for job in jobs.values() {
            metrics.total += 1;
            if job.state == JobState::Completed {
                metrics.completed += 1;
            }
            if let Some(ms) = job.execution_time_ms {
                timed += 1;
                time_sum += ms as f64;
            }
            if job.created_at > day_ago {
                metrics.jobs_last_24h += 1;
            }
            *metrics
                .priority_distribution
                .entry(job.priority)
                .or_default() += 1;
        }

        if metrics.total > 0 {
            metrics.success_rate = metrics.completed as f64 / metrics.total as f64 * 100.0;
        }
        if timed > 0 {
            metrics.avg_execution_ms = Some(time_sum / timed as f64);
        }
        Ok(metrics)
    }

    async fn stale_processing(&self, cutoff: DateTime<Utc>) -> Result<Vec<JobId>, QueueError> {
        let jobs = self.jobs.lock().await;
        let mut stale: Vec<&Job> = jobs
            .values()
            .filter(|job| job.state == JobState::Processing && job.updated_at < cutoff)
            .collect();
        stale.sort_by_key(|job| job.updated_at);
        Ok(stale.into_iter().map(|job| job.id.clone()).collect())
    }
}
