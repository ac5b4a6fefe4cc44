//! Queue Manager: enqueue, claim, complete, fail and DLQ transitions.
//!
//! All state-machine rules live here. Workers only report outcomes; whether
//! a failure retries or dies is decided by [`QueueManager::fail`].

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::QueueSettings;
use crate::error::QueueError;
use crate::job::{output_preview, Job, JobId, JobState, JobUpdate, NewJob};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::store::{JobStore, QueueMetrics, StateCounts};

/// Message recorded when an operator recovers a job orphaned by a dead worker.
pub const ABANDONED_MESSAGE: &str = "abandoned: worker did not report an outcome";

/// Successful run details recorded by [`QueueManager::complete_with`].
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub stdout: String,
    pub elapsed: Duration,
}

pub struct QueueManager {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    settings: QueueSettings,
}

impl QueueManager {
    pub fn new(store: Arc<dyn JobStore>, settings: QueueSettings) -> Self {
        Self::with_clock(store, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn JobStore>,
        settings: QueueSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            policy: settings.retry_policy(),
            settings,
        }
    }

    /// Override the retry policy derived from the settings.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Validate and persist a new `pending` job.
    pub async fn enqueue(&self, new_job: NewJob) -> Result<JobId, QueueError> {
        let command = new_job.command.trim();
        if command.is_empty() {
            return Err(QueueError::Validation("command must not be empty".into()));
        }

        let max_retries = match new_job.max_retries {
            Some(n) => u32::try_from(n).map_err(|_| {
                QueueError::Validation(format!("max_retries must be >= 0, got {}", n))
            })?,
            None => self.settings.max_retries,
        };

        let timeout_secs = match new_job.timeout_secs {
            Some(secs) if i64::try_from(secs).is_err() => {
                return Err(QueueError::Validation(format!(
                    "timeout must be at most {} seconds, got {}",
                    i64::MAX,
                    secs
                )))
            }
            Some(0) => None,
            Some(secs) => Some(secs),
            None => self.settings.job_timeout.map(|t| t.as_secs().max(1)),
        };

        let id = match new_job.id {
            Some(id) if id.trim().is_empty() => {
                return Err(QueueError::Validation("job id must not be blank".into()))
            }
            Some(id) => id.trim().to_string(),
            None => Uuid::new_v4().to_string(),
        };

        let now = self.clock.now();
        let job = Job {
            id,
            command: command.to_string(),
            state: JobState::Pending,
            attempts: 0,
            max_retries,
            priority: new_job.priority,
            timeout_secs,
            created_at: now,
            updated_at: now,
            run_at: new_job.run_at.unwrap_or(now),
            error_message: None,
            output: None,
            started_at: None,
            completed_at: None,
            execution_time_ms: None,
        };

        let id = self.store.insert(job).await?;
        info!(job_id = %id, priority = new_job.priority, "Job enqueued");
        Ok(id)
    }

    /// Hand the best eligible job to the caller. Never returns the same job
    /// to two callers while it is `processing`.
    pub async fn claim(&self, now: DateTime<Utc>) -> Result<Option<Job>, QueueError> {
        let job = self.store.claim_next(now).await?;
        if let Some(job) = &job {
            debug!(job_id = %job.id, attempt = job.attempts, "Job claimed");
        }
        Ok(job)
    }

    /// `processing -> completed`
    pub async fn complete(&self, id: &str) -> Result<Job, QueueError> {
        let now = self.clock.now();
        self.finish(id, JobUpdate::new(now).output(None), now).await
    }

    /// `processing -> completed`, keeping an output preview and run time.
    pub async fn complete_with(&self, id: &str, completion: Completion) -> Result<Job, QueueError> {
        let now = self.clock.now();
        let update = JobUpdate::new(now)
            .output(output_preview(&completion.stdout))
            .execution_time_ms(Some(completion.elapsed.as_millis() as u64));
        self.finish(id, update, now).await
    }

    async fn finish(
        &self,
        id: &str,
        update: JobUpdate,
        now: DateTime<Utc>,
    ) -> Result<Job, QueueError> {
        let update = update
            .expect(JobState::Processing)
            .state(JobState::Completed)
            .error_message(None)
            .completed_at(Some(now));
        let job = self.store.update(id, update).await?;
        info!(job_id = %id, attempts = job.attempts, "Job completed");
        Ok(job)
    }

    /// Record a failed attempt. Retries with backoff while attempts remain,
    /// otherwise moves the job to the dead letter queue.
    pub async fn fail(
        &self,
        id: &str,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> Result<Job, QueueError> {
        let current = self.store.get(id).await?;
        if current.state != JobState::Processing {
            return Err(QueueError::InvalidState {
                id: id.to_string(),
                expected: JobState::Processing,
                actual: current.state,
            });
        }

        let update = JobUpdate::new(now)
            .expect(JobState::Processing)
            .error_message(Some(error_message.to_string()));

        let update = match self.policy.decide(current.attempts, current.max_retries) {
            RetryDecision::Retry { delay } => {
                info!(
                    job_id = %id,
                    attempt = current.attempts,
                    delay_secs = delay.as_secs(),
                    "Job failed, scheduling retry with backoff"
                );
                update
                    .state(JobState::Failed)
                    .run_at(RetryPolicy::next_run_at(now, delay))
            }
            RetryDecision::Dead => {
                warn!(
                    job_id = %id,
                    attempts = current.attempts,
                    error = %error_message,
                    "Job exhausted retries, moved to dead letter queue"
                );
                update.state(JobState::Dead).completed_at(Some(now))
            }
        };

        self.store.update(id, update).await
    }

    /// Move a `dead` job back to `pending` with a fresh attempt budget.
    pub async fn dlq_retry(&self, id: &str) -> Result<Job, QueueError> {
        let now = self.clock.now();
        let update = JobUpdate::new(now)
            .expect(JobState::Dead)
            .state(JobState::Pending)
            .attempts(0)
            .run_at(now)
            .error_message(None)
            .completed_at(None);
        let job = self.store.update(id, update).await?;
        info!(job_id = %id, "Job requeued from dead letter queue");
        Ok(job)
    }

    /// Operator recovery for a job stuck in `processing` after its worker
    /// died. Counts as a failed attempt, so the retry cap still applies.
    pub async fn reset(&self, id: &str, now: DateTime<Utc>) -> Result<Job, QueueError> {
        warn!(job_id = %id, "Resetting orphaned processing job");
        self.fail(id, ABANDONED_MESSAGE, now).await
    }

    /// Reset every `processing` job untouched for longer than `older_than`.
    pub async fn recover_stale(
        &self,
        older_than: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>, QueueError> {
        let age = chrono::Duration::from_std(older_than)
            .map_err(|e| QueueError::Validation(format!("invalid age: {}", e)))?;
        let cutoff = now
            .checked_sub_signed(age)
            .ok_or_else(|| QueueError::Validation(format!("age {:?} is out of range", older_than)))?;

        let mut recovered = Vec::new();
        for id in self.store.stale_processing(cutoff).await? {
            match self.reset(&id, now).await {
                Ok(job) => recovered.push(job),
                // Its worker reported in the meantime
                Err(QueueError::InvalidState { .. }) | Err(QueueError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(recovered)
    }

    pub async fn get(&self, id: &str) -> Result<Job, QueueError> {
        self.store.get(id).await
    }

    pub async fn list(&self, state: Option<JobState>) -> Result<Vec<Job>, QueueError> {
        self.store.list(state).await
    }

    pub async fn list_dlq(&self) -> Result<Vec<Job>, QueueError> {
        self.store.list(Some(JobState::Dead)).await
    }

    pub async fn stats(&self) -> Result<StateCounts, QueueError> {
        self.store.count_by_state().await
    }

    pub async fn metrics(&self) -> Result<QueueMetrics, QueueError> {
        self.store.metrics(self.clock.now()).await
    }
}
