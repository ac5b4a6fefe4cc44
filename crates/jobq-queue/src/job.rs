//! Job definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::QueueError;

/// Job Identifier
pub type JobId = String;

/// Maximum number of stdout characters kept on a completed job.
pub const OUTPUT_PREVIEW_CHARS: usize = 500;

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting for `run_at`, then claimable
    Pending,
    /// Claimed by exactly one worker
    Processing,
    /// Finished with exit code 0
    Completed,
    /// Last attempt failed; claimable again once the backoff elapses
    Failed,
    /// Retries exhausted, parked in the dead letter queue
    Dead,
}

impl JobState {
    pub const ALL: [JobState; 5] = [
        JobState::Pending,
        JobState::Processing,
        JobState::Completed,
        JobState::Failed,
        JobState::Dead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Dead => "dead",
        }
    }

    /// `completed` and `dead` only leave through an explicit DLQ requeue.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Dead)
    }

    /// States a claim may pick up once `run_at` has passed.
    pub fn is_claimable(&self) -> bool {
        matches!(self, JobState::Pending | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(JobState::Pending),
            "processing" => Ok(JobState::Processing),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "dead" => Ok(JobState::Dead),
            other => Err(QueueError::Validation(format!("unknown job state '{}'", other))),
        }
    }
}

/// A persisted job record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub command: String,
    pub state: JobState,
    pub attempts: u32,
    pub max_retries: u32,
    pub priority: i32,
    pub timeout_secs: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Earliest time the job may be claimed (schedule or retry backoff)
    pub run_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub output: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub execution_time_ms: Option<u64>,
}

impl Job {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.state.is_claimable() && self.run_at <= now
    }
}

/// Caller-supplied description of a job to enqueue.
///
/// Also accepted as JSON, e.g. `{"command": "echo hi", "priority": 5}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewJob {
    #[serde(default)]
    pub id: Option<JobId>,
    pub command: String,
    #[serde(default)]
    pub priority: i32,
    /// Falls back to the configured default when absent
    #[serde(default)]
    pub max_retries: Option<i64>,
    /// Falls back to the configured default when absent; `0` disables the timeout
    #[serde(default, alias = "timeout")]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub run_at: Option<DateTime<Utc>>,
}

impl NewJob {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<JobId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: i64) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn with_run_at(mut self, run_at: DateTime<Utc>) -> Self {
        self.run_at = Some(run_at);
        self
    }
}

/// Partial update applied by [`crate::store::JobStore::update`].
///
/// `expect` turns the update into a compare-and-swap on the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub expect: Option<JobState>,
    pub updated_at: DateTime<Utc>,
    pub state: Option<JobState>,
    pub attempts: Option<u32>,
    pub run_at: Option<DateTime<Utc>>,
    pub error_message: Option<Option<String>>,
    pub output: Option<Option<String>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub execution_time_ms: Option<Option<u64>>,
}

impl JobUpdate {
    pub fn new(updated_at: DateTime<Utc>) -> Self {
        Self {
            expect: None,
            updated_at,
            state: None,
            attempts: None,
            run_at: None,
            error_message: None,
            output: None,
            completed_at: None,
            execution_time_ms: None,
        }
    }

    pub fn expect(mut self, state: JobState) -> Self {
        self.expect = Some(state);
        self
    }

    pub fn state(mut self, state: JobState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn run_at(mut self, run_at: DateTime<Utc>) -> Self {
        self.run_at = Some(run_at);
        self
    }

    pub fn error_message(mut self, message: Option<String>) -> Self {
        self.error_message = Some(message);
        self
    }

    pub fn output(mut self, output: Option<String>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn completed_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn execution_time_ms(mut self, ms: Option<u64>) -> Self {
        self.execution_time_ms = Some(ms);
        self
    }

    /// Apply this update to an in-memory record.
    pub fn apply_to(&self, job: &mut Job) {
        job.updated_at = self.updated_at;
        if let Some(state) = self.state {
            job.state = state;
        }
        if let Some(attempts) = self.attempts {
            job.attempts = attempts;
        }
        if let Some(run_at) = self.run_at {
            job.run_at = run_at;
        }
        if let Some(message) = &self.error_message {
            job.error_message = message.clone();
        }
        if let Some(output) = &self.output {
            job.output = output.clone();
        }
        if let Some(at) = self.completed_at {
            job.completed_at = at;
        }
        if let Some(ms) = self.execution_time_ms {
            job.execution_time_ms = ms;
        }
    }
}

/// Truncate command output to the stored preview length.
pub fn output_preview(stdout: &str) -> Option<String> {
    let trimmed = stdout.trim_end();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(OUTPUT_PREVIEW_CHARS).collect())
}
