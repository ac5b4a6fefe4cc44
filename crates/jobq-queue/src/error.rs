//! Queue error taxonomy

use crate::job::{JobId, JobState};

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Bad enqueue arguments or settings; nothing was written
    #[error("Validation error: {0}")]
    Validation(String),
    /// Persistence unavailable; no job state changed
    #[error("Store error: {0}")]
    Store(String),
    #[error("Job not found: {0}")]
    NotFound(JobId),
    #[error("Job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("Job {id} is {actual}, expected {expected}")]
    InvalidState {
        id: JobId,
        expected: JobState,
        actual: JobState,
    },
}

impl QueueError {
    pub fn store(e: impl std::fmt::Display) -> Self {
        QueueError::Store(e.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, QueueError::NotFound(_))
    }
}
