//! Application State

use jobq_queue::QueueManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    manager: Arc<QueueManager>,
}

impl AppState {
    pub fn new(manager: Arc<QueueManager>) -> Self {
        Self { manager }
    }

    /// Queue manager (read operations only are exposed over HTTP)
    pub fn manager(&self) -> &QueueManager {
        &self.manager
    }
}
