//! # jobq queue
//!
//! Local background job queue core.
//!
//! Features:
//! - Job state machine (`pending -> processing -> completed | failed | dead`)
//! - Pluggable `JobStore` (in-memory here, SQLite in `jobq-persist`)
//! - Atomic claim: a job is never handed to two workers at once
//! - Retry with exponential backoff and a dead letter queue
//! - Process workers running shell commands under a timeout

pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod job;
pub mod manager;
pub mod memory;
pub mod retry;
pub mod sink;
pub mod store;
pub mod worker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::QueueSettings;
pub use error::QueueError;
pub use executor::{CommandExecutor, Execution, ExecutionOutcome};
pub use job::{Job, JobId, JobState, JobUpdate, NewJob};
pub use manager::{Completion, QueueManager, ABANDONED_MESSAGE};
pub use memory::MemoryStore;
pub use retry::{BackoffStrategy, RetryDecision, RetryPolicy};
pub use sink::{LogSink, NullLogSink};
pub use store::{JobStore, QueueMetrics, StateCounts};
pub use worker::{Worker, WorkerConfig};
