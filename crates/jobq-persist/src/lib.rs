//! # jobq persistence
//!
//! SQLite storage for the job queue.
//!
//! - `SqliteJobStore`: durable `JobStore` shared by every worker process
//! - `ConfigStore`: queue tunables in the `config` table
//! - `FileLogSink`: per-job stdout/stderr log files

pub mod config_store;
pub mod error;
pub mod log_sink;
pub mod queue;
pub mod sqlite;

pub use config_store::ConfigStore;
pub use error::StorageError;
pub use log_sink::FileLogSink;
pub use queue::SqliteJobStore;
pub use sqlite::{SqliteBackend, SqliteConfig};
