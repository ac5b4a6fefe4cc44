//! Write-only destination for job stdout/stderr

use async_trait::async_trait;

use crate::executor::Execution;

#[async_trait]
pub trait LogSink: Send + Sync {
    async fn write(&self, job_id: &str, execution: &Execution) -> std::io::Result<()>;
}

/// Discards job output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogSink;

#[async_trait]
impl LogSink for NullLogSink {
    async fn write(&self, _job_id: &str, _execution: &Execution) -> std::io::Result<()> {
        Ok(())
    }
}
