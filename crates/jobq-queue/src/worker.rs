//! Worker loop: claim, execute, report

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::QueueSettings;
use crate::error::QueueError;
use crate::executor::{CommandExecutor, Execution};
use crate::job::{Job, JobState};
use crate::manager::{Completion, QueueManager};
use crate::sink::{LogSink, NullLogSink};

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// Sleep between empty polls
    pub poll_interval: Duration,
    /// Sleep after the store fails to answer a claim
    pub error_backoff: Duration,
    /// How many times an outcome report is tried before giving up
    pub report_attempts: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            error_backoff: Duration::from_secs(5),
            report_attempts: 3,
        }
    }
}

impl From<&QueueSettings> for WorkerConfig {
    fn from(settings: &QueueSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval,
            ..Default::default()
        }
    }
}

/// One worker. Run one per OS process; the job store is the only thing
/// workers share.
pub struct Worker {
    id: String,
    manager: Arc<QueueManager>,
    executor: CommandExecutor,
    sink: Arc<dyn LogSink>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(id: impl Into<String>, manager: Arc<QueueManager>, config: WorkerConfig) -> Self {
        Self {
            id: id.into(),
            manager,
            executor: CommandExecutor::default(),
            sink: Arc::new(NullLogSink),
            config,
        }
    }

    pub fn with_executor(mut self, executor: CommandExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Poll until `shutdown` flips to `true`. A job already running is
    /// always finished and reported before the loop exits.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(worker = %self.id, "Worker started");

        while !*shutdown.borrow() {
            let idle = match self.run_once().await {
                Ok(Some(_)) => None,
                Ok(None) => Some(self.config.poll_interval),
                Err(e) => {
                    error!(worker = %self.id, error = %e, "Queue error");
                    Some(self.config.error_backoff)
                }
            };

            if let Some(pause) = idle {
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            // Sender gone: nobody can ask us to stop any more
                            break;
                        }
                    }
                }
            }
        }

        info!(worker = %self.id, "Worker stopped");
    }

    /// One claim/execute/report cycle. Returns the state the job ended in,
    /// or `None` when nothing was eligible.
    pub async fn run_once(&self) -> Result<Option<JobState>, QueueError> {
        let Some(job) = self.manager.claim(self.manager.now()).await? else {
            return Ok(None);
        };
        let state = self.process(job).await;
        Ok(Some(state))
    }

    async fn process(&self, job: Job) -> JobState {
        info!(
            worker = %self.id,
            job_id = %job.id,
            priority = job.priority,
            attempt = job.attempts,
            "Processing job"
        );

        let execution = self.executor.run(&job.command, job.timeout()).await;

        if let Err(e) = self.sink.write(&job.id, &execution).await {
            warn!(job_id = %job.id, error = %e, "Failed to write job log");
        }

        self.report(&job, execution).await
    }

    async fn report(&self, job: &Job, execution: Execution) -> JobState {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match execution.outcome.error_message() {
                None => {
                    self.manager
                        .complete_with(
                            &job.id,
                            Completion {
                                stdout: execution.stdout.clone(),
                                elapsed: execution.elapsed,
                            },
                        )
                        .await
                }
                Some(message) => self.manager.fail(&job.id, &message, self.manager.now()).await,
            };

            match result {
                Ok(updated) => {
                    match updated.state {
                        JobState::Completed => info!(
                            worker = %self.id,
                            job_id = %job.id,
                            elapsed_ms = execution.elapsed.as_millis() as u64,
                            "Job completed"
                        ),
                        JobState::Dead => warn!(worker = %self.id, job_id = %job.id, "Job moved to DLQ"),
                        state => info!(
                            worker = %self.id,
                            job_id = %job.id,
                            %state,
                            run_at = %updated.run_at,
                            "Job will retry"
                        ),
                    }
                    return updated.state;
                }
                // Someone else (an operator reset) already moved the job on
                Err(e @ QueueError::InvalidState { .. }) | Err(e @ QueueError::NotFound(_)) => {
                    warn!(job_id = %job.id, error = %e, "Outcome no longer applicable");
                    return JobState::Processing;
                }
                Err(e) if attempt < self.config.report_attempts => {
                    warn!(job_id = %job.id, error = %e, attempt, "Failed to report outcome, retrying");
                    tokio::time::sleep(self.config.error_backoff).await;
                }
                Err(e) => {
                    error!(
                        job_id = %job.id,
                        error = %e,
                        "Giving up reporting outcome; job stays processing until recovered"
                    );
                    return JobState::Processing;
                }
            }
        }
    }
}
