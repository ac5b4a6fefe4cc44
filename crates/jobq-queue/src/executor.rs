//! Shell command execution with a per-job timeout

use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Error message recorded for a run killed by its timeout.
pub const TIMEOUT_MESSAGE: &str = "timeout";

/// How a single execution attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Succeeded,
    /// Non-zero exit, death by signal, or failure to spawn
    Failed {
        exit_code: Option<i32>,
        message: String,
    },
    TimedOut,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Succeeded)
    }

    /// Message handed to the queue manager on failure.
    pub fn error_message(&self) -> Option<String> {
        match self {
            ExecutionOutcome::Succeeded => None,
            ExecutionOutcome::Failed { message, .. } => Some(message.clone()),
            ExecutionOutcome::TimedOut => Some(TIMEOUT_MESSAGE.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Execution {
    pub outcome: ExecutionOutcome,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Runs job commands through the platform shell.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    shell: String,
    shell_flag: String,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        if cfg!(windows) {
            Self::with_shell("cmd", "/C")
        } else {
            Self::with_shell("sh", "-c")
        }
    }
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(shell: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            shell_flag: flag.into(),
        }
    }

    /// Run `command` to completion, or until `timeout` elapses.
    ///
    /// Never returns an error: every way a run can go wrong is an
    /// [`ExecutionOutcome`] for the retry policy to judge.
    pub async fn run(&self, command: &str, timeout: Option<Duration>) -> Execution {
        let started = Instant::now();

        let mut cmd = Command::new(&self.shell);
        cmd.arg(&self.shell_flag)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(error = %e, shell = %self.shell, "Failed to spawn job command");
                return Execution {
                    outcome: ExecutionOutcome::Failed {
                        exit_code: None,
                        message: format!("failed to spawn: {}", e),
                    },
                    stdout: String::new(),
                    stderr: String::new(),
                    elapsed: started.elapsed(),
                };
            }
        };

        let pid = child.id();
        let mut stdout_task = spawn_reader(child.stdout.take());
        let mut stderr_task = spawn_reader(child.stderr.take());

        // One deadline covers the exit and both pipes draining: a background
        // process can hold the pipes open after the shell itself is gone.
        let deadline = timeout.and_then(|limit| tokio::time::Instant::now().checked_add(limit));
        let collect = async {
            let status = child.wait().await;
            let stdout = (&mut stdout_task).await.unwrap_or_default();
            let stderr = (&mut stderr_task).await.unwrap_or_default();
            (status, stdout, stderr)
        };
        let finished = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, collect).await.ok(),
            None => Some(collect.await),
        };

        let Some((status, stdout, stderr)) = finished else {
            debug!(?pid, "Job command exceeded its timeout, killing");
            kill_process_tree(pid);
            if let Err(e) = child.kill().await {
                debug!(error = %e, "Child already gone");
            }
            stdout_task.abort();
            stderr_task.abort();
            return Execution {
                outcome: ExecutionOutcome::TimedOut,
                stdout: String::new(),
                stderr: String::new(),
                elapsed: started.elapsed(),
            };
        };

        let elapsed = started.elapsed();

        let outcome = match status {
            Ok(status) if status.success() => ExecutionOutcome::Succeeded,
            Ok(status) => {
                let message = match stderr.trim() {
                    "" => match status.code() {
                        Some(code) => format!("exit code {}", code),
                        None => "terminated by signal".to_string(),
                    },
                    err => err.to_string(),
                };
                ExecutionOutcome::Failed {
                    exit_code: status.code(),
                    message,
                }
            }
            Err(e) => ExecutionOutcome::Failed {
                exit_code: None,
                message: format!("failed to wait for command: {}", e),
            },
        };

        Execution {
            outcome,
            stdout,
            stderr,
            elapsed,
        }
    }
}

fn spawn_reader<R>(pipe: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            // Partial output is still worth keeping
            let _ = pipe.read_to_end(&mut buf).await;
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// The child leads its own process group; take the whole group down so
/// grandchildren spawned by the shell don't outlive the timeout.
#[cfg(unix)]
fn kill_process_tree(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) {
        if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
            debug!(error = %e, pid, "killpg failed");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_tree(_pid: Option<u32>) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_captures_stdout() {
        let exec = CommandExecutor::new().run("echo hello", None).await;
        assert!(exec.outcome.is_success());
        assert_eq!(exec.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_nonzero_exit_uses_stderr() {
        let exec = CommandExecutor::new()
            .run("echo oops >&2; exit 3", None)
            .await;
        assert_eq!(
            exec.outcome,
            ExecutionOutcome::Failed {
                exit_code: Some(3),
                message: "oops".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_without_stderr() {
        let exec = CommandExecutor::new().run("exit 7", None).await;
        assert_eq!(exec.outcome.error_message().as_deref(), Some("exit code 7"));
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let started = Instant::now();
        let exec = CommandExecutor::new()
            .run("sleep 10", Some(Duration::from_millis(300)))
            .await;
        assert_eq!(exec.outcome, ExecutionOutcome::TimedOut);
        assert_eq!(exec.outcome.error_message().as_deref(), Some(TIMEOUT_MESSAGE));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_covers_background_process_holding_pipes() {
        let started = Instant::now();
        let exec = CommandExecutor::new()
            .run("sleep 10 & echo hi", Some(Duration::from_millis(500)))
            .await;
        assert_eq!(exec.outcome, ExecutionOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_shell_is_a_failure() {
        let exec = CommandExecutor::with_shell("/nonexistent/shell", "-c")
            .run("true", None)
            .await;
        assert!(matches!(
            exec.outcome,
            ExecutionOutcome::Failed { exit_code: None, .. }
        ));
    }
}
