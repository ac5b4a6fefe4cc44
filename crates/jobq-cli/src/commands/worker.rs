//! Worker command - start, run and stop worker processes
//!
//! Usage:
//! ```bash
//! jobq worker start --count 3   # supervise three worker processes
//! jobq worker run --id W1       # one worker in this process
//! jobq worker stop              # SIGTERM every recorded worker
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use jobq_queue::{Worker, WorkerConfig};
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::watch;

use crate::context::Env;

/// Arguments for the worker command
#[derive(Args)]
pub struct WorkerArgs {
    #[command(subcommand)]
    command: WorkerCommand,
}

#[derive(Subcommand)]
pub enum WorkerCommand {
    /// Spawn worker processes and wait for them
    Start {
        /// Number of workers
        #[arg(long, default_value_t = 1)]
        count: usize,
    },

    /// Run a single worker loop in this process
    Run {
        /// Worker name used in logs
        #[arg(long, default_value = "W1")]
        id: String,
    },

    /// Ask recorded workers to finish their current job and exit
    Stop,
}

pub async fn run(env: &Env, args: WorkerArgs, verbose: u8) -> Result<()> {
    match args.command {
        WorkerCommand::Start { count } => start(env, count, verbose).await,
        WorkerCommand::Run { id } => run_worker(env, id).await,
        WorkerCommand::Stop => stop(env).await,
    }
}

async fn run_worker(env: &Env, id: String) -> Result<()> {
    let queue = env.open().await?;
    let config = WorkerConfig::from(queue.manager.settings());
    let worker = Worker::new(id.clone(), queue.manager.clone(), config)
        .with_sink(Arc::new(env.log_sink()));

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        jobq_api::server::shutdown_signal().await;
        let _ = tx.send(true);
    });

    tracing::info!(worker = %id, pid = std::process::id(), "Worker started");
    worker.run(rx).await;

    queue.backend.close().await;
    tracing::info!(worker = %id, "Worker stopped");
    Ok(())
}

async fn start(env: &Env, count: usize, verbose: u8) -> Result<()> {
    if count == 0 {
        bail!("--count must be at least 1");
    }

    // Apply migrations once before the children race to do it
    env.open().await?.backend.close().await;

    let exe = std::env::current_exe().context("Cannot locate the jobq executable")?;
    println!("Starting {} worker(s)...", count);

    let mut children: Vec<(String, Child)> = Vec::with_capacity(count);
    for i in 1..=count {
        let name = format!("W{}", i);
        let mut cmd = Command::new(&exe);
        if verbose > 0 {
            cmd.arg(format!("-{}", "v".repeat(verbose as usize)));
        }
        cmd.args(["worker", "run", "--id", &name]);

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn worker {}", name))?;
        let pid = child.id().unwrap_or_default();
        crate::print_success(&format!("Worker {} started (PID: {})", name, pid));
        children.push((name, child));
    }

    let pids: Vec<String> = children
        .iter()
        .filter_map(|(_, c)| c.id())
        .map(|pid| pid.to_string())
        .collect();
    tokio::fs::write(env.pid_file(), pids.join("\n") + "\n")
        .await
        .with_context(|| format!("Failed to write {}", env.pid_file().display()))?;

    println!();
    println!("{}", "Workers running. Press Ctrl+C to stop.".cyan());

    let interrupted = tokio::select! {
        _ = wait_all(&mut children) => false,
        _ = jobq_api::server::shutdown_signal() => true,
    };

    if interrupted {
        println!("{}", "Stopping workers gracefully...".yellow());
        for (_, child) in &children {
            if let Some(pid) = child.id() {
                terminate(pid);
            }
        }
        wait_all(&mut children).await;
        crate::print_success("All workers stopped");
    }

    let _ = tokio::fs::remove_file(env.pid_file()).await;
    Ok(())
}

async fn wait_all(children: &mut [(String, Child)]) {
    for (name, child) in children.iter_mut() {
        match child.wait().await {
            Ok(status) if status.success() => tracing::info!(worker = %name, "Worker exited"),
            Ok(status) => tracing::warn!(worker = %name, %status, "Worker exited abnormally"),
            Err(e) => tracing::error!(worker = %name, error = %e, "Failed to wait for worker"),
        }
    }
}

async fn stop(env: &Env) -> Result<()> {
    let path = env.pid_file();
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            crate::print_warning("No workers PID file found");
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };

    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match line.parse::<u32>() {
            Ok(pid) if terminate(pid) => {
                crate::print_success(&format!("Sent stop signal to worker (PID: {})", pid))
            }
            Ok(pid) => crate::print_warning(&format!("Worker (PID: {}) not found", pid)),
            Err(_) => crate::print_error(&format!("Ignoring bad PID entry '{}'", line)),
        }
    }

    tokio::fs::remove_file(&path).await?;
    Ok(())
}

/// Send SIGTERM; `false` if the process is gone.
#[cfg(unix)]
fn terminate(pid: u32) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(pid, error = %e, "kill failed");
            false
        }
    }
}

#[cfg(not(unix))]
fn terminate(pid: u32) -> bool {
    tracing::warn!(pid, "Graceful stop is only supported on unix");
    false
}
