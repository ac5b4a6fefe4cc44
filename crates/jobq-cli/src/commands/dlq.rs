//! Dead letter queue commands
//!
//! Usage:
//! ```bash
//! jobq dlq list
//! jobq dlq retry <job-id>
//! ```

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color};
use jobq_queue::QueueError;

use super::{table, truncate};
use crate::context::Env;

/// Arguments for the dlq command
#[derive(Args)]
pub struct DlqArgs {
    #[command(subcommand)]
    command: DlqCommand,
}

#[derive(Subcommand)]
pub enum DlqCommand {
    /// List dead jobs
    List,

    /// Move a dead job back to pending with a fresh retry budget
    Retry {
        /// Job id
        id: String,
    },
}

pub async fn run(env: &Env, args: DlqArgs) -> Result<()> {
    match args.command {
        DlqCommand::List => list(env).await,
        DlqCommand::Retry { id } => retry(env, &id).await,
    }
}

async fn list(env: &Env) -> Result<()> {
    let queue = env.open().await?;
    let jobs = queue.manager.list_dlq().await?;

    if jobs.is_empty() {
        crate::print_success("DLQ is empty");
        return Ok(());
    }

    let mut table = table(&["ID", "Command", "Attempts", "Last Error"]);
    for job in &jobs {
        table.add_row(vec![
            Cell::new(&job.id).fg(Color::Green),
            Cell::new(truncate(&job.command, 30)),
            Cell::new(job.attempts),
            Cell::new(truncate(job.error_message.as_deref().unwrap_or("-"), 40)).fg(Color::Red),
        ]);
    }
    println!("{table}");
    Ok(())
}

async fn retry(env: &Env, id: &str) -> Result<()> {
    let queue = env.open().await?;
    match queue.manager.dlq_retry(id).await {
        Ok(_) => {
            crate::print_success(&format!("Job {} moved back to pending queue", id));
            Ok(())
        }
        Err(QueueError::NotFound(_)) | Err(QueueError::InvalidState { .. }) => {
            bail!("Job {} not found in DLQ", id)
        }
        Err(e) => Err(e.into()),
    }
}
