//! List command
//!
//! Usage:
//! ```bash
//! jobq list --state failed --limit 50
//! ```

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use comfy_table::{Cell, Color};
use jobq_queue::JobState;

use super::{state_cell, table, truncate};
use crate::context::Env;

/// Arguments for the list command
#[derive(Args)]
pub struct ListArgs {
    /// Only jobs in this state (pending, processing, completed, failed, dead)
    #[arg(long)]
    state: Option<String>,

    /// Maximum number of jobs to display
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

pub async fn run(env: &Env, args: ListArgs) -> Result<()> {
    let state = args
        .state
        .as_deref()
        .map(|s| s.parse::<JobState>())
        .transpose()
        .context("Invalid --state")?;

    let queue = env.open().await?;
    let jobs = queue.manager.list(state).await?;

    if jobs.is_empty() {
        crate::print_warning("No jobs found");
        return Ok(());
    }

    let mut table = table(&["ID", "Command", "State", "Attempts", "Priority", "Created At"]);
    for job in jobs.iter().take(args.limit) {
        table.add_row(vec![
            Cell::new(truncate(&job.id, 8)),
            Cell::new(truncate(&job.command, 30)),
            state_cell(job.state),
            Cell::new(format!("{}/{}", job.attempts, job.max_retries + 1)),
            Cell::new(format!("P{}", job.priority)).fg(Color::Yellow),
            Cell::new(
                job.created_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S"),
            ),
        ]);
    }

    println!("{table}");
    if jobs.len() > args.limit {
        crate::print_info(&format!(
            "Showing {} of {} jobs (use --limit)",
            args.limit,
            jobs.len()
        ));
    }
    Ok(())
}
