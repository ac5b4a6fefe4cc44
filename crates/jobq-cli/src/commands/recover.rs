//! Recover command - reset jobs orphaned in `processing`
//!
//! Usage:
//! ```bash
//! jobq recover --job 3f2a...        # one job whose worker is known dead
//! jobq recover --older-than 3600    # everything untouched for an hour
//! ```

use anyhow::{bail, Result};
use clap::{ArgGroup, Args};
use comfy_table::Cell;
use jobq_queue::Job;
use std::time::Duration;

use super::{state_cell, table};
use crate::context::Env;

/// Arguments for the recover command
#[derive(Args)]
#[command(group(ArgGroup::new("target").required(true).args(["job", "older_than"])))]
pub struct RecoverArgs {
    /// Reset this job
    #[arg(long)]
    job: Option<String>,

    /// Reset every processing job not updated for this many seconds
    #[arg(long, value_name = "SECS")]
    older_than: Option<u64>,
}

pub async fn run(env: &Env, args: RecoverArgs) -> Result<()> {
    let queue = env.open().await?;
    let manager = &queue.manager;
    let now = manager.now();

    let recovered: Vec<Job> = match (args.job, args.older_than) {
        (Some(id), _) => vec![manager.reset(&id, now).await?],
        (None, Some(secs)) => {
            manager
                .recover_stale(Duration::from_secs(secs), now)
                .await?
        }
        (None, None) => bail!("Pass --job or --older-than"),
    };

    if recovered.is_empty() {
        crate::print_info("No stale jobs found");
        return Ok(());
    }

    let mut table = table(&["ID", "State", "Attempts"]);
    for job in &recovered {
        table.add_row(vec![
            Cell::new(&job.id),
            state_cell(job.state),
            Cell::new(format!("{}/{}", job.attempts, job.max_retries + 1)),
        ]);
    }
    println!("{table}");
    crate::print_success(&format!("Recovered {} job(s)", recovered.len()));
    Ok(())
}
