//! Logs command - print a job's stdout/stderr log

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::context::Env;

/// Arguments for the logs command
#[derive(Args)]
pub struct LogsArgs {
    /// Job id
    id: String,
}

pub async fn run(env: &Env, args: LogsArgs) -> Result<()> {
    match env.log_sink().read(&args.id).await? {
        Some(content) => {
            println!("{}", "═".repeat(60).cyan());
            print!("{}", content);
            println!("{}", "═".repeat(60).cyan());
        }
        None => crate::print_warning(&format!("No log file found for job {}", args.id)),
    }
    Ok(())
}
