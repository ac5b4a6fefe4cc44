//! Config command
//!
//! Usage:
//! ```bash
//! jobq config get
//! jobq config get max-retries
//! jobq config set backoff-base 3
//! ```

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color};

use super::table;
use crate::context::Env;

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show one value, or all of them
    Get {
        /// max-retries, backoff-base, poll-interval or job-timeout
        key: Option<String>,
    },

    /// Change a value
    Set { key: String, value: String },
}

pub async fn run(env: &Env, args: ConfigArgs) -> Result<()> {
    let queue = env.open().await?;
    let config = queue.config;

    match args.command {
        ConfigCommand::Get { key: Some(key) } => match config.get(&key).await? {
            Some(value) => println!("{}: {}", key, value),
            None => crate::print_warning(&format!("'{}' is not set", key)),
        },
        ConfigCommand::Get { key: None } => {
            let mut table = table(&["Key", "Value"]);
            for (key, value) in config.all().await? {
                table.add_row(vec![Cell::new(key).fg(Color::Green), Cell::new(value)]);
            }
            println!("{table}");
        }
        ConfigCommand::Set { key, value } => {
            config
                .set(&key, &value)
                .await
                .with_context(|| format!("Cannot set {}", key))?;
            crate::print_success(&format!("Configuration updated: {} = {}", key, value));
        }
    }
    Ok(())
}
