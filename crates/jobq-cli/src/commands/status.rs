//! Status command - job counts per state

use anyhow::Result;
use colored::Colorize;

use super::counts_table;
use crate::context::Env;

pub async fn run(env: &Env) -> Result<()> {
    let queue = env.open().await?;
    let counts = queue.manager.stats().await?;

    println!();
    println!("{}", "jobq status".bold().cyan());
    println!("{}", "═".repeat(40).cyan());
    println!("{}", counts_table(&counts));
    println!();
    Ok(())
}
