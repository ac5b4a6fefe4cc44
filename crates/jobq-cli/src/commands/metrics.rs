//! Metrics command

use anyhow::Result;
use colored::Colorize;
use comfy_table::Cell;

use super::{counts_table, table};
use crate::context::Env;

pub async fn run(env: &Env) -> Result<()> {
    let queue = env.open().await?;
    let counts = queue.manager.stats().await?;
    let metrics = queue.manager.metrics().await?;

    println!();
    println!("{}", "jobq metrics".bold().cyan());
    println!("{}", "═".repeat(50).cyan());

    println!("{}", "Job Counts:".yellow());
    println!("{}", counts_table(&counts));

    println!("{}", "Performance:".yellow());
    let mut perf = table(&["Metric", "Value"]);
    perf.add_row(vec![
        Cell::new("Average Execution Time"),
        Cell::new(match metrics.avg_execution_ms {
            Some(ms) => format!("{:.2}s", ms / 1000.0),
            None => "-".to_string(),
        }),
    ]);
    perf.add_row(vec![
        Cell::new("Success Rate"),
        Cell::new(format!("{:.1}%", metrics.success_rate)),
    ]);
    perf.add_row(vec![
        Cell::new("Jobs (Last 24h)"),
        Cell::new(metrics.jobs_last_24h),
    ]);
    println!("{perf}");

    if !metrics.priority_distribution.is_empty() {
        println!("{}", "Priority Distribution:".yellow());
        let mut prio = table(&["Priority", "Jobs"]);
        for (priority, count) in metrics.priority_distribution.iter().rev() {
            prio.add_row(vec![Cell::new(priority), Cell::new(count)]);
        }
        println!("{prio}");
    }
    println!();
    Ok(())
}
