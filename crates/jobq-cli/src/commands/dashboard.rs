//! Dashboard command - serve the read-only web dashboard

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use jobq_api::{AppState, DashboardConfig, DashboardServer};
use std::net::{IpAddr, SocketAddr};

use crate::context::Env;

/// Arguments for the dashboard command
#[derive(Args)]
pub struct DashboardArgs {
    /// Address to bind (default 127.0.0.1 or JOBQ_DASHBOARD_ADDR)
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to listen on (default 5000 or JOBQ_DASHBOARD_ADDR)
    #[arg(long)]
    port: Option<u16>,
}

pub async fn run(env: &Env, args: DashboardArgs) -> Result<()> {
    let mut config = DashboardConfig::from_env();
    config.addr = SocketAddr::new(
        args.host.unwrap_or(config.addr.ip()),
        args.port.unwrap_or(config.addr.port()),
    );

    let queue = env.open().await?;
    println!("{}", "Starting jobq dashboard...".cyan());
    println!("Dashboard running at: {}", format!("http://{}", config.addr).green());
    println!("Press {} to stop", "Ctrl+C".yellow());
    println!();

    DashboardServer::new(config, AppState::new(queue.manager.clone()))
        .run()
        .await
        .context("Dashboard failed")?;

    queue.backend.close().await;
    Ok(())
}
