//! jobq - local background job queue
//!
//! # Usage
//!
//! ```bash
//! # Queue a shell command
//! jobq enqueue -c "echo hello" -p 10
//!
//! # Run three worker processes until Ctrl+C
//! jobq worker start --count 3
//!
//! # Inspect the queue
//! jobq status
//! jobq list --state failed
//! jobq dlq list
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;
mod context;

use commands::{config, dashboard, dlq, enqueue, list, logs, metrics, recover, status, worker};
use context::Env;

/// jobq - background job queue
///
/// Runs shell commands in worker processes with retries, exponential
/// backoff and a dead letter queue, all persisted in SQLite.
#[derive(Parser)]
#[command(name = "jobq", version, about = "jobq - local background job queue")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue a new job
    Enqueue(enqueue::EnqueueArgs),

    /// Start, run or stop workers
    Worker(worker::WorkerArgs),

    /// Show job counts per state
    Status,

    /// List jobs
    List(list::ListArgs),

    /// Dead letter queue operations
    Dlq(dlq::DlqArgs),

    /// Read or change queue configuration
    Config(config::ConfigArgs),

    /// Show execution metrics
    Metrics,

    /// Show the output log of a job
    Logs(logs::LogsArgs),

    /// Reset jobs stuck in processing after a worker died
    Recover(recover::RecoverArgs),

    /// Serve the web dashboard
    Dashboard(dashboard::DashboardArgs),
}

impl Commands {
    /// Workers and the dashboard log their activity by default
    fn is_long_running(&self) -> bool {
        matches!(self, Commands::Worker(_) | Commands::Dashboard(_))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let floor = u8::from(cli.command.is_long_running());
    setup_logging(cli.verbose.max(floor));

    let env = Env::from_env();

    match cli.command {
        Commands::Enqueue(args) => enqueue::run(&env, args).await,
        Commands::Worker(args) => worker::run(&env, args, cli.verbose).await,
        Commands::Status => status::run(&env).await,
        Commands::List(args) => list::run(&env, args).await,
        Commands::Dlq(args) => dlq::run(&env, args).await,
        Commands::Config(args) => config::run(&env, args).await,
        Commands::Metrics => metrics::run(&env).await,
        Commands::Logs(args) => logs::run(&env, args).await,
        Commands::Recover(args) => recover::run(&env, args).await,
        Commands::Dashboard(args) => dashboard::run(&env, args).await,
    }
}

/// Setup logging based on verbosity level
fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();
}

/// Print a success message with a checkmark
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an error message with an X
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("{} {}", "⚠".yellow().bold(), msg);
}

/// Print an info message
pub fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}
