//! Enqueue command
//!
//! Usage:
//! ```bash
//! jobq enqueue '{"command": "echo hi", "priority": 5}'
//! jobq enqueue -c "backup.sh" --run-at 2025-11-05T15:30:00 -t 600
//! ```

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use clap::Args;
use colored::Colorize;
use jobq_queue::NewJob;
use std::time::Duration;

use crate::context::Env;

/// Arguments for the enqueue command
#[derive(Args)]
pub struct EnqueueArgs {
    /// Job as JSON: {"command": ..., "id", "priority", "max_retries", "timeout", "run_at"}
    job: Option<String>,

    /// Shell command to run
    #[arg(short, long)]
    command: Option<String>,

    /// Job id (generated when omitted)
    #[arg(long)]
    id: Option<String>,

    /// Retries after the first failure (default from config)
    #[arg(short = 'r', long)]
    max_retries: Option<i64>,

    /// Higher runs first
    #[arg(short, long)]
    priority: Option<i32>,

    /// Timeout in seconds; 0 disables it (default from config)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Earliest start, RFC 3339 or local `YYYY-MM-DDTHH:MM:SS`
    #[arg(long)]
    run_at: Option<String>,
}

pub async fn run(env: &Env, args: EnqueueArgs) -> Result<()> {
    let new_job = build_job(args)?;
    let queue = env.open().await?;

    let id = queue.manager.enqueue(new_job).await?;
    let job = queue.manager.get(&id).await?;

    crate::print_success("Job enqueued");
    println!("  {} {}", "ID:".dimmed(), job.id.green());
    println!("  {} {}", "Command:".dimmed(), job.command);
    println!("  {} {}", "Priority:".dimmed(), job.priority);
    println!("  {} {}", "Max retries:".dimmed(), job.max_retries);
    match job.timeout_secs {
        Some(secs) => println!("  {} {}s", "Timeout:".dimmed(), secs),
        None => println!("  {} none", "Timeout:".dimmed()),
    }
    if job.run_at > job.created_at {
        println!(
            "  {} {}",
            "Scheduled for:".dimmed(),
            job.run_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Merge the JSON argument and flags; flags win.
fn build_job(args: EnqueueArgs) -> Result<NewJob> {
    let mut job = match (&args.job, &args.command) {
        (Some(json), _) => parse_json(json)?,
        (None, Some(command)) => NewJob::new(command.clone()),
        (None, None) => bail!("Provide a JSON job or --command"),
    };

    if let (Some(_), Some(command)) = (&args.job, args.command) {
        job.command = command;
    }
    if let Some(id) = args.id {
        job = job.with_id(id);
    }
    if let Some(n) = args.max_retries {
        job = job.with_max_retries(n);
    }
    if let Some(p) = args.priority {
        job = job.with_priority(p);
    }
    if let Some(t) = args.timeout {
        job = job.with_timeout(Duration::from_secs(t));
    }
    if let Some(at) = args.run_at {
        job = job.with_run_at(parse_run_at(&at)?);
    }
    Ok(job)
}

fn parse_json(json: &str) -> Result<NewJob> {
    let mut value: serde_json::Value =
        serde_json::from_str(json).with_context(|| format!("Invalid JSON: {}", json))?;

    // run_at accepts naive local times, which chrono's serde form does not
    let run_at = match value.as_object_mut().and_then(|o| o.remove("run_at")) {
        Some(serde_json::Value::String(s)) => Some(parse_run_at(&s)?),
        Some(serde_json::Value::Null) | None => None,
        Some(other) => bail!("run_at must be a string, got {}", other),
    };

    let mut job: NewJob = serde_json::from_value(value).context("Invalid job")?;
    if let Some(at) = run_at {
        job = job.with_run_at(at);
    }
    Ok(job)
}

/// RFC 3339, or a naive timestamp taken as local time.
pub(crate) fn parse_run_at(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| anyhow!("Unrecognised time '{}'", s))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("'{}' does not exist in the local timezone", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(job: Option<&str>, command: Option<&str>) -> EnqueueArgs {
        EnqueueArgs {
            job: job.map(String::from),
            command: command.map(String::from),
            id: None,
            max_retries: None,
            priority: None,
            timeout: None,
            run_at: None,
        }
    }

    #[test]
    fn test_json_job() {
        let job = build_job(args(
            Some(r#"{"id": "j1", "command": "echo hi", "priority": 5, "timeout": 10}"#),
            None,
        ))
        .unwrap();
        assert_eq!(job.id.as_deref(), Some("j1"));
        assert_eq!(job.command, "echo hi");
        assert_eq!(job.priority, 5);
        assert_eq!(job.timeout_secs, Some(10));
    }

    #[test]
    fn test_flags_override_json() {
        let mut a = args(Some(r#"{"command": "a", "priority": 1}"#), Some("b"));
        a.priority = Some(7);
        let job = build_job(a).unwrap();
        assert_eq!(job.command, "b");
        assert_eq!(job.priority, 7);
    }

    #[test]
    fn test_requires_command_source() {
        assert!(build_job(args(None, None)).is_err());
        assert!(build_job(args(Some("not json"), None)).is_err());
        assert!(build_job(args(Some(r#"{"command": "x", "bogus": 1}"#), None)).is_err());
    }

    #[test]
    fn test_parse_run_at() {
        let utc = parse_run_at("2025-11-05T15:30:00Z").unwrap();
        assert_eq!(utc.to_rfc3339(), "2025-11-05T15:30:00+00:00");

        let local = parse_run_at("2025-11-05T15:30:00").unwrap();
        let expected = Local
            .with_ymd_and_hms(2025, 11, 5, 15, 30, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(local, expected);

        assert!(parse_run_at("tomorrow").is_err());
    }
}
