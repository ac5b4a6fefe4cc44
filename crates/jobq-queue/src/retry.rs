//! Retry backoff policy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry backoff strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BackoffStrategy {
    /// `unit * base^attempts`
    Exponential { base: u32, unit: Duration },
    Constant { delay: Duration },
}

impl BackoffStrategy {
    pub fn exponential(base: u32) -> Self {
        Self::Exponential {
            base,
            unit: Duration::from_secs(1),
        }
    }

    /// Delay before the next attempt, where `attempts` counts the attempts
    /// already consumed. Saturates instead of overflowing.
    pub fn delay(&self, attempts: u32) -> Duration {
        match self {
            Self::Constant { delay } => *delay,
            Self::Exponential { base, unit } => {
                let factor = u64::from(*base)
                    .checked_pow(attempts)
                    .and_then(|f| u32::try_from(f).ok());
                match factor {
                    Some(f) => unit.checked_mul(f).unwrap_or(Duration::MAX),
                    None => Duration::MAX,
                }
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::exponential(2)
    }
}

/// What happens to a job after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    Dead,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RetryPolicy {
    pub strategy: BackoffStrategy,
}

impl RetryPolicy {
    pub fn new(strategy: BackoffStrategy) -> Self {
        Self { strategy }
    }

    /// `attempts` is the post-claim count, i.e. including the attempt that
    /// just failed. A job dies once it has used more than `max_retries`.
    pub fn decide(&self, attempts: u32, max_retries: u32) -> RetryDecision {
        if attempts > max_retries {
            RetryDecision::Dead
        } else {
            RetryDecision::Retry {
                delay: self.strategy.delay(attempts),
            }
        }
    }

    /// `now + delay`, clamped to the latest representable instant.
    pub fn next_run_at(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
        chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
