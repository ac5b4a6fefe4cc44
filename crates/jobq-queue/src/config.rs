//! Queue tunables

use std::time::Duration;

use crate::error::QueueError;
use crate::retry::{BackoffStrategy, RetryPolicy};

pub const KEY_MAX_RETRIES: &str = "max_retries";
pub const KEY_BACKOFF_BASE: &str = "backoff_base";
pub const KEY_POLL_INTERVAL: &str = "worker_poll_interval";
pub const KEY_JOB_TIMEOUT: &str = "job_timeout";

/// Every key understood by [`QueueSettings::apply`].
pub const KNOWN_KEYS: [&str; 4] = [
    KEY_MAX_RETRIES,
    KEY_BACKOFF_BASE,
    KEY_POLL_INTERVAL,
    KEY_JOB_TIMEOUT,
];

/// Tunables consumed by the queue manager and workers.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSettings {
    /// Default `max_retries` for jobs that don't specify one
    pub max_retries: u32,
    pub backoff_base: u32,
    pub poll_interval: Duration,
    /// Default per-job timeout; `None` means unbounded
    pub job_timeout: Option<Duration>,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: 2,
            poll_interval: Duration::from_secs(2),
            job_timeout: Some(Duration::from_secs(300)),
        }
    }
}

impl QueueSettings {
    /// Map a CLI-style key (`max-retries`) to its stored form (`max_retries`).
    pub fn normalize_key(key: &str) -> String {
        match key.trim() {
            "poll-interval" | "poll_interval" => KEY_POLL_INTERVAL.to_string(),
            "timeout" | "job-timeout" => KEY_JOB_TIMEOUT.to_string(),
            other => other.replace('-', "_"),
        }
    }

    /// Default values in their stored string form.
    pub fn default_pairs() -> Vec<(&'static str, String)> {
        Self::default().to_pairs()
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            (KEY_MAX_RETRIES, self.max_retries.to_string()),
            (KEY_BACKOFF_BASE, self.backoff_base.to_string()),
            (KEY_POLL_INTERVAL, self.poll_interval.as_secs_f64().to_string()),
            (
                KEY_JOB_TIMEOUT,
                self.job_timeout.map(|t| t.as_secs()).unwrap_or(0).to_string(),
            ),
        ]
    }

    /// Build settings from stored key/value pairs, starting from defaults.
    /// Unknown keys are ignored.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, QueueError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut settings = Self::default();
        for (key, value) in pairs {
            settings.apply(key, value)?;
        }
        Ok(settings)
    }

    /// Validate and apply a single key/value.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), QueueError> {
        let value = value.trim();
        match Self::normalize_key(key).as_str() {
            KEY_MAX_RETRIES => {
                self.max_retries = value.parse().map_err(|_| invalid(key, value))?;
            }
            KEY_BACKOFF_BASE => {
                let base: u32 = value.parse().map_err(|_| invalid(key, value))?;
                if base == 0 {
                    return Err(QueueError::Validation(
                        "backoff_base must be at least 1".to_string(),
                    ));
                }
                self.backoff_base = base;
            }
            KEY_POLL_INTERVAL => {
                let secs: f64 = value.parse().map_err(|_| invalid(key, value))?;
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(invalid(key, value));
                }
                self.poll_interval =
                    Duration::try_from_secs_f64(secs).map_err(|_| invalid(key, value))?;
            }
            KEY_JOB_TIMEOUT => {
                let secs: u64 = value.parse().map_err(|_| invalid(key, value))?;
                self.job_timeout = (secs > 0).then(|| Duration::from_secs(secs));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(BackoffStrategy::exponential(self.backoff_base))
    }
}

fn invalid(key: &str, value: &str) -> QueueError {
    QueueError::Validation(format!("invalid value '{}' for '{}'", value, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_pairs() {
        let pairs = QueueSettings::default_pairs();
        let parsed =
            QueueSettings::from_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str()))).unwrap();
        assert_eq!(parsed, QueueSettings::default());
    }

    #[test]
    fn test_apply_accepts_dashed_keys() {
        let mut settings = QueueSettings::default();
        settings.apply("max-retries", "5").unwrap();
        settings.apply("backoff-base", "3").unwrap();
        settings.apply("poll-interval", "0.5").unwrap();
        settings.apply("job-timeout", "0").unwrap();

        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.backoff_base, 3);
        assert_eq!(settings.poll_interval, Duration::from_millis(500));
        assert_eq!(settings.job_timeout, None);
    }

    #[test]
    fn test_apply_rejects_garbage() {
        let mut settings = QueueSettings::default();
        assert!(settings.apply("max_retries", "-1").is_err());
        assert!(settings.apply("backoff_base", "0").is_err());
        assert!(settings.apply("worker_poll_interval", "0").is_err());
        assert!(settings.apply("worker_poll_interval", "1e20").is_err());
        assert!(settings.apply("job_timeout", "soon").is_err());
        assert_eq!(settings, QueueSettings::default());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let settings = QueueSettings::from_pairs([("colour", "blue")]).unwrap();
        assert_eq!(settings, QueueSettings::default());
    }
}
