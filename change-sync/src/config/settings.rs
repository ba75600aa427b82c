//! Runtime settings for the sync pipeline, read from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::SyncError;

/// Default number of messages received per poll (SQS maximum is 10).
pub const DEFAULT_BATCH_SIZE: i32 = 10;

/// Default delay between the end of one poll cycle and the start of the next.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

/// Default visibility timeout for received messages in seconds.
pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: i32 = 300;

/// Default long-poll wait time in seconds.
pub const DEFAULT_WAIT_TIME_SECS: i32 = 20;

/// Default receive count after which a message is flagged for dead-letter handling.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default error rate above which the system reports unhealthy.
pub const DEFAULT_ERROR_RATE_THRESHOLD: f64 = 0.10;

/// Default batch success ratio required before the polled messages are deleted.
pub const DEFAULT_DELETE_SUCCESS_RATIO: f64 = 0.8;

/// Queue endpoint settings. Present only when a queue URL is configured.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSettings {
    /// SQS queue URL.
    pub queue_url: String,
    /// AWS region override (falls back to the default provider chain).
    pub region: Option<String>,
    /// Endpoint override, e.g. for LocalStack.
    pub endpoint_url: Option<String>,
}

/// Settings for the sync pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Queue endpoint; `None` runs the manager without a consumer.
    pub queue: Option<QueueSettings>,
    pub batch_size: i32,
    pub poll_interval: Duration,
    pub visibility_timeout_secs: i32,
    pub wait_time_secs: i32,
    pub max_retries: u32,
    pub error_rate_threshold: f64,
    pub delete_success_ratio: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            queue: None,
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            visibility_timeout_secs: DEFAULT_VISIBILITY_TIMEOUT_SECS,
            wait_time_secs: DEFAULT_WAIT_TIME_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            error_rate_threshold: DEFAULT_ERROR_RATE_THRESHOLD,
            delete_success_ratio: DEFAULT_DELETE_SUCCESS_RATIO,
        }
    }
}

impl SyncConfig {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SYNC_QUEUE_URL`: SQS queue URL (unset disables the queue consumer)
    /// - `AWS_REGION`: AWS region override
    /// - `SQS_ENDPOINT_URL`: SQS endpoint override
    /// - `SYNC_BATCH_SIZE`: Messages per poll, 1-10 (default: 10)
    /// - `SYNC_POLL_INTERVAL_MS`: Delay between poll cycles (default: 5000)
    /// - `SYNC_VISIBILITY_TIMEOUT_SECS`: Visibility timeout (default: 300)
    /// - `SYNC_WAIT_TIME_SECS`: Long-poll wait, 0-20 (default: 20)
    /// - `SYNC_MAX_RETRIES`: Receive count before dead-letter flagging (default: 3)
    /// - `SYNC_ERROR_RATE_THRESHOLD`: Health error-rate ceiling (default: 0.10)
    /// - `SYNC_DELETE_SUCCESS_RATIO`: Success ratio needed to delete a batch (default: 0.8)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    ///
    /// Unparsable values log a warning and fall back to their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let queue = lookup("SYNC_QUEUE_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .map(|queue_url| QueueSettings {
                queue_url,
                region: lookup("AWS_REGION").filter(|r| !r.is_empty()),
                endpoint_url: lookup("SQS_ENDPOINT_URL").filter(|e| !e.is_empty()),
            });

        Self {
            queue,
            batch_size: parse_or(&lookup, "SYNC_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            poll_interval: Duration::from_millis(parse_or(
                &lookup,
                "SYNC_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL_MS,
            )),
            visibility_timeout_secs: parse_or(
                &lookup,
                "SYNC_VISIBILITY_TIMEOUT_SECS",
                DEFAULT_VISIBILITY_TIMEOUT_SECS,
            ),
            wait_time_secs: parse_or(&lookup, "SYNC_WAIT_TIME_SECS", DEFAULT_WAIT_TIME_SECS),
            max_retries: parse_or(&lookup, "SYNC_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            error_rate_threshold: parse_or(
                &lookup,
                "SYNC_ERROR_RATE_THRESHOLD",
                DEFAULT_ERROR_RATE_THRESHOLD,
            ),
            delete_success_ratio: parse_or(
                &lookup,
                "SYNC_DELETE_SUCCESS_RATIO",
                DEFAULT_DELETE_SUCCESS_RATIO,
            ),
        }
    }

    /// Check that every setting is within the range the queue and health checks accept.
    pub fn validate(&self) -> Result<(), SyncError> {
        if !(1..=10).contains(&self.batch_size) {
            return Err(SyncError::config(format!(
                "SYNC_BATCH_SIZE must be between 1 and 10, got {}",
                self.batch_size
            )));
        }
        if !(0..=20).contains(&self.wait_time_secs) {
            return Err(SyncError::config(format!(
                "SYNC_WAIT_TIME_SECS must be between 0 and 20, got {}",
                self.wait_time_secs
            )));
        }
        if !(0..=43_200).contains(&self.visibility_timeout_secs) {
            return Err(SyncError::config(format!(
                "SYNC_VISIBILITY_TIMEOUT_SECS must be between 0 and 43200, got {}",
                self.visibility_timeout_secs
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(SyncError::config("SYNC_POLL_INTERVAL_MS must be positive"));
        }
        for (name, value) in [
            ("SYNC_ERROR_RATE_THRESHOLD", self.error_rate_threshold),
            ("SYNC_DELETE_SUCCESS_RATIO", self.delete_success_ratio),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(SyncError::config(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!(key = %key, value = %raw, "Invalid value, using default");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = SyncConfig::from_lookup(|_| None);
        assert_eq!(config, SyncConfig::default());
        assert!(config.queue.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reads_queue_and_overrides() {
        let config = SyncConfig::from_lookup(lookup_from(&[
            ("SYNC_QUEUE_URL", "https://sqs.us-east-1.amazonaws.com/123/changes"),
            ("AWS_REGION", "us-east-1"),
            ("SYNC_BATCH_SIZE", "5"),
            ("SYNC_POLL_INTERVAL_MS", "250"),
            ("SYNC_MAX_RETRIES", "7"),
        ]));

        let queue = config.queue.clone().unwrap();
        assert_eq!(queue.queue_url, "https://sqs.us-east-1.amazonaws.com/123/changes");
        assert_eq!(queue.region.as_deref(), Some("us-east-1"));
        assert!(queue.endpoint_url.is_none());
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.max_retries, 7);
    }

    #[test]
    fn test_blank_queue_url_disables_queue() {
        let config = SyncConfig::from_lookup(lookup_from(&[("SYNC_QUEUE_URL", "  ")]));
        assert!(config.queue.is_none());
    }

    #[test]
    fn test_invalid_number_falls_back_to_default() {
        let config = SyncConfig::from_lookup(lookup_from(&[("SYNC_BATCH_SIZE", "lots")]));
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = SyncConfig {
            batch_size: 11,
            ..SyncConfig::default()
        };
        assert!(matches!(config.validate(), Err(SyncError::ConfigError(_))));

        let config = SyncConfig {
            wait_time_secs: 21,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SyncConfig {
            delete_success_ratio: 0.0,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SyncConfig {
            poll_interval: Duration::ZERO,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
