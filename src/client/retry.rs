//! Reconnect policy for peer clients

use crate::config::{ClientConfig, ConfigError};
use std::time::Duration;

/// Fixed-delay retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between attempts
    pub delay: Duration,
    /// Consecutive failed attempts allowed before giving up; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Retry forever with a fixed delay
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Policy for the `[client]` section; the section is validated here
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            delay: config.retry_delay(),
            max_attempts: config.max_attempts,
        })
    }

    /// Whether another attempt is allowed after `failures` consecutive failures
    pub fn should_retry(&self, failures: u32) -> bool {
        self.max_attempts.map_or(true, |max| failures < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retries_forever_every_five_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay, Duration::from_secs(5));
        assert!(policy.should_retry(u32::MAX - 1));
    }

    #[test]
    fn bounded_policy_stops_at_limit() {
        let policy = RetryPolicy::fixed(Duration::from_millis(10)).with_max_attempts(2);
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
    }

    #[test]
    fn policy_from_config() {
        let config = ClientConfig {
            retry_delay_secs: 7,
            max_attempts: Some(4),
            ..ClientConfig::default()
        };
        let policy = RetryPolicy::from_config(&config).unwrap();
        assert_eq!(policy.delay, Duration::from_secs(7));
        assert_eq!(policy.max_attempts, Some(4));
    }

    #[test]
    fn policy_from_invalid_config_fails() {
        let config = ClientConfig {
            retry_delay_secs: 0,
            ..ClientConfig::default()
        };
        assert!(RetryPolicy::from_config(&config).is_err());
    }
}
