//! Configuration module for environment variable parsing.
//!
//! Reads all configuration from environment variables, falling back to
//! defaults for anything missing or malformed.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::model::TransportConfig;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Shared token required in `X-Api-Token` on job routes, when set
    pub api_token: Option<String>,

    /// Idle sleep between queue polls in milliseconds
    pub poll_interval_ms: u64,

    /// Pause after an unexpected worker loop error in milliseconds
    pub error_delay_ms: u64,

    /// Delivery attempts per group, including the first
    pub max_attempts: u32,

    /// Backoff base in milliseconds; the delay after attempt n is base * 2^n
    pub backoff_base_ms: u64,

    // =========================================================================
    // Default SMTP settings, used when a submission carries none
    // =========================================================================

    pub smtp: TransportConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = TransportConfig::default();

        Config {
            port: parse_or("PORT", 8080),

            api_token: env::var("API_TOKEN").ok().filter(|t| !t.is_empty()),

            poll_interval_ms: parse_or("WORKER_POLL_INTERVAL_MS", 500),

            error_delay_ms: parse_or("WORKER_ERROR_DELAY_MS", 1000),

            max_attempts: parse_or("SEND_MAX_ATTEMPTS", 3).max(1),

            backoff_base_ms: parse_or("SEND_BACKOFF_BASE_MS", 1000),

            smtp: TransportConfig {
                host: env::var("SMTP_HOST").unwrap_or(defaults.host),
                port: parse_or("SMTP_PORT", defaults.port),
                username: env::var("SMTP_USERNAME").ok(),
                password: env::var("SMTP_PASSWORD").ok(),
                enable_ssl: parse_bool("SMTP_ENABLE_SSL", defaults.enable_ssl),
                timeout_seconds: parse_or("SMTP_TIMEOUT_SECONDS", defaults.timeout_seconds),
                from_email: env::var("SMTP_FROM_EMAIL").unwrap_or(defaults.from_email),
                from_name: env::var("SMTP_FROM_NAME").unwrap_or(defaults.from_name),
                global_cc: parse_list("SMTP_GLOBAL_CC", ';').unwrap_or_default(),
            },
        }
    }

    /// Settings handed to the dispatch worker.
    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            error_delay: Duration::from_millis(self.error_delay_ms),
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                base_delay: Duration::from_millis(self.backoff_base_ms),
            },
        }
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): base * 2^attempt.
    ///
    /// None after the final attempt.
    pub fn backoff_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(self.base_delay.saturating_mul(2u32.saturating_pow(attempt)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Timing knobs of the dispatch worker loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub error_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            error_delay: Duration::from_millis(1000),
            retry: RetryPolicy::default(),
        }
    }
}

/// Parse a variable, warning and using the default when it is malformed.
fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Parse a boolean flag accepting true/false, 1/0, yes/no.
fn parse_bool(name: &str, default: bool) -> bool {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid boolean, using default");
            default
        }
    }
}

/// Parse a `sep`-separated list of strings.
fn parse_list(name: &str, sep: char) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(sep)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_valid() {
        env::set_var("TEST_BULKMAIL_PORT", "2525");
        assert_eq!(parse_or::<u16>("TEST_BULKMAIL_PORT", 25), 2525);
        env::remove_var("TEST_BULKMAIL_PORT");
    }

    #[test]
    fn test_parse_or_invalid_uses_default() {
        env::set_var("TEST_BULKMAIL_BAD", "not-a-number");
        assert_eq!(parse_or::<u64>("TEST_BULKMAIL_BAD", 7), 7);
        env::remove_var("TEST_BULKMAIL_BAD");
    }

    #[test]
    fn test_parse_or_default() {
        assert_eq!(parse_or::<u64>("NONEXISTENT_VAR", 10), 10);
    }

    #[test]
    fn test_parse_bool() {
        env::set_var("TEST_BULKMAIL_SSL", "No");
        assert!(!parse_bool("TEST_BULKMAIL_SSL", true));
        env::set_var("TEST_BULKMAIL_SSL", "maybe");
        assert!(parse_bool("TEST_BULKMAIL_SSL", true));
        env::remove_var("TEST_BULKMAIL_SSL");
    }

    #[test]
    fn test_parse_list_semicolons() {
        env::set_var("TEST_BULKMAIL_CC", "a@example.com; b@example.com;;");
        let result = parse_list("TEST_BULKMAIL_CC", ';');
        assert_eq!(
            result,
            Some(vec!["a@example.com".to_string(), "b@example.com".to_string()])
        );
        env::remove_var("TEST_BULKMAIL_CC");
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff_after(1), Some(Duration::from_secs(2)));
        assert_eq!(policy.backoff_after(2), Some(Duration::from_secs(4)));
        assert_eq!(policy.backoff_after(3), None);
    }
}
