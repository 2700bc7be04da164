//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::*;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Fibonacci backoff minimum after a failed reconciliation (seconds)
    pub backoff_min_secs: u64,
    /// Fibonacci backoff maximum after a failed reconciliation (seconds)
    pub backoff_max_secs: u64,
    /// Requeue delay while a certificate is being issued (seconds)
    pub issuance_poll_interval_secs: u64,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Watch stream restart delay after stream ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Maximum concurrent reconciliations
    pub max_concurrent_reconciliations: u16,
    /// Namespace the controller runs in
    /// Used to look up credential secrets for cluster issuers
    pub controller_namespace: String,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Reporter name for events and field manager for patches
    pub controller_name: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            issuance_poll_interval_secs: DEFAULT_ISSUANCE_POLL_INTERVAL_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            controller_namespace: DEFAULT_CONTROLLER_NAMESPACE.to_string(),
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
            controller_name: DEFAULT_CONTROLLER_NAME.to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let backoff_min_secs = parse_or(&lookup, "BACKOFF_MIN_SECS", defaults.backoff_min_secs).max(1);
        let backoff_max_secs =
            parse_or(&lookup, "BACKOFF_MAX_SECS", defaults.backoff_max_secs).max(backoff_min_secs);

        Self {
            backoff_min_secs,
            backoff_max_secs,
            issuance_poll_interval_secs: parse_or(
                &lookup,
                "ISSUANCE_POLL_INTERVAL_SECS",
                defaults.issuance_poll_interval_secs,
            ),
            watch_restart_delay_secs: parse_or(
                &lookup,
                "WATCH_RESTART_DELAY_SECS",
                defaults.watch_restart_delay_secs,
            ),
            watch_restart_delay_after_end_secs: parse_or(
                &lookup,
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                defaults.watch_restart_delay_after_end_secs,
            ),
            max_concurrent_reconciliations: parse_or(
                &lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                defaults.max_concurrent_reconciliations,
            ),
            controller_namespace: string_or(&lookup, "POD_NAMESPACE", defaults.controller_namespace),
            log_level: string_or(&lookup, "LOG_LEVEL", defaults.log_level),
            log_format: string_or(&lookup, "LOG_FORMAT", defaults.log_format),
            controller_name: string_or(&lookup, "CONTROLLER_NAME", defaults.controller_name),
        }
    }

    /// Get issuance poll duration
    pub fn issuance_poll_interval(&self) -> Duration {
        Duration::from_secs(self.issuance_poll_interval_secs)
    }

    /// Get watch restart delay duration
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    /// Get watch restart delay after end duration
    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }

    /// Whether logs should be emitted as JSON
    pub fn json_logs(&self) -> bool {
        !self.log_format.eq_ignore_ascii_case("text")
    }
}

/// Parse a variable or return the default
pub(crate) fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read a non-empty string variable or return the default
pub(crate) fn string_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: String,
) -> String {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}
