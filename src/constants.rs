//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for health probes
pub const DEFAULT_PROBE_PORT: u16 = 8081;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default Fibonacci backoff minimum for reconciliation errors (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default Fibonacci backoff maximum for reconciliation errors (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay between polls while AWS Private CA is still issuing (seconds)
pub const DEFAULT_ISSUANCE_POLL_INTERVAL_SECS: u64 = 2;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Default watch stream backoff after 429 responses (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_START_MS: u64 = 1000;

/// Maximum watch stream backoff after 429 responses (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_MAX_MS: u64 = 30_000;

/// Default limit on concurrent reconciliations
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Namespace assumed when `POD_NAMESPACE` is not set
pub const DEFAULT_CONTROLLER_NAMESPACE: &str = "aws-privateca-issuer";

/// Name the controller reports events and field-manager patches under
pub const DEFAULT_CONTROLLER_NAME: &str = "awspca-issuer";
