//! # Duration Parsing
//!
//! Handles the Go duration strings cert-manager writes into `spec.duration`.

use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// Lifetime used when a request does not set `spec.duration` (cert-manager's default)
pub const DEFAULT_CERTIFICATE_DURATION: Duration = Duration::from_secs(90 * 24 * 3600);

static FULL_DURATION: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(\d+(\.\d+)?(h|ms|m|s))+$"));

static DURATION_PART: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?P<number>\d+(\.\d+)?)(?P<unit>h|ms|m|s)"));

/// Parse a Go duration string into std::time::Duration
/// Supports formats: "2160h0m0s", "90m", "1h30m", "1.5h", "500ms"
pub fn parse_go_duration(duration_str: &str) -> Result<Duration> {
    let trimmed = duration_str.trim();

    if trimmed.is_empty() {
        return Err(anyhow::anyhow!("Duration string cannot be empty"));
    }

    let full = FULL_DURATION
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;
    let part = DURATION_PART
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;

    if !full.is_match(trimmed) {
        return Err(anyhow::anyhow!(
            "Invalid duration format '{}'. Expected Go duration (e.g., '2160h0m0s', '90m')",
            trimmed
        ));
    }

    let mut total_secs = 0f64;
    for captures in part.captures_iter(trimmed) {
        let number: f64 = captures["number"].parse().map_err(|e| {
            anyhow::anyhow!("Invalid duration number in '{}': {}", trimmed, e)
        })?;
        total_secs += match &captures["unit"] {
            "h" => number * 3600.0,
            "m" => number * 60.0,
            "s" => number,
            "ms" => number / 1000.0,
            unit => {
                return Err(anyhow::anyhow!(
                    "Invalid unit '{}' in duration '{}'",
                    unit,
                    trimmed
                ))
            }
        };
    }

    if total_secs <= 0.0 {
        return Err(anyhow::anyhow!(
            "Duration must be greater than 0, got '{}'",
            trimmed
        ));
    }

    Duration::try_from_secs_f64(total_secs)
        .map_err(|e| anyhow::anyhow!("Duration '{}' is out of range: {}", trimmed, e))
}
