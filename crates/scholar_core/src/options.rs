use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Upper bound for the delay between two attempts on the same URL.
pub const MAX_BACKOFF_MS: u64 = 10_000;

const BASE_BACKOFF_MS: u64 = 1_000;

/// Per-job knobs supplied with the URL list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    /// Pause between two URLs, in milliseconds.
    pub rate_limit_ms: u64,
    /// Total attempts per URL, first try included.
    pub max_retries: u32,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            rate_limit_ms: 3_000,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionsError {
    #[error("max_retries must be at least 1")]
    ZeroRetries,
}

impl JobOptions {
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.max_retries == 0 {
            return Err(OptionsError::ZeroRetries);
        }
        Ok(())
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }
}

/// Delay to wait after failed attempt `attempt` (1-based) before the next one:
/// `min(1000 * 2^(attempt-1), 10000)` milliseconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let millis = BASE_BACKOFF_MS
        .saturating_mul(1u64 << exponent)
        .min(MAX_BACKOFF_MS);
    Duration::from_millis(millis)
}
