//! Centralized retry/backoff parameters.
//!
//! Every transport retry loop consults one [`BackoffPolicy`] instead of
//! carrying its own constants, so retry behavior is tuned in exactly one
//! place.

use std::time::Duration;

use pbmedia_core::PipelineConfig;

/// Exponential backoff: `base_delay * multiplier^(retry - 1)` before the
/// `retry`-th re-attempt, up to `max_retries` re-attempts after the initial
/// try.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            multiplier: 2,
        }
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_retries: config.upload_max_retries,
            base_delay: Duration::from_millis(config.upload_base_delay_ms),
            multiplier: config.upload_backoff_multiplier,
        }
    }

    /// Whether another re-attempt is allowed after `retries_so_far` retries.
    pub fn allows_retry(&self, retries_so_far: u32) -> bool {
        retries_so_far < self.max_retries
    }

    /// Delay before the `retry`-th re-attempt (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        self.base_delay * self.multiplier.saturating_pow(exponent)
    }
}
