use std::time::Duration;

use crate::config::HlsdmConfig;
use crate::download::Failure;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Item is terminal with this failure.
    NoRetry,
    /// Re-dispatch the item after the given delay.
    RetryAfter(Duration),
}

/// Fixed-count, fixed-delay policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (so up to `max_retries + 1` attempts).
    pub max_retries: u32,
    /// Delay before every re-dispatch.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &HlsdmConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            delay: cfg.retry_delay(),
        }
    }

    /// `retry_count` is the number of retries already spent on the item.
    pub fn decide(&self, retry_count: u32, failure: &Failure) -> RetryDecision {
        if failure.is_cancelled() || retry_count >= self.max_retries {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.delay)
    }
}
