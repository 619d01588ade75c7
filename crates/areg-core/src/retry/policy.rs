use std::time::Duration;

use crate::config::RetryConfig;

use super::error::FetchError;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Fixed-delay policy: up to `max_retries` additional attempts after the first.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            delay: Duration::from_secs_f64(cfg.delay_secs.max(0.0)),
        }
    }

    /// Maximum number of attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// `attempt` is 1-based (1 = first attempt, which just failed with `err`).
    pub fn decide(&self, attempt: u32, err: &FetchError) -> RetryDecision {
        if !err.is_transient() || attempt >= self.max_attempts() {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.delay)
    }
}
