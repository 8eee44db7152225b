//! crates/book_alchemist_core/src/retry.rs
//!
//! The backoff policy for turns inside the automatic loop, as a pure decision.

use std::time::Duration;

use crate::ports::PortError;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    Propagate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts in total, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1500),
        }
    }
}

impl RetryPolicy {
    /// Decides after the `attempt`-th failure (1-based).
    ///
    /// Only rate-limit failures are retried, and never after the last allowed
    /// attempt. The delay doubles with each retry.
    pub fn decide(&self, attempt: u32, error: &PortError) -> RetryDecision {
        if !error.is_rate_limit() || attempt >= self.max_attempts {
            return RetryDecision::Propagate;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        RetryDecision::RetryAfter(self.initial_delay.saturating_mul(factor))
    }
}
