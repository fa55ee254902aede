//! Pacing for the agent loop.
//!
//! `IterationDelay` throttles whole iterations: it grows logarithmically with
//! the iteration count and never exceeds its ceiling. `RetryPolicy` spaces out
//! retries of a single model call with capped exponential backoff.

use std::time::Duration;

use crate::config::PacingConfig;

/// Sleep between iterations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationDelay {
    base: Duration,
    ceiling: Duration,
}

impl IterationDelay {
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self {
            base: base.min(ceiling),
            ceiling,
        }
    }

    /// No delay at all
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn from_config(pacing: &PacingConfig) -> Self {
        Self::new(
            Duration::from_millis(pacing.base_delay_ms),
            Duration::from_millis(pacing.max_delay_ms),
        )
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// `base * (1 + ln(1 + iteration))`, capped at the ceiling
    pub fn delay_for(&self, iteration: u64) -> Duration {
        let factor = 1.0 + (1.0 + iteration as f64).ln();
        let millis = self.base.as_millis() as f64 * factor;
        let capped = millis.min(self.ceiling.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Retry schedule for retryable model-call failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base: Duration, max: Duration) -> Self {
        Self { max_retries, base, max }
    }

    /// Never retry
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    pub fn from_config(pacing: &PacingConfig) -> Self {
        Self::new(
            pacing.service_retries,
            Duration::from_millis(pacing.retry_base_ms),
            Duration::from_millis(pacing.retry_max_ms),
        )
    }

    /// Wait before retry number `attempt` (0-based).
    ///
    /// `2^attempt * base` capped at `max`; a server-supplied `retry_after`
    /// wins when it is longer.
    pub fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exp = self.base.saturating_mul(2u32.saturating_pow(attempt.min(16)));
        let delay = exp.min(self.max);
        match retry_after {
            Some(after) => delay.max(after),
            None => delay,
        }
    }
}
