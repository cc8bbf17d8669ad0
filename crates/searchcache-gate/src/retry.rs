//! Retry policy for the external search call

use std::time::Duration;

/// Upper bound for a single backoff delay
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Exponential backoff between search attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure
    pub retries: u32,
    /// Delay before the first retry; doubled for each one after
    pub initial_backoff: Duration,
    /// Cap on any single delay
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retries
    #[must_use]
    pub fn none() -> Self {
        Self {
            retries: 0,
            initial_backoff: Duration::from_millis(500),
            max_backoff: MAX_BACKOFF,
        }
    }

    /// `retries` extra attempts starting at `initial_backoff`
    #[must_use]
    pub fn exponential(retries: u32, initial_backoff: Duration) -> Self {
        Self {
            retries,
            initial_backoff,
            max_backoff: MAX_BACKOFF,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        std::cmp::min(
            self.initial_backoff.saturating_mul(factor),
            self.max_backoff,
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
