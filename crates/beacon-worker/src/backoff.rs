//! Retry delay policy.

use std::time::Duration;

use beacon_core::config::DispatchConfig;

/// Decides how long a failed record waits before its next attempt.
pub trait BackoffPolicy: Send + Sync + std::fmt::Debug {
    /// Delay after the `attempts`-th failed attempt (1-based).
    fn delay(&self, attempts: u32) -> Duration;
}

/// Doubling delay from `initial`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    /// Create a policy. `max` is raised to `initial` if smaller.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
        }
    }

    /// Policy from the dispatch configuration.
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(
            Duration::from_millis(config.backoff_initial_ms),
            Duration::from_millis(config.backoff_max_ms),
        )
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, attempts: u32) -> Duration {
        let factor = 1u32 << attempts.saturating_sub(1).min(16);
        self.initial.saturating_mul(factor).min(self.max)
    }
}
