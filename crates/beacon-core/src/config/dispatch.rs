//! Event dispatch configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Dispatch coordinator configuration.
///
/// `max_attempts`, `backoff_initial_ms` and `backoff_max_ms` are required:
/// there is no product-approved retry policy to fall back on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum number of records handed to the transport per flush.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Interval in seconds between timer-driven flushes.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Dispatch attempts before a record is dropped and reported.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub backoff_initial_ms: u64,
    /// Upper bound for the retry delay, in milliseconds.
    pub backoff_max_ms: u64,
    /// Keep delivered records (status Success) until the retention sweep.
    #[serde(default)]
    pub retain_delivered: bool,
}

impl DispatchConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.batch_size == 0 {
            return Err(AppError::configuration("dispatch.batch_size must be > 0"));
        }
        if self.poll_interval_seconds == 0 {
            return Err(AppError::configuration(
                "dispatch.poll_interval_seconds must be > 0",
            ));
        }
        if self.max_attempts == 0 {
            return Err(AppError::configuration("dispatch.max_attempts must be > 0"));
        }
        if self.backoff_initial_ms > self.backoff_max_ms {
            return Err(AppError::configuration(
                "dispatch.backoff_initial_ms must not exceed dispatch.backoff_max_ms",
            ));
        }
        Ok(())
    }
}

fn default_batch_size() -> u32 {
    50
}

fn default_poll_interval() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn config() -> DispatchConfig {
        DispatchConfig {
            batch_size: default_batch_size(),
            poll_interval_seconds: default_poll_interval(),
            max_attempts: 3,
            backoff_initial_ms: 1_000,
            backoff_max_ms: 60_000,
            retain_delivered: false,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_zero_poll_interval_is_invalid() {
        let config = DispatchConfig {
            poll_interval_seconds: 0,
            ..config()
        };
        let err = config.validate().unwrap_err();
        assert!(err.is(ErrorKind::Configuration));
        assert!(err.message.contains("poll_interval_seconds"));
    }
}
