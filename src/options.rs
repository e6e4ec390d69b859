use std::time::Duration;

use crate::{MetrikaError, Result};

/// Configures HTTP timeout and retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Base retry delay in milliseconds (linear strategy).
    pub retry_delay_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_attempts: 3,
            retry_delay_ms: 1_000,
        }
    }
}

impl ClientOptions {
    /// Checks that every field is positive.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(MetrikaError::Configuration(
                "timeout_ms must be greater than zero".to_owned(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(MetrikaError::Configuration(
                "max_attempts must be at least 1".to_owned(),
            ));
        }
        if self.retry_delay_ms == 0 {
            return Err(MetrikaError::Configuration(
                "retry_delay_ms must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay slept after the given failed attempt (1-based).
    pub(crate) fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(u64::from(attempt)))
    }
}
