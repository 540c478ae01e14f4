use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Whether reads fall back to less specific scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultingStrategy {
    /// Only the exact scope of the query is consulted.
    #[default]
    None,
    /// Strip parameters (most recently supplied first) until a scope has an
    /// active value, ending at the unparameterized scope.
    Lookup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub defaulting_strategy: DefaultingStrategy,
    /// Attempts for an optimistic write or activation before giving up.
    pub max_write_retries: u32,
    /// First backoff after a conflicted attempt; doubles on each further one.
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            defaulting_strategy: DefaultingStrategy::None,
            max_write_retries: 16,
            retry_base_delay_ms: 1,
            retry_max_delay_ms: 50,
            busy_timeout_ms: 5_000,
        }
    }
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_write_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_write_retries == 0 {
            return Err(EngineError::InvalidConfig(
                "max_write_retries must be at least 1".into(),
            ));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(EngineError::InvalidConfig(format!(
                "retry_base_delay_ms ({}) exceeds retry_max_delay_ms ({})",
                self.retry_base_delay_ms, self.retry_max_delay_ms
            )));
        }
        Ok(())
    }
}

/// How conflicted optimistic attempts are repeated: up to `max_attempts`
/// tries, sleeping with exponential backoff between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Retry without sleeping.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Sleep after the `attempt`-th conflicted try (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}
