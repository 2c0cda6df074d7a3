//! Bounded retry with exponential backoff for classifier calls.
//!
//! ```text
//! attempt 1 ──fail──▶ sleep base ──▶ attempt 2 ──fail──▶ sleep 2·base ──▶ attempt 3
//!     │                                  │                                   │
//!     └─ ok / permanent: stop            └─ ok / permanent: stop             └─ give up
//! ```
//!
//! Every attempt runs under its own timeout; an elapsed timeout counts as a
//! transient failure.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::classifier::ClassifierError;
use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Upper bound on a single classifier call.
    pub attempt_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2_000,
            attempt_timeout_ms: 10_000,
        }
    }
}

/// Result of a retried operation plus how many attempts it took.
#[derive(Debug)]
pub struct RetryReport<T> {
    pub outcome: Result<T, ClassifierError>,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "retry.attempt_timeout_ms must be positive".to_string(),
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.max_delay_ms ({}) must not be below retry.base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        Ok(())
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Backoff after the `attempt`-th failure (1-based): base doubled per
    /// failure, capped at `max_delay_ms`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let millis = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. Nothing is retried after a
    /// permanent failure.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> RetryReport<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ClassifierError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.attempt_timeout(), op(attempt)).await {
                Ok(result) => result,
                Err(_) => Err(ClassifierError::timeout(format!(
                    "no answer within {}ms",
                    self.attempt_timeout_ms
                ))),
            };

            match result {
                Ok(value) => {
                    return RetryReport {
                        outcome: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(err @ ClassifierError::Permanent(_)) => {
                    return RetryReport {
                        outcome: Err(err),
                        attempts: attempt,
                    }
                }
                Err(err) if attempt >= max_attempts => {
                    return RetryReport {
                        outcome: Err(err),
                        attempts: attempt,
                    }
                }
                Err(err) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient classifier failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
