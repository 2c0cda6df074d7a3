//! Circuit breaker tracking Tier-2 classifier reachability.
//!
//! Consecutive exhausted escalations (every retry failed) trip the circuit
//! *open*; escalation is skipped until a cooldown passes, after which the
//! circuit goes *half-open* and admits exactly one trial call. A permanent
//! failure *latches* the circuit: it stays open until an operator calls
//! [`CircuitBreaker::reset`].
//!
//! A trial call that never reports back (its task was cancelled) is
//! forgotten after another cooldown, so the circuit cannot wedge half-open.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Healthy: calls allowed.
    Closed,
    /// Tripped: calls blocked until cooldown expires.
    Open,
    /// Cooldown expired: one trial call is allowed.
    HalfOpen,
    /// Permanent failure seen: blocked until reset.
    Latched,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
            Self::Latched => write!(f, "latched"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    latched: Option<String>,
    /// When the half-open trial call was admitted, while it is outstanding.
    trial_started: Option<Instant>,
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Time after the last failure before Open → HalfOpen.
    pub cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            consecutive_failures: 0,
            last_failure: None,
            latched: None,
            trial_started: None,
            failure_threshold: failure_threshold.max(1),
            cooldown,
        }
    }

    /// Record a success. Closes the circuit unless it is latched.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_failure = None;
        self.trial_started = None;
    }

    /// Record an exhausted escalation. May trip the circuit open.
    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(Instant::now());
        self.trial_started = None;
    }

    /// Hold the circuit open until [`reset`](Self::reset).
    pub fn latch(&mut self, reason: impl Into<String>) {
        self.latched = Some(reason.into());
        self.trial_started = None;
    }

    /// Operator reset: clear the latch and all failure history.
    pub fn reset(&mut self) {
        self.latched = None;
        self.record_success();
    }

    pub fn latch_reason(&self) -> Option<&str> {
        self.latched.as_deref()
    }

    pub fn state(&self) -> CircuitState {
        if self.latched.is_some() {
            return CircuitState::Latched;
        }
        if self.consecutive_failures < self.failure_threshold {
            return CircuitState::Closed;
        }
        match self.last_failure {
            Some(at) if at.elapsed() < self.cooldown => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    /// Whether a call would be admitted right now: Closed, or HalfOpen with
    /// no trial call outstanding.
    pub fn is_available(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => !self.trial_in_flight(),
            CircuitState::Open | CircuitState::Latched => false,
        }
    }

    /// Admit one call. In HalfOpen only the first caller gets through until
    /// it records a success or failure.
    pub fn try_admit(&mut self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::HalfOpen if !self.trial_in_flight() => {
                self.trial_started = Some(Instant::now());
                true
            }
            _ => false,
        }
    }

    fn trial_in_flight(&self) -> bool {
        self.trial_started.is_some_and(|at| at.elapsed() < self.cooldown)
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_starts_closed() {
        let cb = CircuitBreaker::default();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_opens_after_threshold() {
        let mut cb = CircuitBreaker::new(2, Duration::from_secs(30));
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_after_cooldown() {
        let mut cb = CircuitBreaker::new(1, Duration::from_secs(30));
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.is_available());

        // Failed trial re-opens for a fresh cooldown.
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_single_trial() {
        let mut cb = CircuitBreaker::new(1, Duration::from_secs(30));
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(31)).await;

        assert!(cb.try_admit());
        assert!(!cb.try_admit());
        assert!(!cb.is_available());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        assert!(cb.try_admit());
        assert!(cb.try_admit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_trial_expires() {
        let mut cb = CircuitBreaker::new(1, Duration::from_secs(30));
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(cb.try_admit());

        // The trial never reports back.
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(cb.is_available());
        assert!(cb.try_admit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latched_never_admits() {
        let mut cb = CircuitBreaker::default();
        cb.latch("403 forbidden");
        assert!(!cb.try_admit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_circuit() {
        let mut cb = CircuitBreaker::new(1, Duration::from_secs(30));
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latch_survives_cooldown_and_success() {
        let mut cb = CircuitBreaker::new(3, Duration::from_secs(1));
        cb.latch("401 unauthorized");
        tokio::time::advance(Duration::from_secs(3600)).await;
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Latched);
        assert_eq!(cb.latch_reason(), Some("401 unauthorized"));

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.latch_reason().is_none());
    }
}
