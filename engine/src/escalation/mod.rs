//! Tier-2 escalation - budgeted, retried calls to an external AI classifier.
//!
//! # Escalation Path
//!
//! ```text
//! Tier-1 REVIEW
//!     │
//!     ├─ breaker closed? budget headroom?
//!     │
//!     ▼
//! AiClassifier (minimized payload) ── transient ──▶ retry w/ backoff
//!     │                              └ permanent ──▶ operator alert + latch
//!     ▼
//! UsageLedger::increment_if_below_cap ──▶ Tier-2 result
//! ```
//!
//! Any failure along the path leaves the Tier-1 result standing.

pub mod alerts;
pub mod breaker;
pub mod budget;
pub mod classifier;
pub mod controller;
pub mod retry;

pub use alerts::{AlertBus, AlertKind, OperatorAlert, SharedAlertBus};
pub use breaker::{CircuitBreaker, CircuitState};
pub use budget::{IncrementOutcome, InMemoryLedger, LedgerError, UsageBudget, UsageLedger};
pub use classifier::{
    AiClassifier, ClassifierError, ClassifierRequest, ClassifierResponse, TransientKind,
};
pub use controller::{
    EscalationConfig, EscalationController, EscalationOutcome, EscalationStatus,
};
pub use retry::{RetryPolicy, RetryReport};
