//! Sift triage engine
//!
//! Decides what should happen to each inbox item: KEEP, REVIEW, ARCHIVE or
//! TRASH. Decisions come from layered, mostly deterministic logic:
//!
//! - **Signals**: pure functions over item metadata, each contributing a
//!   bounded score delta with a human-readable reason
//! - **Tier-1 policy**: thresholds over the aggregated score
//! - **Safety rails**: absolute KEEP rules (starred, known contact, critical
//!   keywords) that override every other layer
//! - **Escalation**: uncertain items may go to an external AI classifier,
//!   subject to a per-user call and cost budget
//!
//! The engine never moves or deletes anything itself; it emits one
//! [`ClassificationResult`] per item for a downstream executor.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sift_engine::{EngineConfig, ItemMetadata, TriagePipeline};
//!
//! let pipeline = TriagePipeline::builder(EngineConfig::default()).build()?;
//! let result = pipeline.classify("user-1", &ItemMetadata::new("msg-1")).await;
//! println!("{} ({:.2})", result.disposition, result.confidence);
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod assembler;
pub mod config;
pub mod escalation;
pub mod metadata;
pub mod pipeline;
pub mod policy;
pub mod safety;
pub mod signals;

pub use assembler::{assemble, ClassificationResult, ReasonEntry};
pub use config::{ConfigError, EngineConfig, PipelineConfig, SafetyConfig};
pub use escalation::{
    AiClassifier, AlertBus, AlertKind, CircuitState, ClassifierError, ClassifierRequest,
    ClassifierResponse, EscalationConfig, EscalationController, EscalationOutcome,
    EscalationStatus, InMemoryLedger, IncrementOutcome, LedgerError, OperatorAlert, RetryPolicy,
    SharedAlertBus, TransientKind, UsageBudget, UsageLedger,
};
pub use metadata::{ItemMetadata, ProviderCategory};
pub use pipeline::{seeded_ledger, Tier1Evaluation, TriagePipeline, TriagePipelineBuilder};
pub use policy::{Disposition, Thresholds, Tier1Policy, TierEvidence, TierResult, TierSource};
pub use safety::{KeywordMatcher, SafetyRailEvaluator, SafetyRule, SafetyVerdict};
pub use signals::{AggregatedScore, Signal, SignalAggregator, SignalConfig, SignalLibrary};
