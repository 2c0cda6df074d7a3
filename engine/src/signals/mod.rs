//! Tier-1 signals
//!
//! - [`library`]: the closed set of per-facet signal functions
//! - [`aggregator`]: folds contributions into one clamped score
//! - [`config`]: weights and cut-offs

pub mod aggregator;
pub mod config;
pub mod library;

pub use aggregator::{AggregatedScore, SignalAggregator, NEUTRAL_BASELINE};
pub use config::{SignalConfig, SignalWeights, MAX_SIGNAL_WEIGHT};
pub use library::{Signal, SignalContribution, SignalLibrary};
