//! Signal aggregation - sums every applicable signal into one bounded score.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::library::{Signal, SignalContribution, SignalLibrary};
use crate::metadata::ItemMetadata;

/// Score every item starts from before any signal is applied.
pub const NEUTRAL_BASELINE: f64 = 0.5;

/// Aggregated Tier-1 score for one item.
///
/// Built once by [`SignalAggregator::aggregate`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedScore {
    score: f64,
    contributions: Vec<SignalContribution>,
}

impl AggregatedScore {
    /// Score clamped to 0.0–1.0. Higher leans toward TRASH.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Contributions in evaluation order.
    pub fn contributions(&self) -> &[SignalContribution] {
        &self.contributions
    }

    /// Whether a given signal contributed.
    pub fn fired(&self, signal: Signal) -> bool {
        self.contributions.iter().any(|c| c.signal == signal)
    }

    /// Unclamped baseline + sum of deltas.
    pub fn raw_sum(&self) -> f64 {
        NEUTRAL_BASELINE + self.contributions.iter().map(|c| c.score_delta).sum::<f64>()
    }

    pub fn into_contributions(self) -> Vec<SignalContribution> {
        self.contributions
    }
}

/// Runs the full signal library over an item.
#[derive(Debug, Clone)]
pub struct SignalAggregator {
    library: SignalLibrary,
}

impl SignalAggregator {
    pub fn new(library: SignalLibrary) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &SignalLibrary {
        &self.library
    }

    /// Evaluate every signal and fold the deltas into a clamped score.
    ///
    /// Signals are visited in [`Signal::ALL`] order and summed left to right,
    /// so identical metadata always yields a bit-identical score and trail.
    pub fn aggregate(&self, metadata: &ItemMetadata) -> AggregatedScore {
        let contributions: Vec<SignalContribution> = Signal::ALL
            .iter()
            .filter_map(|signal| self.library.evaluate(*signal, metadata))
            .collect();

        let raw = contributions
            .iter()
            .fold(NEUTRAL_BASELINE, |acc, c| acc + c.score_delta);
        let score = raw.clamp(0.0, 1.0);

        debug!(
            item = %metadata.item_id,
            score,
            raw,
            signals = contributions.len(),
            "Aggregated signals"
        );

        AggregatedScore {
            score,
            contributions,
        }
    }
}
