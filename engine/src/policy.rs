//! Tier-1 decision policy - maps an aggregated score onto a disposition.
//!
//! ```text
//! 0.0 ─── KEEP ───┬── REVIEW ──┬── ARCHIVE ──┬── TRASH ─── 1.0
//!            review_low     archive        trash
//! ```
//!
//! Each boundary is inclusive on its upper side (a score equal to
//! `archive` is ARCHIVE). Only the REVIEW band is ever escalated.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::signals::{AggregatedScore, SignalContribution};

/// Four-way classification outcome, ordered from least to most destructive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Disposition {
    Keep,
    Review,
    Archive,
    Trash,
}

impl Disposition {
    /// Parse a classifier hint such as `"trash"` or `"ARCHIVE"`.
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.trim().to_ascii_uppercase().as_str() {
            "KEEP" => Some(Self::Keep),
            "REVIEW" => Some(Self::Review),
            "ARCHIVE" => Some(Self::Archive),
            "TRASH" | "DELETE" => Some(Self::Trash),
            _ => None,
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keep => write!(f, "KEEP"),
            Self::Review => write!(f, "REVIEW"),
            Self::Archive => write!(f, "ARCHIVE"),
            Self::Trash => write!(f, "TRASH"),
        }
    }
}

/// Which tier produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TierSource {
    #[serde(rename = "TIER1")]
    Tier1,
    #[serde(rename = "TIER2")]
    Tier2,
}

impl std::fmt::Display for TierSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tier1 => write!(f, "TIER1"),
            Self::Tier2 => write!(f, "TIER2"),
        }
    }
}

/// What backs a tier decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TierEvidence {
    /// Tier-1 signal trail.
    Signals(Vec<SignalContribution>),
    /// Tier-2 classifier rationale.
    Rationale(String),
}

/// A tier's provisional decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierResult {
    pub disposition: Disposition,
    /// Tier-1: the aggregated score. Tier-2: the classifier's confidence.
    pub confidence: f64,
    pub source: TierSource,
    pub evidence: TierEvidence,
}

impl TierResult {
    pub fn tier2(disposition: Disposition, confidence: f64, rationale: impl Into<String>) -> Self {
        Self {
            disposition,
            confidence: confidence.clamp(0.0, 1.0),
            source: TierSource::Tier2,
            evidence: TierEvidence::Rationale(rationale.into()),
        }
    }
}

/// Ordered score boundaries. Invariant: `trash > archive > review_low`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub trash: f64,
    pub archive: f64,
    pub review_low: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            trash: 0.85,
            archive: 0.65,
            review_low: 0.25,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("trash", self.trash),
            ("archive", self.archive),
            ("review_low", self.review_low),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "threshold {} = {} must lie within 0.0..=1.0",
                    name, value
                )));
            }
        }
        if !(self.trash > self.archive && self.archive > self.review_low) {
            return Err(ConfigError::Invalid(format!(
                "thresholds must satisfy trash ({}) > archive ({}) > review_low ({})",
                self.trash, self.archive, self.review_low
            )));
        }
        Ok(())
    }
}

/// Threshold mapping from score to Tier-1 disposition.
#[derive(Debug, Clone)]
pub struct Tier1Policy {
    thresholds: Thresholds,
}

impl Tier1Policy {
    pub fn new(thresholds: Thresholds) -> Result<Self, ConfigError> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Band a raw score falls into.
    pub fn band(&self, score: f64) -> Disposition {
        let t = &self.thresholds;
        if score >= t.trash {
            Disposition::Trash
        } else if score >= t.archive {
            Disposition::Archive
        } else if score >= t.review_low {
            Disposition::Review
        } else {
            Disposition::Keep
        }
    }

    pub fn decide(&self, score: &AggregatedScore) -> TierResult {
        TierResult {
            disposition: self.band(score.score()),
            confidence: score.score(),
            source: TierSource::Tier1,
            evidence: TierEvidence::Signals(score.contributions().to_vec()),
        }
    }

    /// Only an uncertain Tier-1 call is a candidate for Tier-2.
    pub fn is_escalation_candidate(result: &TierResult) -> bool {
        result.source == TierSource::Tier1 && result.disposition == Disposition::Review
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> Tier1Policy {
        Tier1Policy::new(Thresholds::default()).unwrap()
    }

    #[test]
    fn test_bands_and_boundaries() {
        let p = policy();
        assert_eq!(p.band(1.0), Disposition::Trash);
        assert_eq!(p.band(0.85), Disposition::Trash);
        assert_eq!(p.band(0.849), Disposition::Archive);
        assert_eq!(p.band(0.65), Disposition::Archive);
        assert_eq!(p.band(0.64), Disposition::Review);
        assert_eq!(p.band(0.25), Disposition::Review);
        assert_eq!(p.band(0.2499), Disposition::Keep);
        assert_eq!(p.band(0.0), Disposition::Keep);
    }

    #[test]
    fn test_destructiveness_ordering() {
        assert!(Disposition::Keep < Disposition::Review);
        assert!(Disposition::Review < Disposition::Archive);
        assert!(Disposition::Archive < Disposition::Trash);
    }

    #[test]
    fn test_misordered_thresholds_rejected() {
        let bad = Thresholds {
            trash: 0.6,
            archive: 0.7,
            review_low: 0.2,
        };
        assert!(Tier1Policy::new(bad).is_err());

        let equal = Thresholds {
            trash: 0.7,
            archive: 0.7,
            review_low: 0.2,
        };
        assert!(equal.validate().is_err());
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let bad = Thresholds {
            trash: 1.2,
            ..Default::default()
        };
        let err = bad.validate().unwrap_err().to_string();
        assert!(err.contains("trash"), "{err}");
    }

    #[test]
    fn test_only_review_is_escalation_candidate() {
        for (d, expected) in [
            (Disposition::Keep, false),
            (Disposition::Review, true),
            (Disposition::Archive, false),
            (Disposition::Trash, false),
        ] {
            let result = TierResult {
                disposition: d,
                confidence: 0.5,
                source: TierSource::Tier1,
                evidence: TierEvidence::Signals(vec![]),
            };
            assert_eq!(Tier1Policy::is_escalation_candidate(&result), expected);
        }

        let tier2 = TierResult::tier2(Disposition::Review, 0.9, "unsure");
        assert!(!Tier1Policy::is_escalation_candidate(&tier2));
    }

    #[test]
    fn test_disposition_hint_parsing_and_serde() {
        assert_eq!(Disposition::from_hint(" trash "), Some(Disposition::Trash));
        assert_eq!(Disposition::from_hint("Archive"), Some(Disposition::Archive));
        assert_eq!(Disposition::from_hint("spam"), None);
        assert_eq!(
            serde_json::to_string(&Disposition::Review).unwrap(),
            "\"REVIEW\""
        );
        assert_eq!(serde_json::to_string(&TierSource::Tier2).unwrap(), "\"TIER2\"");
    }
}
