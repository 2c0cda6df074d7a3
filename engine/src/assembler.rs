//! Final decision assembly.
//!
//! Combines the winning tier result with the safety verdict. A triggered
//! safety rail always yields KEEP, whatever either tier said.

use serde::{Deserialize, Serialize};

use crate::escalation::EscalationStatus;
use crate::policy::{Disposition, TierEvidence, TierResult, TierSource};
use crate::safety::SafetyVerdict;

/// One line of the human-readable explanation behind a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReasonEntry {
    Signal {
        signal: String,
        score_delta: f64,
        reason: String,
    },
    Tier2 {
        rationale: String,
    },
    Escalation {
        status: String,
    },
    SafetyRail {
        rule: String,
        reason: String,
    },
}

impl std::fmt::Display for ReasonEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Signal {
                signal,
                score_delta,
                reason,
            } => write!(f, "[signal] {} {:+.2}: {}", signal, score_delta, reason),
            Self::Tier2 { rationale } => write!(f, "[tier2] {}", rationale),
            Self::Escalation { status } => write!(f, "[escalation] {}", status),
            Self::SafetyRail { rule, reason } => write!(f, "[safety] {}: {}", rule, reason),
        }
    }
}

/// Final, authoritative classification for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub item_id: String,
    pub disposition: Disposition,
    pub confidence: f64,
    pub contributing_tier: TierSource,
    pub safety_override_applied: bool,
    pub escalation: EscalationStatus,
    pub reason_trail: Vec<ReasonEntry>,
}

impl ClassificationResult {
    /// Whether the final disposition removes the item from the inbox.
    pub fn is_destructive(&self) -> bool {
        self.disposition >= Disposition::Archive
    }
}

/// Build the final result. Pure and total.
pub fn assemble(
    item_id: &str,
    tier: TierResult,
    safety: &SafetyVerdict,
    escalation: EscalationStatus,
) -> ClassificationResult {
    let mut reason_trail: Vec<ReasonEntry> = match tier.evidence {
        TierEvidence::Signals(contributions) => contributions
            .into_iter()
            .map(|c| ReasonEntry::Signal {
                signal: c.signal.name().to_string(),
                score_delta: c.score_delta,
                reason: c.reason,
            })
            .collect(),
        TierEvidence::Rationale(rationale) => vec![ReasonEntry::Tier2 { rationale }],
    };

    if escalation != EscalationStatus::NotEligible {
        reason_trail.push(ReasonEntry::Escalation {
            status: escalation.to_string(),
        });
    }

    let (disposition, confidence) = if safety.triggered {
        reason_trail.push(ReasonEntry::SafetyRail {
            rule: safety.rule_name().unwrap_or("unknown").to_string(),
            reason: safety.reason.clone().unwrap_or_default(),
        });
        (Disposition::Keep, 1.0)
    } else {
        (tier.disposition, tier.confidence)
    };

    ClassificationResult {
        item_id: item_id.to_string(),
        disposition,
        confidence,
        contributing_tier: tier.source,
        safety_override_applied: safety.triggered,
        escalation,
        reason_trail,
    }
}
