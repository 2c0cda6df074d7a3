//! Safety rail evaluation - hard KEEP rules that override any score.
//!
//! Rules run in a fixed order and the first match wins:
//!
//! ```text
//! starred / important  →  known contact  →  critical keyword  →  clear
//! ```
//!
//! The evaluator reads raw metadata only. It never looks at the aggregated
//! score or at a Tier-2 answer, and it has no notion of confidence.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::keywords::KeywordMatcher;
use crate::metadata::ItemMetadata;

/// The hard rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyRule {
    StarredOrImportant,
    KnownContact,
    CriticalKeyword,
}

impl SafetyRule {
    pub const ORDER: [SafetyRule; 3] = [
        SafetyRule::StarredOrImportant,
        SafetyRule::KnownContact,
        SafetyRule::CriticalKeyword,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::StarredOrImportant => "starred_or_important",
            Self::KnownContact => "known_contact",
            Self::CriticalKeyword => "critical_keyword",
        }
    }
}

impl std::fmt::Display for SafetyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of the safety pass. `triggered` forces a KEEP disposition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub triggered: bool,
    pub rule: Option<SafetyRule>,
    pub reason: Option<String>,
}

impl SafetyVerdict {
    /// No rule fired.
    pub fn clear() -> Self {
        Self::default()
    }

    pub fn fired(rule: SafetyRule, reason: impl Into<String>) -> Self {
        Self {
            triggered: true,
            rule: Some(rule),
            reason: Some(reason.into()),
        }
    }

    pub fn rule_name(&self) -> Option<&'static str> {
        self.rule.map(SafetyRule::name)
    }
}

/// Evaluates the hard rules for one item.
#[derive(Debug, Clone)]
pub struct SafetyRailEvaluator {
    keywords: KeywordMatcher,
}

impl SafetyRailEvaluator {
    pub fn new(keywords: KeywordMatcher) -> Self {
        Self { keywords }
    }

    pub fn keywords(&self) -> &KeywordMatcher {
        &self.keywords
    }

    pub fn evaluate(&self, metadata: &ItemMetadata) -> SafetyVerdict {
        let verdict = SafetyRule::ORDER
            .iter()
            .find_map(|rule| self.check(*rule, metadata))
            .unwrap_or_else(SafetyVerdict::clear);

        if verdict.triggered {
            debug!(
                item = %metadata.item_id,
                rule = verdict.rule_name().unwrap_or_default(),
                "Safety rail fired"
            );
        }
        verdict
    }

    fn check(&self, rule: SafetyRule, m: &ItemMetadata) -> Option<SafetyVerdict> {
        match rule {
            SafetyRule::StarredOrImportant => m
                .is_flagged()
                .then(|| SafetyVerdict::fired(rule, "item is starred or marked important")),
            SafetyRule::KnownContact => (m.known_contact == Some(true)).then(|| {
                SafetyVerdict::fired(rule, "sender is in the user's contacts")
            }),
            SafetyRule::CriticalKeyword => {
                let fields = [
                    ("subject", m.subject.as_deref()),
                    ("snippet", m.snippet.as_deref()),
                ];
                let (field, hit) = fields
                    .into_iter()
                    .find_map(|(field, text)| Some((field, self.keywords.find(text?)?)))?;
                Some(SafetyVerdict::fired(
                    rule,
                    format!(
                        "{} contains critical keyword \"{}\" (matched \"{}\")",
                        field, hit.keyword, hit.matched
                    ),
                ))
            }
        }
    }
}
