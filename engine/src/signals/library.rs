//! Signal library - one pure function per metadata facet.
//!
//! Signals form a closed set ([`Signal`]). Each one inspects a single facet of
//! [`ItemMetadata`] and either abstains or returns a [`SignalContribution`]
//! with its configured weight. No signal reads another signal's output.


use regex::{RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};

use super::config::{SignalConfig, SignalWeights};
use crate::config::ConfigError;
use crate::metadata::{ItemMetadata, ProviderCategory};

/// Every signal the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    PromotionalCategory,
    UnsubscribeHeader,
    BulkTransport,
    MarketingPlatform,
    SubjectPattern,
    LowEngagement,
    HighEngagement,
    SocialCategory,
    RecentArrival,
    PersonalCategory,
}

impl Signal {
    /// Evaluation order. Also the order contributions appear in the trail.
    pub const ALL: [Signal; 10] = [
        Signal::PromotionalCategory,
        Signal::UnsubscribeHeader,
        Signal::BulkTransport,
        Signal::MarketingPlatform,
        Signal::SubjectPattern,
        Signal::LowEngagement,
        Signal::HighEngagement,
        Signal::SocialCategory,
        Signal::RecentArrival,
        Signal::PersonalCategory,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::PromotionalCategory => "promotional_category",
            Self::UnsubscribeHeader => "unsubscribe_header",
            Self::BulkTransport => "bulk_transport",
            Self::MarketingPlatform => "marketing_platform",
            Self::SubjectPattern => "subject_pattern",
            Self::LowEngagement => "low_engagement",
            Self::HighEngagement => "high_engagement",
            Self::SocialCategory => "social_category",
            Self::RecentArrival => "recent_arrival",
            Self::PersonalCategory => "personal_category",
        }
    }

    /// Configured score delta for this signal.
    pub fn weight(self, weights: &SignalWeights) -> f64 {
        match self {
            Self::PromotionalCategory => weights.promotional_category,
            Self::UnsubscribeHeader => weights.unsubscribe_header,
            Self::BulkTransport => weights.bulk_transport,
            Self::MarketingPlatform => weights.marketing_platform,
            Self::SubjectPattern => weights.subject_pattern,
            Self::LowEngagement => weights.low_engagement,
            Self::HighEngagement => weights.high_engagement,
            Self::SocialCategory => weights.social_category,
            Self::RecentArrival => weights.recent_arrival,
            Self::PersonalCategory => weights.personal_category,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One signal's bounded contribution to the aggregate score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalContribution {
    pub signal: Signal,
    /// Score delta in -1.0..=1.0.
    pub score_delta: f64,
    /// Human-readable explanation for the audit trail.
    pub reason: String,
}

impl SignalContribution {
    fn new(signal: Signal, weights: &SignalWeights, reason: impl Into<String>) -> Self {
        Self {
            signal,
            score_delta: signal.weight(weights).clamp(-1.0, 1.0),
            reason: reason.into(),
        }
    }
}

/// Compiled signal configuration. Built once per process.
#[derive(Debug, Clone)]
pub struct SignalLibrary {
    config: SignalConfig,
    /// Normalized, deduplicated, in configured order.
    marketing_domains: Vec<String>,
    subject_patterns: RegexSet,
}

impl SignalLibrary {
    pub fn new(config: SignalConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let subject_patterns = RegexSetBuilder::new(&config.subject_patterns)
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::Pattern {
                pattern: config.subject_patterns.join(" | "),
                source,
            })?;

        let mut marketing_domains: Vec<String> = Vec::new();
        for domain in &config.marketing_domains {
            let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
            if !domain.is_empty() && !marketing_domains.contains(&domain) {
                marketing_domains.push(domain);
            }
        }

        Ok(Self {
            config,
            marketing_domains,
            subject_patterns,
        })
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Evaluate one signal. `None` means the signal abstains.
    pub fn evaluate(&self, signal: Signal, metadata: &ItemMetadata) -> Option<SignalContribution> {
        match signal {
            Signal::PromotionalCategory => self.promotional_category(metadata),
            Signal::UnsubscribeHeader => self.unsubscribe_header(metadata),
            Signal::BulkTransport => self.bulk_transport(metadata),
            Signal::MarketingPlatform => self.marketing_platform(metadata),
            Signal::SubjectPattern => self.subject_pattern(metadata),
            Signal::LowEngagement => self.low_engagement(metadata),
            Signal::HighEngagement => self.high_engagement(metadata),
            Signal::SocialCategory => self.social_category(metadata),
            Signal::RecentArrival => self.recent_arrival(metadata),
            Signal::PersonalCategory => self.personal_category(metadata),
        }
    }

    fn contribution(&self, signal: Signal, reason: impl Into<String>) -> SignalContribution {
        SignalContribution::new(signal, &self.config.weights, reason)
    }

    fn promotional_category(&self, m: &ItemMetadata) -> Option<SignalContribution> {
        (m.effective_category()? == ProviderCategory::Promotions).then(|| {
            self.contribution(
                Signal::PromotionalCategory,
                "provider filed the item under promotions",
            )
        })
    }

    fn unsubscribe_header(&self, m: &ItemMetadata) -> Option<SignalContribution> {
        m.has_unsubscribe_header?.then(|| {
            self.contribution(
                Signal::UnsubscribeHeader,
                "machine-generated unsubscribe header present",
            )
        })
    }

    fn bulk_transport(&self, m: &ItemMetadata) -> Option<SignalContribution> {
        m.has_bulk_headers?.then(|| {
            self.contribution(Signal::BulkTransport, "bulk-mail transport headers present")
        })
    }

    /// The most specific (longest) configured domain the sender falls under.
    fn marketing_platform(&self, m: &ItemMetadata) -> Option<SignalContribution> {
        let domain = m.domain()?;
        let platform = self
            .marketing_domains
            .iter()
            .filter(|known| {
                domain == **known
                    || domain
                        .strip_suffix(known.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
            .max_by_key(|known| known.len())?;
        Some(self.contribution(
            Signal::MarketingPlatform,
            format!("sent via marketing platform {}", platform),
        ))
    }

    fn subject_pattern(&self, m: &ItemMetadata) -> Option<SignalContribution> {
        let subject = m.subject.as_deref()?;
        let phrase_hits = self.subject_patterns.matches(subject).iter().count();
        let emoji = count_emoji(subject);

        let reason = match (phrase_hits > 0, emoji >= self.config.emoji_threshold) {
            (true, true) => format!(
                "subject uses discount/urgency phrasing and {} emoji",
                emoji
            ),
            (true, false) => "subject uses discount/urgency phrasing".to_string(),
            (false, true) => format!("subject contains {} emoji", emoji),
            (false, false) => return None,
        };
        Some(self.contribution(Signal::SubjectPattern, reason))
    }

    fn low_engagement(&self, m: &ItemMetadata) -> Option<SignalContribution> {
        let rate = m.open_rate()?;
        (rate < self.config.low_open_rate).then(|| {
            self.contribution(
                Signal::LowEngagement,
                format!("sender open rate {:.0}%", rate * 100.0),
            )
        })
    }

    fn high_engagement(&self, m: &ItemMetadata) -> Option<SignalContribution> {
        let rate = m.open_rate()?;
        (rate >= self.config.high_open_rate).then(|| {
            self.contribution(
                Signal::HighEngagement,
                format!("sender open rate {:.0}%", rate * 100.0),
            )
        })
    }

    fn social_category(&self, m: &ItemMetadata) -> Option<SignalContribution> {
        let category = m.effective_category()?;
        matches!(category, ProviderCategory::Social | ProviderCategory::Forums).then(|| {
            self.contribution(
                Signal::SocialCategory,
                format!("provider filed the item under {}", category),
            )
        })
    }

    fn recent_arrival(&self, m: &ItemMetadata) -> Option<SignalContribution> {
        let age = m.age()?;
        (age < self.config.recent_hours).then(|| {
            self.contribution(
                Signal::RecentArrival,
                format!("arrived {:.1}h ago", age),
            )
        })
    }

    fn personal_category(&self, m: &ItemMetadata) -> Option<SignalContribution> {
        match m.effective_category() {
            Some(ProviderCategory::Personal) => Some(self.contribution(
                Signal::PersonalCategory,
                "provider filed the item as personal",
            )),
            None => Some(self.contribution(
                Signal::PersonalCategory,
                "no provider category assigned",
            )),
            Some(_) => None,
        }
    }
}

fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F300..=0x1F5FF // symbols & pictographs
            | 0x1F600..=0x1F64F // emoticons
            | 0x1F680..=0x1F6FF // transport & map
            | 0x1F900..=0x1F9FF // supplemental symbols
            | 0x1FA70..=0x1FAFF
            | 0x2600..=0x26FF // misc symbols
            | 0x2700..=0x27BF // dingbats
            | 0x1F1E6..=0x1F1FF // regional indicators
    )
}

fn count_emoji(text: &str) -> usize {
    text.chars().filter(|c| is_emoji(*c)).count()
}
