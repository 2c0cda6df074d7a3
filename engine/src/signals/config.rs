//! Signal weights and facet cut-offs.
//!
//! Weights are deployment-time tuning constants. They are loaded once with the
//! rest of the engine config and never change during a run.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Largest absolute weight a single signal may carry.
///
/// Kept strictly below the distance from the neutral baseline to either end
/// of the score range, so no one signal can pin the score to 0.0 or 1.0.
pub const MAX_SIGNAL_WEIGHT: f64 = 0.45;

/// Per-signal score deltas. Positive leans toward TRASH, negative toward KEEP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub promotional_category: f64,
    pub unsubscribe_header: f64,
    pub bulk_transport: f64,
    pub marketing_platform: f64,
    pub subject_pattern: f64,
    pub low_engagement: f64,
    pub high_engagement: f64,
    pub social_category: f64,
    pub recent_arrival: f64,
    pub personal_category: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            promotional_category: 0.30,
            unsubscribe_header: 0.25,
            bulk_transport: 0.15,
            marketing_platform: 0.15,
            subject_pattern: 0.10,
            low_engagement: 0.10,
            high_engagement: -0.15,
            social_category: 0.05,
            recent_arrival: -0.05,
            personal_category: -0.20,
        }
    }
}

impl SignalWeights {
    fn entries(&self) -> [(&'static str, f64); 10] {
        [
            ("promotional_category", self.promotional_category),
            ("unsubscribe_header", self.unsubscribe_header),
            ("bulk_transport", self.bulk_transport),
            ("marketing_platform", self.marketing_platform),
            ("subject_pattern", self.subject_pattern),
            ("low_engagement", self.low_engagement),
            ("high_engagement", self.high_engagement),
            ("social_category", self.social_category),
            ("recent_arrival", self.recent_arrival),
            ("personal_category", self.personal_category),
        ]
    }
}

/// Known bulk-mail and marketing-automation sending domains.
pub const DEFAULT_MARKETING_DOMAINS: &[&str] = &[
    "mailchimp.com",
    "mcsv.net",
    "rsgsv.net",
    "sendgrid.net",
    "mailgun.org",
    "klaviyomail.com",
    "hubspotemail.net",
    "constantcontact.com",
    "exacttarget.com",
    "sailthru.com",
    "mktomail.com",
    "createsend.com",
    "braze.com",
];

/// Discount and urgency phrasing in subject lines (case-insensitive).
pub const DEFAULT_SUBJECT_PATTERNS: &[&str] = &[
    r"\b\d{1,2}\s?%\s?off\b",
    r"\b(?:sale|deals?|discounts?|coupons?|promo code|free shipping|clearance|bogo)\b",
    r"\b(?:last chance|limited time|act now|ends (?:today|tonight|soon)|hurry|don'?t miss|only \d+ left)\b",
];

/// Full signal configuration: weights plus the cut-offs each signal uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Open rate strictly below this counts as low engagement.
    pub low_open_rate: f64,
    /// Open rate at or above this counts as high engagement.
    pub high_open_rate: f64,
    /// Items younger than this many hours are "recent".
    pub recent_hours: f64,
    /// Emoji count in the subject that alone triggers the subject signal.
    pub emoji_threshold: usize,
    pub marketing_domains: Vec<String>,
    pub subject_patterns: Vec<String>,
    pub weights: SignalWeights,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            low_open_rate: 0.10,
            high_open_rate: 0.60,
            recent_hours: 24.0,
            emoji_threshold: 3,
            marketing_domains: DEFAULT_MARKETING_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            subject_patterns: DEFAULT_SUBJECT_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            weights: SignalWeights::default(),
        }
    }
}

impl SignalConfig {
    /// Validate weights and cut-offs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, weight) in self.weights.entries() {
            if !weight.is_finite() || weight.abs() > MAX_SIGNAL_WEIGHT {
                return Err(ConfigError::Invalid(format!(
                    "signal weight {} = {} must be finite and within ±{}",
                    name, weight, MAX_SIGNAL_WEIGHT
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.low_open_rate)
            || !(0.0..=1.0).contains(&self.high_open_rate)
        {
            return Err(ConfigError::Invalid(
                "open rate cut-offs must lie within 0.0..=1.0".to_string(),
            ));
        }
        if self.low_open_rate >= self.high_open_rate {
            return Err(ConfigError::Invalid(format!(
                "low_open_rate ({}) must be below high_open_rate ({})",
                self.low_open_rate, self.high_open_rate
            )));
        }
        if !self.recent_hours.is_finite() || self.recent_hours < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "recent_hours ({}) must be a non-negative number",
                self.recent_hours
            )));
        }
        if self.emoji_threshold == 0 {
            return Err(ConfigError::Invalid(
                "emoji_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
