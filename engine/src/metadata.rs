//! Item metadata - the normalized record handed over by ingestion.
//!
//! The engine only ever reads this record. Every facet other than the item id
//! is optional: ingestion fills in what the provider exposes and signals
//! abstain on whatever is missing.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Provider-assigned inbox category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderCategory {
    Personal,
    Promotions,
    Social,
    Updates,
    Forums,
}

impl ProviderCategory {
    /// Parse a provider label such as `CATEGORY_PROMOTIONS` or `promotional`.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        let bare = normalized
            .strip_prefix("category_")
            .unwrap_or(normalized.as_str());
        match bare {
            "personal" | "primary" => Some(Self::Personal),
            "promotions" | "promotional" | "promo" => Some(Self::Promotions),
            "social" => Some(Self::Social),
            "updates" => Some(Self::Updates),
            "forums" => Some(Self::Forums),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Personal => write!(f, "personal"),
            Self::Promotions => write!(f, "promotions"),
            Self::Social => write!(f, "social"),
            Self::Updates => write!(f, "updates"),
            Self::Forums => write!(f, "forums"),
        }
    }
}

/// Normalized metadata for one inbound item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemMetadata {
    /// Provider message id, carried through to the result.
    pub item_id: String,
    /// Raw `From` address (may include a display name).
    pub sender_address: Option<String>,
    /// Sender domain, when ingestion already extracted it.
    pub sender_domain: Option<String>,
    pub subject: Option<String>,
    /// Short body preview supplied by the provider.
    pub snippet: Option<String>,
    pub category: Option<ProviderCategory>,
    /// `List-Unsubscribe` (or equivalent machine-generated) header present.
    pub has_unsubscribe_header: Option<bool>,
    /// Bulk transport headers present (`Precedence: bulk`, `List-Id`, ...).
    pub has_bulk_headers: Option<bool>,
    /// Historical open rate for this sender (0.0–1.0).
    pub sender_open_rate: Option<f64>,
    pub starred: Option<bool>,
    pub important: Option<bool>,
    /// Sender appears in the user's contacts.
    pub known_contact: Option<bool>,
    /// Hours since receipt, as computed by ingestion.
    pub age_hours: Option<f64>,
    /// Arbitrary provider label set.
    pub labels: BTreeSet<String>,
}

impl ItemMetadata {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            ..Default::default()
        }
    }

    /// Lowercased sender domain, derived from the address when not explicit.
    pub fn domain(&self) -> Option<String> {
        if let Some(domain) = self.sender_domain.as_deref() {
            let domain = domain.trim().trim_start_matches('@').to_ascii_lowercase();
            if !domain.is_empty() {
                return Some(domain);
            }
        }

        let address = self.sender_address.as_deref()?;
        // "Shop <news@shop.example>" -> "news@shop.example"
        let address = match (address.rfind('<'), address.rfind('>')) {
            (Some(start), Some(end)) if start < end => &address[start + 1..end],
            _ => address,
        };
        let (_, domain) = address.trim().rsplit_once('@')?;
        let domain = domain.trim().to_ascii_lowercase();
        (!domain.is_empty()).then_some(domain)
    }

    /// Explicit category, falling back to a `CATEGORY_*` provider label.
    pub fn effective_category(&self) -> Option<ProviderCategory> {
        self.category.or_else(|| {
            self.labels
                .iter()
                .filter(|l| l.to_ascii_uppercase().starts_with("CATEGORY_"))
                .find_map(|l| ProviderCategory::from_label(l))
        })
    }

    /// Starred or important, either as flags or as provider labels.
    pub fn is_flagged(&self) -> bool {
        self.starred == Some(true)
            || self.important == Some(true)
            || self.has_label("STARRED")
            || self.has_label("IMPORTANT")
    }

    /// Open rate, ignoring values outside 0.0–1.0.
    pub fn open_rate(&self) -> Option<f64> {
        self.sender_open_rate
            .filter(|r| r.is_finite() && (0.0..=1.0).contains(r))
    }

    /// Age in hours, ignoring negative or non-finite values.
    pub fn age(&self) -> Option<f64> {
        self.age_hours.filter(|h| h.is_finite() && *h >= 0.0)
    }

    fn has_label(&self, wanted: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(wanted))
    }
}
