//! Tier-2 classifier boundary.
//!
//! The external AI classifier sees a minimized payload only: sender domain,
//! subject and a truncated snippet. Its failures come in exactly two kinds:
//!
//! | Kind      | Examples                                   | Retried |
//! |-----------|--------------------------------------------|---------|
//! | Transient | timeout, rate limit, transport error       | yes     |
//! | Permanent | bad credentials, bad endpoint, bad answers | no      |

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::ItemMetadata;
use crate::policy::Disposition;

/// Minimized request payload. Never carries full message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierRequest {
    pub sender_domain: String,
    pub subject: String,
    pub snippet: String,
}

impl ClassifierRequest {
    /// Build the payload from metadata, truncating the snippet to
    /// `snippet_max_chars` characters.
    pub fn minimized(metadata: &ItemMetadata, snippet_max_chars: usize) -> Self {
        let snippet = metadata.snippet.as_deref().unwrap_or_default();
        Self {
            sender_domain: metadata.domain().unwrap_or_default(),
            subject: metadata.subject.clone().unwrap_or_default(),
            snippet: truncate_chars(snippet.trim(), snippet_max_chars),
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// A successful classifier answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierResponse {
    pub disposition: Disposition,
    /// Classifier confidence in `disposition`, 0.0–1.0.
    pub confidence: f64,
    pub rationale: String,
    /// Cost reported by the backend. Falls back to the configured per-call
    /// price when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<BigDecimal>,
}

impl ClassifierResponse {
    /// Reject answers that violate the response contract.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(ClassifierError::Permanent(format!(
                "classifier returned confidence {} outside 0.0..=1.0",
                self.confidence
            )));
        }
        if let Some(cost) = &self.cost {
            if cost < &BigDecimal::from(0) {
                return Err(ClassifierError::Permanent(format!(
                    "classifier reported negative cost {}",
                    cost
                )));
            }
        }
        Ok(())
    }
}

/// Flavour of a transient failure. All are handled identically by the retry
/// policy; the kind is kept for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientKind {
    Timeout,
    RateLimited,
    Transport,
}

impl std::fmt::Display for TransientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Transport => write!(f, "transport"),
        }
    }
}

/// Classifier failure: transient (retry) or permanent (alert, never retry).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("transient classifier failure ({kind}): {message}")]
    Transient {
        kind: TransientKind,
        message: String,
    },

    #[error("permanent classifier failure: {0}")]
    Permanent(String),
}

impl ClassifierError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Transient {
            kind: TransientKind::Timeout,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::Transient {
            kind: TransientKind::RateLimited,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transient {
            kind: TransientKind::Transport,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(message.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// The external AI classifier.
#[async_trait]
pub trait AiClassifier: Send + Sync {
    /// Backend identifier for logs and alerts.
    fn name(&self) -> String;

    /// Classify one minimized item.
    async fn classify(
        &self,
        request: &ClassifierRequest,
    ) -> Result<ClassifierResponse, ClassifierError>;
}
