//! Operator alert channel.
//!
//! Failures that retrying cannot fix (bad credentials, a misconfigured
//! endpoint, a broken ledger) are published here so an operator can act.
//! Publishing never fails: with no subscribers the alert is only logged.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    PermanentClassifierFailure,
    LedgerUnavailable,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermanentClassifierFailure => write!(f, "permanent_classifier_failure"),
            Self::LedgerUnavailable => write!(f, "ledger_unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorAlert {
    pub kind: AlertKind,
    pub user_id: String,
    pub item_id: String,
    /// Classifier backend name, when the alert concerns one.
    pub backend: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl OperatorAlert {
    pub fn new(
        kind: AlertKind,
        user_id: impl Into<String>,
        item_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            user_id: user_id.into(),
            item_id: item_id.into(),
            backend: None,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }
}

pub type SharedAlertBus = Arc<AlertBus>;

/// Broadcast bus for [`OperatorAlert`]s.
pub struct AlertBus {
    sender: broadcast::Sender<OperatorAlert>,
}

impl AlertBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn shared(self) -> SharedAlertBus {
        Arc::new(self)
    }

    /// Publish to every subscriber. Returns how many received it.
    pub fn publish(&self, alert: OperatorAlert) -> usize {
        error!(
            kind = %alert.kind,
            user = %alert.user_id,
            item = %alert.item_id,
            backend = alert.backend.as_deref().unwrap_or("-"),
            "Operator alert: {}",
            alert.message
        );
        match self.sender.send(alert) {
            Ok(count) => count,
            Err(_) => {
                debug!("Operator alert published (no receivers)");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OperatorAlert> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for AlertBus {
    fn default() -> Self {
        Self::new()
    }
}
