//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sift_engine::{
    AiClassifier, ClassifierError, ClassifierRequest, ClassifierResponse, Disposition,
    ItemMetadata, ProviderCategory,
};

pub fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

pub fn answer(disposition: Disposition, confidence: f64) -> ClassifierResponse {
    ClassifierResponse {
        disposition,
        confidence,
        rationale: format!("model says {}", disposition),
        cost: None,
    }
}

/// Promotional blast from a marketing platform. Scores 1.0 under defaults.
pub fn clear_spam() -> ItemMetadata {
    let mut m = ItemMetadata::new("clear-spam");
    m.sender_address = Some("Deals <promo@mail.mailchimp.com>".into());
    m.subject = Some("🔥🔥🔥 70% OFF everything, last chance!".into());
    m.snippet = Some("Shop the biggest markdowns of the season".into());
    m.category = Some(ProviderCategory::Promotions);
    m.has_unsubscribe_header = Some(true);
    m.has_bulk_headers = Some(true);
    m.sender_open_rate = Some(0.01);
    m.age_hours = Some(72.0);
    m
}

/// The bare clear-spam case: promotions, unsubscribe header, 2% open rate,
/// exactly one day old. Nothing else is known.
pub fn plain_promotion() -> ItemMetadata {
    let mut m = ItemMetadata::new("plain-promotion");
    m.category = Some(ProviderCategory::Promotions);
    m.has_unsubscribe_header = Some(true);
    m.sender_open_rate = Some(0.02);
    m.starred = Some(false);
    m.important = Some(false);
    m.age_hours = Some(24.0);
    m
}

/// Marketing mail from a bank: scores as spam, but "bank" is critical.
pub fn bank_marketing() -> ItemMetadata {
    let mut m = ItemMetadata::new("bank-marketing");
    m.sender_address = Some("offers@news.examplebank.com".into());
    m.subject = Some("Exclusive card offers from your bank".into());
    m.snippet = Some("Limited time: 0% intro APR".into());
    m.category = Some(ProviderCategory::Promotions);
    m.has_unsubscribe_header = Some(true);
    m.has_bulk_headers = Some(true);
    m.sender_open_rate = Some(0.03);
    m
}

/// Uncategorized newsletter with middling engagement: lands in REVIEW.
pub fn ambiguous_newsletter() -> ItemMetadata {
    let mut m = ItemMetadata::new("ambiguous-newsletter");
    m.sender_address = Some("editor@gardening-weekly.example".into());
    m.subject = Some("This month in the garden".into());
    m.snippet = Some("Tomatoes, tulips and what to plant next".into());
    m.sender_open_rate = Some(0.35);
    m.age_hours = Some(120.0);
    m
}

/// Hand-written Tier-2 fake: plays back a script, then repeats the final
/// entry. Optionally waits before answering.
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<Result<ClassifierResponse, ClassifierError>>>,
    fallback: Result<ClassifierResponse, ClassifierError>,
    delay: Duration,
    calls: AtomicU32,
    requests: Mutex<Vec<ClassifierRequest>>,
}

impl ScriptedClassifier {
    pub fn new(script: Vec<Result<ClassifierResponse, ClassifierError>>) -> Self {
        let fallback = script
            .last()
            .cloned()
            .unwrap_or_else(|| Err(ClassifierError::permanent("empty script")));
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(result: Result<ClassifierResponse, ClassifierError>) -> Self {
        Self::new(vec![result])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ClassifierRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiClassifier for ScriptedClassifier {
    fn name(&self) -> String {
        "scripted".to_string()
    }

    async fn classify(
        &self,
        request: &ClassifierRequest,
    ) -> Result<ClassifierResponse, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
