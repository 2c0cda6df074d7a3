//! Escalation controller - decides whether an uncertain Tier-1 call goes to
//! the Tier-2 classifier, and under what budget.
//!
//! # Design
//!
//! ```text
//! Tier-1 REVIEW
//!   ├─ disabled / no classifier ───────────────▶ Tier-1 (Disabled)
//!   ├─ circuit open or latched ────────────────▶ Tier-1 (Unavailable)
//!   ├─ acquire per-user slot
//!   ├─ circuit tripped while waiting ──────────▶ Tier-1 (Unavailable)
//!   ├─ budget snapshot has no headroom ────────▶ Tier-1 (BudgetExhausted)
//!   ├─ half-open trial already taken ──────────▶ Tier-1 (Unavailable)
//!   ├─ classify with retry
//!   │    ├─ transient ×N ──────────────────────▶ Tier-1 (FellBack), breaker +1
//!   │    ├─ permanent ─────────────────────────▶ Tier-1 (PermanentFailure), alert, latch
//!   │    └─ answer
//!   │         ├─ increment refused ────────────▶ Tier-1 (ChargeRefused)
//!   │         ├─ below confidence floor ───────▶ Tier-1 (BelowConfidenceFloor), charged
//!   │         └─ ok ───────────────────────────▶ Tier-2 (Escalated), charged
//! ```
//!
//! Usage is charged only after a successful answer, through the ledger's
//! atomic increment-if-below-cap. A cancelled escalation charges nothing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use super::alerts::{AlertBus, AlertKind, OperatorAlert, SharedAlertBus};
use super::breaker::{CircuitBreaker, CircuitState};
use super::budget::{IncrementOutcome, UsageLedger};
use super::classifier::{AiClassifier, ClassifierError, ClassifierRequest, ClassifierResponse};
use super::retry::RetryPolicy;
use crate::config::ConfigError;
use crate::metadata::ItemMetadata;
use crate::policy::{Tier1Policy, TierResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    pub enabled: bool,
    /// Calls per user per period, used for users the ledger has not seen.
    pub default_call_cap: u32,
    pub default_cost_cap: BigDecimal,
    /// Charged when the backend does not report a cost.
    pub cost_per_call: BigDecimal,
    /// Tier-2 answers below this confidence are not adopted.
    pub min_confidence: f64,
    pub snippet_max_chars: usize,
    /// In-flight Tier-2 calls per user.
    pub per_user_concurrency: usize,
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_call_cap: 50,
            default_cost_cap: BigDecimal::new(50.into(), 2),
            cost_per_call: BigDecimal::new(2.into(), 3),
            min_confidence: 0.6,
            snippet_max_chars: 200,
            per_user_concurrency: 1,
            breaker_failure_threshold: 3,
            breaker_cooldown_secs: 60,
            retry: RetryPolicy::default(),
        }
    }
}

impl EscalationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let zero = BigDecimal::from(0);
        if self.default_cost_cap < zero || self.cost_per_call < zero {
            return Err(ConfigError::Invalid(
                "escalation costs and cost caps must be non-negative".to_string(),
            ));
        }
        if !self.min_confidence.is_finite() || !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "escalation.min_confidence = {} must lie within 0.0..=1.0",
                self.min_confidence
            )));
        }
        if self.per_user_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "escalation.per_user_concurrency must be at least 1".to_string(),
            ));
        }
        if self.snippet_max_chars == 0 {
            return Err(ConfigError::Invalid(
                "escalation.snippet_max_chars must be at least 1".to_string(),
            ));
        }
        self.retry.validate()
    }
}

/// How an escalation attempt ended. Every variant except `Escalated` leaves
/// the Tier-1 result in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EscalationStatus {
    /// Tier-1 was confident; nothing to escalate.
    NotEligible,
    Disabled,
    SkippedBySafetyRail,
    BudgetExhausted,
    /// Circuit breaker open or latched.
    Unavailable,
    Escalated { attempts: u32 },
    BelowConfidenceFloor { attempts: u32, confidence: f64 },
    FellBack { attempts: u32, reason: String },
    PermanentFailure { reason: String },
    LedgerUnavailable { reason: String },
    /// The answer arrived but a concurrent escalation took the last slot.
    ChargeRefused { attempts: u32 },
}

impl EscalationStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotEligible => "not_eligible",
            Self::Disabled => "disabled",
            Self::SkippedBySafetyRail => "skipped_by_safety_rail",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Unavailable => "unavailable",
            Self::Escalated { .. } => "escalated",
            Self::BelowConfidenceFloor { .. } => "below_confidence_floor",
            Self::FellBack { .. } => "fell_back",
            Self::PermanentFailure { .. } => "permanent_failure",
            Self::LedgerUnavailable { .. } => "ledger_unavailable",
            Self::ChargeRefused { .. } => "charge_refused",
        }
    }

    /// Whether a Tier-2 call was made and charged.
    pub fn was_charged(&self) -> bool {
        matches!(
            self,
            Self::Escalated { .. } | Self::BelowConfidenceFloor { .. }
        )
    }
}

impl std::fmt::Display for EscalationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Escalated { attempts } | Self::ChargeRefused { attempts } => {
                write!(f, "{} after {} attempt(s)", self.name(), attempts)
            }
            Self::BelowConfidenceFloor {
                attempts,
                confidence,
            } => write!(
                f,
                "{} ({:.2}) after {} attempt(s)",
                self.name(),
                confidence,
                attempts
            ),
            Self::FellBack { attempts, reason } => {
                write!(f, "{} after {} attempt(s): {}", self.name(), attempts, reason)
            }
            Self::PermanentFailure { reason } | Self::LedgerUnavailable { reason } => {
                write!(f, "{}: {}", self.name(), reason)
            }
            _ => f.write_str(self.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EscalationOutcome {
    pub result: TierResult,
    pub status: EscalationStatus,
}

impl EscalationOutcome {
    fn stay(tier1: TierResult, status: EscalationStatus) -> Self {
        Self {
            result: tier1,
            status,
        }
    }
}

pub struct EscalationController {
    config: EscalationConfig,
    classifier: Option<Arc<dyn AiClassifier>>,
    ledger: Arc<dyn UsageLedger>,
    alerts: SharedAlertBus,
    breaker: Mutex<CircuitBreaker>,
    user_slots: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl EscalationController {
    pub fn new(
        config: EscalationConfig,
        classifier: Option<Arc<dyn AiClassifier>>,
        ledger: Arc<dyn UsageLedger>,
    ) -> Self {
        let breaker = CircuitBreaker::new(
            config.breaker_failure_threshold,
            Duration::from_secs(config.breaker_cooldown_secs),
        );
        Self {
            config,
            classifier,
            ledger,
            alerts: AlertBus::new().shared(),
            breaker: Mutex::new(breaker),
            user_slots: Mutex::new(HashMap::new()),
        }
    }

    /// Publish operator alerts on `alerts` instead of a private bus.
    pub fn with_alerts(mut self, alerts: SharedAlertBus) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn config(&self) -> &EscalationConfig {
        &self.config
    }

    pub fn alerts(&self) -> &SharedAlertBus {
        &self.alerts
    }

    pub async fn breaker_state(&self) -> CircuitState {
        self.breaker.lock().await.state()
    }

    /// Operator reset after a latched permanent failure.
    pub async fn reset_breaker(&self) {
        self.breaker.lock().await.reset();
        info!("Tier-2 circuit breaker reset");
    }

    /// Try to replace an uncertain Tier-1 result with a Tier-2 answer.
    ///
    /// Never fails: every path ends in a usable [`TierResult`].
    pub async fn escalate(
        &self,
        user_id: &str,
        metadata: &ItemMetadata,
        tier1: TierResult,
    ) -> EscalationOutcome {
        if !Tier1Policy::is_escalation_candidate(&tier1) {
            return EscalationOutcome::stay(tier1, EscalationStatus::NotEligible);
        }
        let classifier = match (&self.classifier, self.config.enabled) {
            (Some(classifier), true) => Arc::clone(classifier),
            _ => return EscalationOutcome::stay(tier1, EscalationStatus::Disabled),
        };

        if !self.breaker.lock().await.is_available() {
            debug!(item = %metadata.item_id, "Tier-2 unavailable, circuit open");
            return EscalationOutcome::stay(tier1, EscalationStatus::Unavailable);
        }

        let slot = self.user_slot(user_id).await;
        let Ok(permit) = slot.acquire_owned().await else {
            return EscalationOutcome::stay(tier1, EscalationStatus::Unavailable);
        };
        let outcome = self
            .escalate_holding_slot(user_id, metadata, tier1, classifier)
            .await;
        drop(permit);
        self.release_idle_slot(user_id).await;
        outcome
    }

    /// The part of [`escalate`](Self::escalate) that runs under the user's
    /// concurrency slot.
    async fn escalate_holding_slot(
        &self,
        user_id: &str,
        metadata: &ItemMetadata,
        tier1: TierResult,
        classifier: Arc<dyn AiClassifier>,
    ) -> EscalationOutcome {
        // The breaker may have tripped or latched while this call waited.
        if !self.breaker.lock().await.is_available() {
            debug!(item = %metadata.item_id, "Tier-2 unavailable after waiting for slot");
            return EscalationOutcome::stay(tier1, EscalationStatus::Unavailable);
        }

        match self.ledger.snapshot(user_id).await {
            Ok(budget) if !budget.has_headroom() => {
                debug!(
                    user = user_id,
                    item = %metadata.item_id,
                    calls_used = budget.calls_used,
                    call_cap = budget.call_cap,
                    "Tier-2 budget exhausted"
                );
                return EscalationOutcome::stay(tier1, EscalationStatus::BudgetExhausted);
            }
            Ok(_) => {}
            Err(err) => {
                let reason = err.to_string();
                self.alerts.publish(OperatorAlert::new(
                    AlertKind::LedgerUnavailable,
                    user_id,
                    &metadata.item_id,
                    &reason,
                ));
                return EscalationOutcome::stay(tier1, EscalationStatus::LedgerUnavailable { reason });
            }
        }

        if !self.breaker.lock().await.try_admit() {
            return EscalationOutcome::stay(tier1, EscalationStatus::Unavailable);
        }

        let request = ClassifierRequest::minimized(metadata, self.config.snippet_max_chars);
        let report = self
            .config
            .retry
            .run(|_| classifier.classify(&request))
            .await;
        let attempts = report.attempts;
        let answer = report
            .outcome
            .and_then(|response| response.validate().map(|()| response));

        match answer {
            Ok(response) => {
                self.breaker.lock().await.record_success();
                self.adopt(user_id, metadata, tier1, response, attempts).await
            }
            Err(ClassifierError::Permanent(reason)) => {
                self.breaker.lock().await.latch(reason.clone());
                self.alerts.publish(
                    OperatorAlert::new(
                        AlertKind::PermanentClassifierFailure,
                        user_id,
                        &metadata.item_id,
                        &reason,
                    )
                    .with_backend(classifier.name()),
                );
                EscalationOutcome::stay(tier1, EscalationStatus::PermanentFailure { reason })
            }
            Err(err) => {
                self.breaker.lock().await.record_failure();
                warn!(
                    user = user_id,
                    item = %metadata.item_id,
                    attempts,
                    error = %err,
                    "Tier-2 retries exhausted, keeping Tier-1 result"
                );
                EscalationOutcome::stay(
                    tier1,
                    EscalationStatus::FellBack {
                        attempts,
                        reason: err.to_string(),
                    },
                )
            }
        }
    }

    /// Charge for a successful answer, then decide whether to adopt it.
    async fn adopt(
        &self,
        user_id: &str,
        metadata: &ItemMetadata,
        tier1: TierResult,
        response: ClassifierResponse,
        attempts: u32,
    ) -> EscalationOutcome {
        let cost = response
            .cost
            .clone()
            .unwrap_or_else(|| self.config.cost_per_call.clone());

        match self.ledger.increment_if_below_cap(user_id, &cost).await {
            Ok(IncrementOutcome::Applied(budget)) => {
                if response.confidence < self.config.min_confidence {
                    info!(
                        user = user_id,
                        item = %metadata.item_id,
                        confidence = response.confidence,
                        floor = self.config.min_confidence,
                        "Tier-2 answer below confidence floor, keeping Tier-1 result"
                    );
                    return EscalationOutcome::stay(
                        tier1,
                        EscalationStatus::BelowConfidenceFloor {
                            attempts,
                            confidence: response.confidence,
                        },
                    );
                }
                info!(
                    user = user_id,
                    item = %metadata.item_id,
                    disposition = %response.disposition,
                    confidence = response.confidence,
                    calls_used = budget.calls_used,
                    cost = %cost,
                    "Escalated to Tier-2"
                );
                EscalationOutcome {
                    result: TierResult::tier2(
                        response.disposition,
                        response.confidence,
                        response.rationale,
                    ),
                    status: EscalationStatus::Escalated { attempts },
                }
            }
            Ok(IncrementOutcome::CapReached(_)) => {
                warn!(
                    user = user_id,
                    item = %metadata.item_id,
                    "Tier-2 answer discarded, usage cap reached by a concurrent escalation"
                );
                EscalationOutcome::stay(tier1, EscalationStatus::ChargeRefused { attempts })
            }
            Err(err) => {
                let reason = err.to_string();
                self.alerts.publish(OperatorAlert::new(
                    AlertKind::LedgerUnavailable,
                    user_id,
                    &metadata.item_id,
                    &reason,
                ));
                EscalationOutcome::stay(tier1, EscalationStatus::LedgerUnavailable { reason })
            }
        }
    }

    async fn user_slot(&self, user_id: &str) -> Arc<Semaphore> {
        let mut slots = self.user_slots.lock().await;
        Arc::clone(
            slots
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(self.config.per_user_concurrency))),
        )
    }

    /// Drop the user's semaphore once no escalation holds or awaits it. An
    /// entry left behind by a cancelled escalation goes on that user's next
    /// completed escalation.
    async fn release_idle_slot(&self, user_id: &str) {
        let mut slots = self.user_slots.lock().await;
        if slots
            .get(user_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(user_id);
        }
    }

    /// Users with an escalation in flight or waiting for a slot.
    pub async fn active_users(&self) -> usize {
        self.user_slots.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escalation::budget::InMemoryLedger;
    use crate::policy::{Disposition, TierEvidence, TierSource};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::str::FromStr;
    use std::sync::Mutex as StdMutex;

    /// Plays back a fixed script of answers, then repeats the last one.
    struct Scripted {
        script: StdMutex<VecDeque<Result<ClassifierResponse, ClassifierError>>>,
        last: Result<ClassifierResponse, ClassifierError>,
        calls: StdMutex<Vec<ClassifierRequest>>,
    }

    impl Scripted {
        fn new(script: Vec<Result<ClassifierResponse, ClassifierError>>) -> Arc<Self> {
            let last = script
                .last()
                .cloned()
                .unwrap_or_else(|| Err(ClassifierError::permanent("empty script")));
            Arc::new(Self {
                script: StdMutex::new(script.into()),
                last,
                calls: StdMutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AiClassifier for Scripted {
        fn name(&self) -> String {
            "scripted".into()
        }

        async fn classify(
            &self,
            request: &ClassifierRequest,
        ) -> Result<ClassifierResponse, ClassifierError> {
            self.calls.lock().unwrap().push(request.clone());
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.last.clone())
        }
    }

    fn answer(disposition: Disposition, confidence: f64) -> Result<ClassifierResponse, ClassifierError> {
        Ok(ClassifierResponse {
            disposition,
            confidence,
            rationale: "looks like a newsletter".into(),
            cost: None,
        })
    }

    fn review() -> TierResult {
        TierResult {
            disposition: Disposition::Review,
            confidence: 0.4,
            source: TierSource::Tier1,
            evidence: TierEvidence::Signals(vec![]),
        }
    }

    fn item() -> ItemMetadata {
        let mut m = ItemMetadata::new("msg-1");
        m.sender_address = Some("news@letters.example".into());
        m.subject = Some("This month in gardening".into());
        m.snippet = Some("Tomatoes, tulips and more".into());
        m
    }

    fn controller(
        classifier: Arc<Scripted>,
        call_cap: u32,
    ) -> (EscalationController, Arc<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::new(
            call_cap,
            BigDecimal::from_str("10").unwrap(),
        ));
        let c = EscalationController::new(
            EscalationConfig::default(),
            Some(classifier as Arc<dyn AiClassifier>),
            Arc::clone(&ledger) as Arc<dyn UsageLedger>,
        );
        (c, ledger)
    }

    #[tokio::test(start_paused = true)]
    async fn test_confident_tier1_not_escalated() {
        let classifier = Scripted::new(vec![answer(Disposition::Keep, 0.9)]);
        let (c, _) = controller(Arc::clone(&classifier), 5);
        let mut trash = review();
        trash.disposition = Disposition::Trash;
        let out = c.escalate("u", &item(), trash.clone()).await;
        assert_eq!(out.status, EscalationStatus::NotEligible);
        assert_eq!(out.result, trash);
        assert_eq!(classifier.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_escalation_charges_once() {
        let classifier = Scripted::new(vec![answer(Disposition::Archive, 0.82)]);
        let (c, ledger) = controller(Arc::clone(&classifier), 5);
        let out = c.escalate("u", &item(), review()).await;

        assert_eq!(out.status, EscalationStatus::Escalated { attempts: 1 });
        assert_eq!(out.result.source, TierSource::Tier2);
        assert_eq!(out.result.disposition, Disposition::Archive);

        let budget = ledger.snapshot("u").await.unwrap();
        assert_eq!(budget.calls_used, 1);
        assert_eq!(budget.cost_accumulated, BigDecimal::from_str("0.002").unwrap());

        let sent = classifier.calls.lock().unwrap()[0].clone();
        assert_eq!(sent.sender_domain, "letters.example");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_exhaustion_falls_back_without_charge() {
        let classifier = Scripted::new(vec![Err(ClassifierError::timeout("slow"))]);
        let (c, ledger) = controller(Arc::clone(&classifier), 5);
        let out = c.escalate("u", &item(), review()).await;

        assert!(matches!(out.status, EscalationStatus::FellBack { attempts: 3, .. }));
        assert_eq!(out.result, review());
        assert_eq!(classifier.call_count(), 3);
        assert_eq!(ledger.snapshot("u").await.unwrap().calls_used, 0);
        assert_eq!(c.breaker_state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success() {
        let classifier = Scripted::new(vec![
            Err(ClassifierError::rate_limited("429")),
            answer(Disposition::Trash, 0.95),
        ]);
        let (c, ledger) = controller(Arc::clone(&classifier), 5);
        let out = c.escalate("u", &item(), review()).await;
        assert_eq!(out.status, EscalationStatus::Escalated { attempts: 2 });
        assert_eq!(ledger.snapshot("u").await.unwrap().calls_used, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhausted_skips_call() {
        let classifier = Scripted::new(vec![answer(Disposition::Archive, 0.9)]);
        let (c, _) = controller(Arc::clone(&classifier), 0);
        let out = c.escalate("u", &item(), review()).await;
        assert_eq!(out.status, EscalationStatus::BudgetExhausted);
        assert_eq!(classifier.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_latches_and_alerts() {
        let classifier = Scripted::new(vec![Err(ClassifierError::permanent("401 unauthorized"))]);
        let (c, ledger) = controller(Arc::clone(&classifier), 5);
        let mut alerts = c.alerts().subscribe();

        let out = c.escalate("u", &item(), review()).await;
        assert!(matches!(out.status, EscalationStatus::PermanentFailure { .. }));
        assert_eq!(classifier.call_count(), 1);
        assert_eq!(ledger.snapshot("u").await.unwrap().calls_used, 0);
        assert_eq!(c.breaker_state().await, CircuitState::Latched);

        let alert = alerts.recv().await.unwrap();
        assert_eq!(alert.kind, AlertKind::PermanentClassifierFailure);
        assert_eq!(alert.backend.as_deref(), Some("scripted"));

        let next = c.escalate("u", &item(), review()).await;
        assert_eq!(next.status, EscalationStatus::Unavailable);
        assert_eq!(classifier.call_count(), 1);

        c.reset_breaker().await;
        assert_eq!(c.breaker_state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_contract_violation_is_permanent() {
        let classifier = Scripted::new(vec![answer(Disposition::Trash, 7.0)]);
        let (c, ledger) = controller(Arc::clone(&classifier), 5);
        let out = c.escalate("u", &item(), review()).await;
        assert!(matches!(out.status, EscalationStatus::PermanentFailure { .. }));
        assert_eq!(out.result, review());
        assert_eq!(ledger.snapshot("u").await.unwrap().calls_used, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_below_confidence_floor_charged_but_not_adopted() {
        let classifier = Scripted::new(vec![answer(Disposition::Trash, 0.3)]);
        let (c, ledger) = controller(Arc::clone(&classifier), 5);
        let out = c.escalate("u", &item(), review()).await;
        assert!(matches!(
            out.status,
            EscalationStatus::BelowConfidenceFloor { attempts: 1, .. }
        ));
        assert!(out.status.was_charged());
        assert_eq!(out.result, review());
        assert_eq!(ledger.snapshot("u").await.unwrap().calls_used, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_and_missing_classifier() {
        let ledger: Arc<dyn UsageLedger> =
            Arc::new(InMemoryLedger::new(5, BigDecimal::from(1)));
        let c = EscalationController::new(EscalationConfig::default(), None, Arc::clone(&ledger));
        assert_eq!(
            c.escalate("u", &item(), review()).await.status,
            EscalationStatus::Disabled
        );

        let config = EscalationConfig {
            enabled: false,
            ..Default::default()
        };
        let classifier = Scripted::new(vec![answer(Disposition::Archive, 0.9)]);
        let c = EscalationController::new(config, Some(classifier.clone() as Arc<dyn AiClassifier>), ledger);
        assert_eq!(
            c.escalate("u", &item(), review()).await.status,
            EscalationStatus::Disabled
        );
        assert_eq!(classifier.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opens_after_repeated_exhaustion() {
        let classifier = Scripted::new(vec![Err(ClassifierError::transport("refused"))]);
        let (c, _) = controller(Arc::clone(&classifier), 50);
        for _ in 0..3 {
            c.escalate("u", &item(), review()).await;
        }
        assert_eq!(c.breaker_state().await, CircuitState::Open);
        let calls = classifier.call_count();
        let out = c.escalate("u", &item(), review()).await;
        assert_eq!(out.status, EscalationStatus::Unavailable);
        assert_eq!(classifier.call_count(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_user_slots_are_evicted() {
        let classifier = Scripted::new(vec![answer(Disposition::Archive, 0.9)]);
        let (c, _) = controller(Arc::clone(&classifier), 50);
        for user in ["a", "b", "c"] {
            c.escalate(user, &item(), review()).await;
        }
        assert_eq!(classifier.call_count(), 3);
        assert_eq!(c.active_users().await, 0);
    }

    #[test]
    fn test_config_defaults_validate() {
        let config = EscalationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cost_per_call, BigDecimal::from_str("0.002").unwrap());
        assert_eq!(config.default_cost_cap, BigDecimal::from_str("0.50").unwrap());

        let bad = EscalationConfig {
            per_user_concurrency: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(EscalationStatus::BudgetExhausted.to_string(), "budget_exhausted");
        assert_eq!(
            EscalationStatus::Escalated { attempts: 2 }.to_string(),
            "escalated after 2 attempt(s)"
        );
    }
}
