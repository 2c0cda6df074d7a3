//! Triage pipeline - wires the layers together for one item or a batch.
//!
//! # Design
//!
//! ```text
//! ItemMetadata
//!   ├─▶ SafetyRailEvaluator ───────────────────────────┐
//!   └─▶ SignalAggregator ─▶ Tier1Policy ─▶ Escalation ─┴─▶ assemble ─▶ ClassificationResult
//! ```
//!
//! Escalation is skipped when a safety rail fired; the final disposition is
//! KEEP regardless of what Tier-2 would say.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use futures::stream::{self, StreamExt};
use tracing::info;

use crate::assembler::{assemble, ClassificationResult};
use crate::config::{ConfigError, EngineConfig};
use crate::escalation::{
    AiClassifier, EscalationController, EscalationOutcome, EscalationStatus, InMemoryLedger,
    SharedAlertBus, UsageLedger,
};
use crate::metadata::ItemMetadata;
use crate::policy::{Tier1Policy, TierResult};
use crate::safety::{KeywordMatcher, SafetyRailEvaluator, SafetyVerdict};
use crate::signals::{AggregatedScore, SignalAggregator, SignalLibrary};

/// Everything the deterministic layers say about an item.
#[derive(Debug, Clone)]
pub struct Tier1Evaluation {
    pub safety: SafetyVerdict,
    pub score: AggregatedScore,
    pub tier1: TierResult,
}

impl Tier1Evaluation {
    /// Assemble the Tier-1-only result for this evaluation.
    pub fn explain(&self, item_id: &str) -> ClassificationResult {
        let status = match (
            Tier1Policy::is_escalation_candidate(&self.tier1),
            self.safety.triggered,
        ) {
            (false, _) => EscalationStatus::NotEligible,
            (true, true) => EscalationStatus::SkippedBySafetyRail,
            (true, false) => EscalationStatus::Disabled,
        };
        assemble(item_id, self.tier1.clone(), &self.safety, status)
    }
}

pub struct TriagePipeline {
    aggregator: SignalAggregator,
    safety: SafetyRailEvaluator,
    policy: Tier1Policy,
    escalation: EscalationController,
    batch_concurrency: usize,
}

impl TriagePipeline {
    pub fn builder(config: EngineConfig) -> TriagePipelineBuilder {
        TriagePipelineBuilder {
            config,
            classifier: None,
            ledger: None,
            alerts: None,
        }
    }

    pub fn escalation(&self) -> &EscalationController {
        &self.escalation
    }

    pub fn policy(&self) -> &Tier1Policy {
        &self.policy
    }

    /// Safety rails, signals and Tier-1 policy. No I/O.
    pub fn evaluate_tier1(&self, metadata: &ItemMetadata) -> Tier1Evaluation {
        let safety = self.safety.evaluate(metadata);
        let score = self.aggregator.aggregate(metadata);
        let tier1 = self.policy.decide(&score);
        Tier1Evaluation {
            safety,
            score,
            tier1,
        }
    }

    /// Final result from the deterministic layers alone; Tier-2 is never
    /// consulted.
    pub fn explain(&self, metadata: &ItemMetadata) -> ClassificationResult {
        self.evaluate_tier1(metadata).explain(&metadata.item_id)
    }

    /// Classify one item for `user_id`. Always yields a disposition.
    pub async fn classify(&self, user_id: &str, metadata: &ItemMetadata) -> ClassificationResult {
        let eval = self.evaluate_tier1(metadata);

        let outcome = if eval.safety.triggered {
            let status = if Tier1Policy::is_escalation_candidate(&eval.tier1) {
                EscalationStatus::SkippedBySafetyRail
            } else {
                EscalationStatus::NotEligible
            };
            EscalationOutcome {
                result: eval.tier1,
                status,
            }
        } else {
            self.escalation.escalate(user_id, metadata, eval.tier1).await
        };

        let result = assemble(
            &metadata.item_id,
            outcome.result,
            &eval.safety,
            outcome.status,
        );
        info!(
            user = user_id,
            item = %result.item_id,
            disposition = %result.disposition,
            tier = %result.contributing_tier,
            confidence = result.confidence,
            safety_override = result.safety_override_applied,
            escalation = result.escalation.name(),
            "Classified item"
        );
        result
    }

    /// Classify a batch with bounded concurrency. Results come back in input
    /// order.
    pub async fn classify_batch(
        &self,
        user_id: &str,
        items: &[ItemMetadata],
    ) -> Vec<ClassificationResult> {
        stream::iter(items)
            .map(|item| self.classify(user_id, item))
            .buffered(self.batch_concurrency)
            .collect()
            .await
    }
}

pub struct TriagePipelineBuilder {
    config: EngineConfig,
    classifier: Option<Arc<dyn AiClassifier>>,
    ledger: Option<Arc<dyn UsageLedger>>,
    alerts: Option<SharedAlertBus>,
}

impl TriagePipelineBuilder {
    pub fn classifier(mut self, classifier: Arc<dyn AiClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Without a ledger, an in-memory one is created from the configured
    /// default caps.
    pub fn ledger(mut self, ledger: Arc<dyn UsageLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn alerts(mut self, alerts: SharedAlertBus) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn build(self) -> Result<TriagePipeline, ConfigError> {
        let config = self.config;
        config.validate()?;

        let aggregator = SignalAggregator::new(SignalLibrary::new(config.signals)?);
        let keywords = KeywordMatcher::new(&config.safety.critical_keywords)?;
        let safety = SafetyRailEvaluator::new(keywords);
        let policy = Tier1Policy::new(config.thresholds)?;

        let ledger = self.ledger.unwrap_or_else(|| -> Arc<dyn UsageLedger> {
            Arc::new(InMemoryLedger::new(
                config.escalation.default_call_cap,
                config.escalation.default_cost_cap.clone(),
            ))
        });
        let mut escalation = EscalationController::new(config.escalation, self.classifier, ledger);
        if let Some(alerts) = self.alerts {
            escalation = escalation.with_alerts(alerts);
        }

        Ok(TriagePipeline {
            aggregator,
            safety,
            policy,
            escalation,
            batch_concurrency: config.pipeline.batch_concurrency,
        })
    }
}

/// Seed an in-memory ledger with usage carried in from outside the process.
pub fn seeded_ledger(
    config: &EngineConfig,
    user_id: &str,
    calls_used: u32,
    cost_used: BigDecimal,
) -> InMemoryLedger {
    let mut budget = crate::escalation::UsageBudget::new(
        user_id,
        config.escalation.default_call_cap,
        config.escalation.default_cost_cap.clone(),
    );
    budget.calls_used = calls_used;
    budget.cost_accumulated = cost_used;
    InMemoryLedger::new(
        config.escalation.default_call_cap,
        config.escalation.default_cost_cap.clone(),
    )
    .with_budget(budget)
}
