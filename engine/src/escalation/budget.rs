//! Per-user Tier-2 usage budget.
//!
//! The budget is the only shared mutable state in the engine. It lives
//! behind [`UsageLedger`], whose single write primitive is an atomic
//! increment-if-below-cap: callers never read-modify-write the counters
//! themselves.

use std::collections::HashMap;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Usage counters and caps for one user in the current period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageBudget {
    pub user_id: String,
    pub calls_used: u32,
    pub call_cap: u32,
    pub cost_accumulated: BigDecimal,
    pub cost_cap: BigDecimal,
}

impl UsageBudget {
    pub fn new(user_id: impl Into<String>, call_cap: u32, cost_cap: BigDecimal) -> Self {
        Self {
            user_id: user_id.into(),
            calls_used: 0,
            call_cap,
            cost_accumulated: BigDecimal::from(0),
            cost_cap,
        }
    }

    /// Both counters strictly below their caps.
    pub fn has_headroom(&self) -> bool {
        self.calls_used < self.call_cap && self.cost_accumulated < self.cost_cap
    }

    pub fn remaining_calls(&self) -> u32 {
        self.call_cap.saturating_sub(self.calls_used)
    }
}

/// Outcome of [`UsageLedger::increment_if_below_cap`]. Both variants carry
/// the budget as it stands after the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncrementOutcome {
    Applied(UsageBudget),
    CapReached(UsageBudget),
}

impl IncrementOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn budget(&self) -> &UsageBudget {
        match self {
            Self::Applied(b) | Self::CapReached(b) => b,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("usage ledger unavailable: {0}")]
    Unavailable(String),

    #[error("usage ledger rejected cost {0}: cost must be non-negative")]
    InvalidCost(BigDecimal),
}

/// Store for per-user usage budgets.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Current budget for `user_id`.
    async fn snapshot(&self, user_id: &str) -> Result<UsageBudget, LedgerError>;

    /// Add one call and `cost` to the user's counters, but only if the budget
    /// still has headroom. Must be atomic with respect to concurrent callers.
    async fn increment_if_below_cap(
        &self,
        user_id: &str,
        cost: &BigDecimal,
    ) -> Result<IncrementOutcome, LedgerError>;
}

/// Process-local ledger. Unknown users start at zero usage with the default
/// caps.
#[derive(Debug)]
pub struct InMemoryLedger {
    default_call_cap: u32,
    default_cost_cap: BigDecimal,
    budgets: Mutex<HashMap<String, UsageBudget>>,
}

impl InMemoryLedger {
    pub fn new(default_call_cap: u32, default_cost_cap: BigDecimal) -> Self {
        Self {
            default_call_cap,
            default_cost_cap,
            budgets: Mutex::new(HashMap::new()),
        }
    }

    /// Seed a user's budget, e.g. with usage carried over from elsewhere.
    pub fn with_budget(mut self, budget: UsageBudget) -> Self {
        self.budgets
            .get_mut()
            .insert(budget.user_id.clone(), budget);
        self
    }

    /// Zero a user's counters, keeping their caps.
    pub async fn reset_period(&self, user_id: &str) {
        if let Some(budget) = self.budgets.lock().await.get_mut(user_id) {
            budget.calls_used = 0;
            budget.cost_accumulated = BigDecimal::from(0);
        }
    }

    fn fresh(&self, user_id: &str) -> UsageBudget {
        UsageBudget::new(user_id, self.default_call_cap, self.default_cost_cap.clone())
    }
}

#[async_trait]
impl UsageLedger for InMemoryLedger {
    async fn snapshot(&self, user_id: &str) -> Result<UsageBudget, LedgerError> {
        let budgets = self.budgets.lock().await;
        Ok(budgets
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| self.fresh(user_id)))
    }

    async fn increment_if_below_cap(
        &self,
        user_id: &str,
        cost: &BigDecimal,
    ) -> Result<IncrementOutcome, LedgerError> {
        if cost < &BigDecimal::from(0) {
            return Err(LedgerError::InvalidCost(cost.clone()));
        }

        let mut budgets = self.budgets.lock().await;
        let budget = budgets
            .entry(user_id.to_string())
            .or_insert_with(|| self.fresh(user_id));

        if !budget.has_headroom() {
            debug!(user = user_id, calls_used = budget.calls_used, "Usage cap reached");
            return Ok(IncrementOutcome::CapReached(budget.clone()));
        }

        budget.calls_used += 1;
        budget.cost_accumulated += cost;
        Ok(IncrementOutcome::Applied(budget.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Arc;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_headroom() {
        let mut b = UsageBudget::new("u", 2, dec("1.00"));
        assert!(b.has_headroom());
        b.calls_used = 2;
        assert!(!b.has_headroom());
        b.calls_used = 0;
        b.cost_accumulated = dec("1.00");
        assert!(!b.has_headroom());
        assert_eq!(b.remaining_calls(), 2);
    }

    #[tokio::test]
    async fn test_unknown_user_gets_defaults() {
        let ledger = InMemoryLedger::new(5, dec("0.50"));
        let b = ledger.snapshot("alice").await.unwrap();
        assert_eq!(b.calls_used, 0);
        assert_eq!(b.call_cap, 5);
        assert_eq!(b.cost_cap, dec("0.50"));
    }

    #[tokio::test]
    async fn test_increment_until_call_cap() {
        let ledger = InMemoryLedger::new(2, dec("10"));
        let cost = dec("0.002");
        assert!(ledger.increment_if_below_cap("u", &cost).await.unwrap().is_applied());
        assert!(ledger.increment_if_below_cap("u", &cost).await.unwrap().is_applied());
        let third = ledger.increment_if_below_cap("u", &cost).await.unwrap();
        assert!(!third.is_applied());
        assert_eq!(third.budget().calls_used, 2);
        assert_eq!(third.budget().cost_accumulated, dec("0.004"));
    }

    #[tokio::test]
    async fn test_cost_cap_blocks_further_increments() {
        let ledger = InMemoryLedger::new(100, dec("0.005"));
        let cost = dec("0.003");
        assert!(ledger.increment_if_below_cap("u", &cost).await.unwrap().is_applied());
        // 0.003 < 0.005, so one more call is admitted and overshoots.
        assert!(ledger.increment_if_below_cap("u", &cost).await.unwrap().is_applied());
        assert!(!ledger.increment_if_below_cap("u", &cost).await.unwrap().is_applied());
    }

    #[tokio::test]
    async fn test_negative_cost_rejected() {
        let ledger = InMemoryLedger::new(1, dec("1"));
        let err = ledger.increment_if_below_cap("u", &dec("-0.1")).await;
        assert!(matches!(err, Err(LedgerError::InvalidCost(_))));
        assert_eq!(ledger.snapshot("u").await.unwrap().calls_used, 0);
    }

    #[tokio::test]
    async fn test_seeded_budget_and_reset() {
        let mut seeded = UsageBudget::new("bob", 3, dec("1"));
        seeded.calls_used = 3;
        let ledger = InMemoryLedger::new(10, dec("5")).with_budget(seeded);
        assert!(!ledger.snapshot("bob").await.unwrap().has_headroom());
        ledger.reset_period("bob").await;
        let b = ledger.snapshot("bob").await.unwrap();
        assert_eq!(b.calls_used, 0);
        assert_eq!(b.call_cap, 3);
    }

    #[tokio::test]
    async fn test_concurrent_increments_respect_cap() {
        let ledger = Arc::new(InMemoryLedger::new(3, dec("100")));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger
                    .increment_if_below_cap("shared", &dec("0.01"))
                    .await
                    .unwrap()
                    .is_applied()
            }));
        }
        let mut applied = 0;
        for h in handles {
            if h.await.unwrap() {
                applied += 1;
            }
        }
        assert_eq!(applied, 3);
        assert_eq!(ledger.snapshot("shared").await.unwrap().calls_used, 3);
    }
}
