use std::collections::BTreeMap;

use serde::Serialize;
use sift_engine::{ClassificationResult, Disposition, TierSource};

/// Tally of a classify run, printed to stderr when the batch finishes.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub rejected_lines: usize,
    pub by_disposition: BTreeMap<Disposition, usize>,
    pub tier2_decisions: usize,
    pub safety_overrides: usize,
    pub escalation: BTreeMap<&'static str, usize>,
    pub operator_alerts: usize,
}

impl BatchSummary {
    pub fn record(&mut self, result: &ClassificationResult) {
        self.total += 1;
        *self.by_disposition.entry(result.disposition).or_default() += 1;
        if result.contributing_tier == TierSource::Tier2 {
            self.tier2_decisions += 1;
        }
        if result.safety_override_applied {
            self.safety_overrides += 1;
        }
        *self.escalation.entry(result.escalation.name()).or_default() += 1;
    }

    pub fn count(&self, disposition: Disposition) -> usize {
        self.by_disposition.get(&disposition).copied().unwrap_or(0)
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "classified {} item(s)", self.total)?;
        for d in [
            Disposition::Keep,
            Disposition::Review,
            Disposition::Archive,
            Disposition::Trash,
        ] {
            writeln!(f, "  {:<8} {}", d.to_string(), self.count(d))?;
        }
        writeln!(
            f,
            "  tier2 decisions: {}, safety overrides: {}",
            self.tier2_decisions, self.safety_overrides
        )?;
        if !self.escalation.is_empty() {
            let parts: Vec<String> = self
                .escalation
                .iter()
                .map(|(status, n)| format!("{}={}", status, n))
                .collect();
            writeln!(f, "  escalation: {}", parts.join(", "))?;
        }
        if self.rejected_lines > 0 {
            writeln!(f, "  rejected input lines: {}", self.rejected_lines)?;
        }
        if self.operator_alerts > 0 {
            writeln!(f, "  operator alerts: {}", self.operator_alerts)?;
        }
        Ok(())
    }
}
