//! Ballast-Gate: Guard Metrics
//!
//! Running counters and bounded sample windows over the guard's
//! decisions. Everything here is derived state; the guard core updates it
//! under its own lock.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};

use ballast_anchor::RiskLevel;

use crate::guard::Decision;

/// Trust/budget sample window size.
const SAMPLE_WINDOW: usize = 1000;

/// How many operations the summary lists.
const TOP_OPERATIONS: usize = 10;

/// Decision counters and samples.
#[derive(Debug)]
pub struct GuardMetrics {
    pub total_checks: u64,
    pub would_block_count: u64,
    pub actually_blocked_count: u64,
    /// Would have blocked, but mode let it through
    pub shadow_passes: u64,
    by_risk_level: BTreeMap<RiskLevel, u64>,
    by_operation: HashMap<String, u64>,
    trust_samples: VecDeque<f64>,
    budget_samples: VecDeque<f64>,
}

impl Default for GuardMetrics {
    fn default() -> Self {
        Self {
            total_checks: 0,
            would_block_count: 0,
            actually_blocked_count: 0,
            shadow_passes: 0,
            by_risk_level: RiskLevel::ALL.iter().map(|&r| (r, 0)).collect(),
            by_operation: HashMap::new(),
            trust_samples: VecDeque::new(),
            budget_samples: VecDeque::new(),
        }
    }
}

impl GuardMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one decision into the counters.
    pub fn record(&mut self, decision: &Decision) {
        self.total_checks += 1;

        if decision.would_block {
            self.would_block_count += 1;
        }
        if decision.actually_blocked {
            self.actually_blocked_count += 1;
        } else if decision.would_block {
            self.shadow_passes += 1;
        }

        *self.by_risk_level.entry(decision.risk_level).or_insert(0) += 1;
        *self
            .by_operation
            .entry(decision.operation.clone())
            .or_insert(0) += 1;

        push_sample(&mut self.trust_samples, decision.trust_score);
        push_sample(&mut self.budget_samples, decision.budget_remaining);
    }

    /// Snapshot for reporting.
    pub fn summary(&self) -> MetricsSummary {
        let total = self.total_checks.max(1) as f64;
        let mut top: Vec<(String, u64)> = self
            .by_operation
            .iter()
            .map(|(op, n)| (op.clone(), *n))
            .collect();
        top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top.truncate(TOP_OPERATIONS);

        MetricsSummary {
            total_checks: self.total_checks,
            would_block_count: self.would_block_count,
            actually_blocked_count: self.actually_blocked_count,
            shadow_passes: self.shadow_passes,
            block_rate: self.would_block_count as f64 / total,
            effective_block_rate: self.actually_blocked_count as f64 / total,
            by_risk_level: self.by_risk_level.clone(),
            top_operations: top,
            avg_trust_score: mean(&self.trust_samples),
            avg_budget: mean(&self.budget_samples),
        }
    }
}

fn push_sample(samples: &mut VecDeque<f64>, value: f64) {
    if samples.len() >= SAMPLE_WINDOW {
        samples.pop_front();
    }
    samples.push_back(value);
}

fn mean(samples: &VecDeque<f64>) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Serializable metrics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_checks: u64,
    pub would_block_count: u64,
    pub actually_blocked_count: u64,
    pub shadow_passes: u64,
    pub block_rate: f64,
    pub effective_block_rate: f64,
    pub by_risk_level: BTreeMap<RiskLevel, u64>,
    pub top_operations: Vec<(String, u64)>,
    pub avg_trust_score: f64,
    pub avg_budget: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::GuardMode;
    use chrono::Utc;

    fn decision(operation: &str, would_block: bool, actually_blocked: bool) -> Decision {
        Decision {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            mode: GuardMode::Shadow,
            risk_level: RiskLevel::Low,
            would_block,
            actually_blocked,
            reasons: vec![],
            context_summary: serde_json::Map::new(),
            trust_score: 0.7,
            budget_remaining: 1.0,
        }
    }

    #[test]
    fn test_counters() {
        let mut metrics = GuardMetrics::new();
        metrics.record(&decision("read", false, false));
        metrics.record(&decision("send", true, true));
        metrics.record(&decision("send", true, false)); // shadow pass

        assert_eq!(metrics.total_checks, 3);
        assert_eq!(metrics.would_block_count, 2);
        assert_eq!(metrics.actually_blocked_count, 1);
        assert_eq!(metrics.shadow_passes, 1);
    }

    #[test]
    fn test_summary_rates_and_top_operations() {
        let mut metrics = GuardMetrics::new();
        for _ in 0..3 {
            metrics.record(&decision("read", false, false));
        }
        metrics.record(&decision("send", true, true));

        let summary = metrics.summary();
        assert!((summary.block_rate - 0.25).abs() < 1e-9);
        assert!((summary.effective_block_rate - 0.25).abs() < 1e-9);
        assert_eq!(summary.top_operations[0], ("read".to_string(), 3));
        assert_eq!(summary.by_risk_level[&RiskLevel::Low], 4);
        assert!((summary.avg_trust_score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_sample_window_bounded() {
        let mut metrics = GuardMetrics::new();
        for _ in 0..1500 {
            metrics.record(&decision("read", false, false));
        }
        assert!(metrics.trust_samples.len() <= SAMPLE_WINDOW);
        assert!(metrics.budget_samples.len() <= SAMPLE_WINDOW);
        assert_eq!(metrics.total_checks, 1500);
    }
}
