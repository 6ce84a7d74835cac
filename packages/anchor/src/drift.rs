//! Ballast-Anchor: Drift Detection
//!
//! Five closed-form detectors over the bounded operation history. No
//! model, no randomness: every detector is a deterministic window
//! statistic, and a scan yields at most one named pattern. The scan order
//! is fixed; the first hit wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::record::OperationRecord;

/// What the anchor should do about a detected pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftSeverity {
    /// Stop and require a human checkpoint
    Checkpoint,
    /// Keep going with a reduced risk budget
    ReduceBudget,
    /// Keep going, but pace down
    SlowDown,
}

impl DriftSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            DriftSeverity::Checkpoint => "checkpoint",
            DriftSeverity::ReduceBudget => "reduce_budget",
            DriftSeverity::SlowDown => "slow_down",
        }
    }
}

/// Named drift pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    /// Risk ordinals rising across the window
    EscalatingAccess,
    /// Externally visible operations ramping up
    ExternalDrift,
    /// Operations arriving faster than the configured pace
    SpeedDrift,
    /// Same resource hammered repeatedly
    RepetitionAnomaly,
    /// Warnings piling up
    WarningAccumulation,
}

impl DriftKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DriftKind::EscalatingAccess => "escalating_access",
            DriftKind::ExternalDrift => "external_drift",
            DriftKind::SpeedDrift => "speed_drift",
            DriftKind::RepetitionAnomaly => "repetition_anomaly",
            DriftKind::WarningAccumulation => "warning_accumulation",
        }
    }

    /// Severity is a property of the pattern, not of the scan.
    pub fn severity(self) -> DriftSeverity {
        match self {
            DriftKind::EscalatingAccess => DriftSeverity::Checkpoint,
            DriftKind::ExternalDrift => DriftSeverity::ReduceBudget,
            DriftKind::SpeedDrift => DriftSeverity::SlowDown,
            DriftKind::RepetitionAnomaly => DriftSeverity::Checkpoint,
            DriftKind::WarningAccumulation => DriftSeverity::Checkpoint,
        }
    }
}

impl std::fmt::Display for DriftKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected pattern, with the evidence that triggered it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftPattern {
    pub kind: DriftKind,
    pub description: String,
    pub severity: DriftSeverity,
}

/// Alert published to violation subscribers when a pattern fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Unique alert ID
    pub id: Uuid,
    /// When the pattern was detected
    pub timestamp: DateTime<Utc>,
    /// Drift pattern name (`escalating_access`, ...)
    pub pattern: String,
    /// Evidence text
    pub description: String,
    /// Severity tag (`checkpoint`, `reduce_budget`, `slow_down`)
    pub severity: DriftSeverity,
    /// Has an operator acknowledged this alert?
    pub acknowledged: bool,
}

impl Alert {
    pub fn from_pattern(pattern: &DriftPattern) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            pattern: pattern.kind.as_str().to_string(),
            description: pattern.description.clone(),
            severity: pattern.severity,
            acknowledged: false,
        }
    }
}

/// Detector thresholds. All defaults match the documented behavior; every
/// one is tunable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftParams {
    /// Window for risk-escalation analysis
    pub escalation_window: usize,
    /// Second-half risk must exceed this multiple of the first half
    pub escalation_ratio: f64,
    /// Window for external-operation analysis
    pub external_window: usize,
    /// Absolute floor for the second-half external count
    pub external_min: usize,
    /// Window for pacing analysis
    pub speed_window: usize,
    /// Operations per minute above which pacing is drift
    pub speed_threshold_per_minute: f64,
    /// Window for repeated-resource analysis
    pub repetition_window: usize,
    /// Same-resource count at which repetition is anomalous
    pub repetition_threshold: usize,
    /// Window for warning accumulation
    pub warning_window: usize,
    /// Warning sum at which accumulation fires
    pub warning_threshold: u32,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            escalation_window: 10,
            escalation_ratio: 1.5,
            external_window: 20,
            external_min: 3,
            speed_window: 10,
            speed_threshold_per_minute: 60.0,
            repetition_window: 10,
            repetition_threshold: 7,
            warning_window: 10,
            warning_threshold: 5,
        }
    }
}

/// The drift detector. Pure over the history it is handed; holds nothing
/// but thresholds.
#[derive(Debug, Clone, Default)]
pub struct DriftDetector {
    params: DriftParams,
}

impl DriftDetector {
    pub fn new(params: DriftParams) -> Self {
        Self { params }
    }

    pub fn with_speed_threshold(mut self, ops_per_minute: f64) -> Self {
        self.params.speed_threshold_per_minute = ops_per_minute;
        self
    }

    pub fn with_external_window(mut self, window: usize) -> Self {
        self.params.external_window = window;
        self
    }

    pub fn params(&self) -> &DriftParams {
        &self.params
    }

    /// Run all detectors in order; first hit wins.
    pub fn scan(&self, history: &VecDeque<OperationRecord>) -> Option<DriftPattern> {
        let records: Vec<&OperationRecord> = history.iter().collect();

        if let Some(p) = self.escalating_access(&records) {
            return Some(p);
        }
        if let Some(p) = self.external_drift(&records) {
            return Some(p);
        }
        if let Some(p) = self.speed_drift(&records) {
            return Some(p);
        }
        if let Some(p) = self.repetition_anomaly(&records) {
            return Some(p);
        }
        self.warning_accumulation(&records)
    }

    /// Risk ordinals in the second half of the window outweigh the first
    /// half by more than the configured ratio.
    ///
    /// The split is `first = w/2` records, `second = w - w/2`; with an odd
    /// window the second half carries the extra record.
    fn escalating_access(&self, records: &[&OperationRecord]) -> Option<DriftPattern> {
        let window = self.params.escalation_window;
        if window < 2 || records.len() < window {
            return None;
        }
        let tail = &records[records.len() - window..];
        let half = window / 2;
        let first: u32 = tail[..half].iter().map(|r| r.risk.ordinal() as u32).sum();
        let second: u32 = tail[half..].iter().map(|r| r.risk.ordinal() as u32).sum();

        if second as f64 > self.params.escalation_ratio * first as f64 {
            Some(DriftPattern {
                kind: DriftKind::EscalatingAccess,
                description: format!(
                    "risk escalating over last {window} operations (first-half score {first}, second-half {second})"
                ),
                severity: DriftKind::EscalatingAccess.severity(),
            })
        } else {
            None
        }
    }

    /// External operations ramping up: second-half count exceeds both
    /// twice the first half and the absolute floor.
    fn external_drift(&self, records: &[&OperationRecord]) -> Option<DriftPattern> {
        let window = self.params.external_window;
        if window < 2 || records.len() < window {
            return None;
        }
        let tail = &records[records.len() - window..];
        let half = window / 2;
        let first = tail[..half].iter().filter(|r| r.is_external).count();
        let second = tail[half..].iter().filter(|r| r.is_external).count();

        if second > (2 * first).max(self.params.external_min) {
            Some(DriftPattern {
                kind: DriftKind::ExternalDrift,
                description: format!(
                    "external operations ramping up ({first} in first half, {second} in second half of last {window})"
                ),
                severity: DriftKind::ExternalDrift.severity(),
            })
        } else {
            None
        }
    }

    /// Operations arriving faster than the configured pace. A window with
    /// zero (or negative) elapsed time is treated as drift: a burst of
    /// identical timestamps is indistinguishable from a runaway loop here.
    fn speed_drift(&self, records: &[&OperationRecord]) -> Option<DriftPattern> {
        let window = self.params.speed_window;
        if window < 2 || records.len() < window {
            return None;
        }
        let tail = &records[records.len() - window..];
        let elapsed_ms = (tail[window - 1].timestamp - tail[0].timestamp).num_milliseconds();

        let description = if elapsed_ms <= 0 {
            format!("{window} operations with no measurable elapsed time")
        } else {
            let per_minute = window as f64 / (elapsed_ms as f64 / 1000.0) * 60.0;
            if per_minute <= self.params.speed_threshold_per_minute {
                return None;
            }
            format!(
                "{per_minute:.0} ops/min over last {window} operations (limit {:.0})",
                self.params.speed_threshold_per_minute
            )
        };

        Some(DriftPattern {
            kind: DriftKind::SpeedDrift,
            description,
            severity: DriftKind::SpeedDrift.severity(),
        })
    }

    /// Same resource hammered repeatedly within the window. Records with
    /// no resource identifier are ignored.
    fn repetition_anomaly(&self, records: &[&OperationRecord]) -> Option<DriftPattern> {
        let window = self.params.repetition_window;
        let start = records.len().saturating_sub(window);
        let tail = &records[start..];

        let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
        for record in tail.iter().filter(|r| !r.resource.is_empty()) {
            *counts.entry(record.resource.as_str()).or_insert(0) += 1;
        }

        let (resource, count) = counts.into_iter().max_by_key(|(_, n)| *n)?;
        if count >= self.params.repetition_threshold {
            Some(DriftPattern {
                kind: DriftKind::RepetitionAnomaly,
                description: format!(
                    "resource '{resource}' touched {count} times in last {window} operations"
                ),
                severity: DriftKind::RepetitionAnomaly.severity(),
            })
        } else {
            None
        }
    }

    /// Warnings piling up across the window.
    fn warning_accumulation(&self, records: &[&OperationRecord]) -> Option<DriftPattern> {
        let window = self.params.warning_window;
        let start = records.len().saturating_sub(window);
        let total: u32 = records[start..].iter().map(|r| r.warnings).sum();

        if total >= self.params.warning_threshold {
            Some(DriftPattern {
                kind: DriftKind::WarningAccumulation,
                description: format!("{total} warnings across last {window} operations"),
                severity: DriftKind::WarningAccumulation.severity(),
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::risk::RiskLevel;
    use chrono::Duration;

    fn record(operation: &str, risk: RiskLevel) -> OperationRecord {
        OperationRecord::new(operation, risk, &Context::new(), 0)
    }

    fn record_at(operation: &str, risk: RiskLevel, at: DateTime<Utc>) -> OperationRecord {
        let mut r = record(operation, risk);
        r.timestamp = at;
        r
    }

    fn spaced_history(records: Vec<OperationRecord>) -> VecDeque<OperationRecord> {
        // Spread timestamps a minute apart so speed_drift stays quiet.
        let base = Utc::now() - Duration::minutes(records.len() as i64);
        records
            .into_iter()
            .enumerate()
            .map(|(i, mut r)| {
                r.timestamp = base + Duration::minutes(i as i64);
                r
            })
            .collect()
    }

    #[test]
    fn test_empty_history_no_drift() {
        let detector = DriftDetector::default();
        assert!(detector.scan(&VecDeque::new()).is_none());
    }

    #[test]
    fn test_escalating_access_detected() {
        let mut records = Vec::new();
        for _ in 0..5 {
            records.push(record("read", RiskLevel::Safe));
        }
        for _ in 0..5 {
            records.push(record("send", RiskLevel::High));
        }
        let history = spaced_history(records);

        let pattern = DriftDetector::default().scan(&history).unwrap();
        assert_eq!(pattern.kind, DriftKind::EscalatingAccess);
        assert_eq!(pattern.severity, DriftSeverity::Checkpoint);
    }

    #[test]
    fn test_flat_risk_no_escalation() {
        let history = spaced_history(vec![record("read", RiskLevel::Low); 10]);
        let detector = DriftDetector::default();
        assert!(detector.scan(&history).is_none());
    }

    #[test]
    fn test_escalation_needs_full_window() {
        let mut records = vec![record("read", RiskLevel::Safe)];
        records.push(record("send", RiskLevel::High));
        let history = spaced_history(records);
        assert!(DriftDetector::default().scan(&history).is_none());
    }

    #[test]
    fn test_external_drift_detected() {
        let mut records = Vec::new();
        for _ in 0..10 {
            records.push(record("read", RiskLevel::Safe));
        }
        for i in 0..10 {
            let mut r = record("fetch", RiskLevel::Safe);
            // 6 external ops in the second half, none in the first
            r.is_external = i >= 4;
            records.push(r);
        }
        let history = spaced_history(records);

        let pattern = DriftDetector::default().scan(&history).unwrap();
        assert_eq!(pattern.kind, DriftKind::ExternalDrift);
        assert_eq!(pattern.severity, DriftSeverity::ReduceBudget);
    }

    #[test]
    fn test_external_below_floor_not_drift() {
        let mut records = Vec::new();
        for i in 0..20 {
            let mut r = record("fetch", RiskLevel::Safe);
            r.is_external = i >= 17; // only 3 external, at the floor
            records.push(r);
        }
        let history = spaced_history(records);
        assert!(DriftDetector::default().scan(&history).is_none());
    }

    #[test]
    fn test_speed_drift_on_burst() {
        let now = Utc::now();
        let history: VecDeque<OperationRecord> = (0..10)
            .map(|i| {
                record_at(
                    "op",
                    RiskLevel::Safe,
                    now + Duration::milliseconds(i * 100), // 10 ops in under a second
                )
            })
            .collect();

        let pattern = DriftDetector::default().scan(&history).unwrap();
        assert_eq!(pattern.kind, DriftKind::SpeedDrift);
        assert_eq!(pattern.severity, DriftSeverity::SlowDown);
    }

    #[test]
    fn test_speed_drift_on_zero_elapsed() {
        let now = Utc::now();
        let history: VecDeque<OperationRecord> =
            (0..10).map(|_| record_at("op", RiskLevel::Safe, now)).collect();

        let pattern = DriftDetector::default().scan(&history).unwrap();
        assert_eq!(pattern.kind, DriftKind::SpeedDrift);
    }

    #[test]
    fn test_slow_pace_not_drift() {
        let history = spaced_history(vec![record("op", RiskLevel::Safe); 10]);
        assert!(DriftDetector::default().scan(&history).is_none());
    }

    #[test]
    fn test_repetition_anomaly() {
        let ctx = Context::new().with("path", "/same/file.txt");
        let records: Vec<OperationRecord> = (0..8)
            .map(|_| OperationRecord::new("read", RiskLevel::Safe, &ctx, 0))
            .collect();
        let history = spaced_history(records);

        let pattern = DriftDetector::default().scan(&history).unwrap();
        assert_eq!(pattern.kind, DriftKind::RepetitionAnomaly);
        assert!(pattern.description.contains("/same/file.txt"));
    }

    #[test]
    fn test_repetition_ignores_empty_resource() {
        let history = spaced_history(vec![record("read", RiskLevel::Safe); 10]);
        assert!(DriftDetector::default().scan(&history).is_none());
    }

    #[test]
    fn test_warning_accumulation() {
        let records: Vec<OperationRecord> = (0..10)
            .map(|_| OperationRecord::new("op", RiskLevel::Safe, &Context::new(), 1))
            .collect();
        let history = spaced_history(records);

        let pattern = DriftDetector::default().scan(&history).unwrap();
        assert_eq!(pattern.kind, DriftKind::WarningAccumulation);
        assert_eq!(pattern.severity, DriftSeverity::Checkpoint);
    }

    #[test]
    fn test_scan_order_first_hit_wins() {
        // History that escalates AND accumulates warnings: escalation is
        // scanned first, so it must win.
        let mut records = Vec::new();
        for _ in 0..5 {
            records.push(OperationRecord::new("read", RiskLevel::Safe, &Context::new(), 1));
        }
        for _ in 0..5 {
            records.push(OperationRecord::new("send", RiskLevel::High, &Context::new(), 1));
        }
        let history = spaced_history(records);

        let pattern = DriftDetector::default().scan(&history).unwrap();
        assert_eq!(pattern.kind, DriftKind::EscalatingAccess);
    }

    #[test]
    fn test_alert_from_pattern() {
        let pattern = DriftPattern {
            kind: DriftKind::SpeedDrift,
            description: "too fast".to_string(),
            severity: DriftSeverity::SlowDown,
        };
        let alert = Alert::from_pattern(&pattern);

        assert_eq!(alert.pattern, "speed_drift");
        assert_eq!(alert.severity, DriftSeverity::SlowDown);
        assert!(!alert.acknowledged);
    }
}
