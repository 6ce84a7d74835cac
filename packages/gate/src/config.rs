//! Ballast-Gate: Configuration
//!
//! Every recognized option with its documented default. Loading from a
//! file is a caller concern; this module only defines the shape and the
//! sanitization rule: an out-of-range value falls back to the default
//! with a single warning.

use serde::Deserialize;
use std::collections::HashMap;

use ballast_anchor::{AnchorParams, DriftParams, RiskLevel};

use crate::guard::GuardMode;

/// Guard configuration. All fields optional when deserialized; missing
/// fields take the documented defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Starting trust score
    pub initial_trust: f64,
    /// Risk budget ceiling
    pub budget_size: f64,
    /// Enforcement posture
    pub mode: GuardMode,
    /// Per-level budget cost overrides
    pub risk_costs: HashMap<RiskLevel, f64>,
    /// Per-level trust threshold overrides
    pub trust_required: HashMap<RiskLevel, f64>,
    pub trust_boost_clean: f64,
    pub trust_boost_streak: f64,
    pub trust_boost_interaction: f64,
    pub trust_boost_checkpoint: f64,
    pub trust_penalty_warning: f64,
    pub trust_penalty_violation: f64,
    /// Medium/High operations are denied after this long without a human
    pub max_minutes_without_human: i64,
    /// Window for the externalization drift detector
    pub drift_window_size: usize,
    /// Pace above which speed drift fires
    pub speed_threshold_per_minute: f64,
    /// Operation history capacity
    pub history_size: usize,
    /// Decision history capacity
    pub max_decision_history: usize,
    /// Where the decision bridge posts events
    pub dashboard_url: Option<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            initial_trust: 0.7,
            budget_size: 1.0,
            mode: GuardMode::Shadow,
            risk_costs: HashMap::new(),
            trust_required: HashMap::new(),
            trust_boost_clean: 0.005,
            trust_boost_streak: 0.01,
            trust_boost_interaction: 0.05,
            trust_boost_checkpoint: 0.1,
            trust_penalty_warning: 0.02,
            trust_penalty_violation: 0.2,
            max_minutes_without_human: 60,
            drift_window_size: 20,
            speed_threshold_per_minute: 60.0,
            history_size: 100,
            max_decision_history: 1000,
            dashboard_url: None,
        }
    }
}

impl GuardConfig {
    /// Replace out-of-range values with their defaults, warning once per
    /// field. Malformed configuration never blocks startup.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        if !(0.0..=1.0).contains(&self.initial_trust) || !self.initial_trust.is_finite() {
            tracing::warn!(
                value = self.initial_trust,
                default = defaults.initial_trust,
                "initial_trust out of range, using default"
            );
            self.initial_trust = defaults.initial_trust;
        }
        if !self.budget_size.is_finite() || self.budget_size <= 0.0 {
            tracing::warn!(
                value = self.budget_size,
                default = defaults.budget_size,
                "budget_size out of range, using default"
            );
            self.budget_size = defaults.budget_size;
        }
        if !self.speed_threshold_per_minute.is_finite() || self.speed_threshold_per_minute <= 0.0 {
            tracing::warn!(
                value = self.speed_threshold_per_minute,
                default = defaults.speed_threshold_per_minute,
                "speed_threshold_per_minute out of range, using default"
            );
            self.speed_threshold_per_minute = defaults.speed_threshold_per_minute;
        }
        if self.max_minutes_without_human < 1 {
            tracing::warn!(
                value = self.max_minutes_without_human,
                default = defaults.max_minutes_without_human,
                "max_minutes_without_human out of range, using default"
            );
            self.max_minutes_without_human = defaults.max_minutes_without_human;
        }
        if self.drift_window_size < 2 {
            tracing::warn!(
                value = self.drift_window_size,
                default = defaults.drift_window_size,
                "drift_window_size out of range, using default"
            );
            self.drift_window_size = defaults.drift_window_size;
        }
        if self.history_size == 0 {
            tracing::warn!(
                default = defaults.history_size,
                "history_size must be positive, using default"
            );
            self.history_size = defaults.history_size;
        }
        if self.max_decision_history == 0 {
            tracing::warn!(
                default = defaults.max_decision_history,
                "max_decision_history must be positive, using default"
            );
            self.max_decision_history = defaults.max_decision_history;
        }

        self.risk_costs.retain(|level, cost| {
            let keep = cost.is_finite() && *cost >= 0.0;
            if !keep {
                tracing::warn!(level = %level, value = *cost, "risk cost override invalid, dropped");
            }
            keep
        });
        self.trust_required.retain(|level, threshold| {
            let keep = threshold.is_finite() && (0.0..=1.0).contains(threshold);
            if !keep {
                tracing::warn!(
                    level = %level,
                    value = *threshold,
                    "trust threshold override invalid, dropped"
                );
            }
            keep
        });

        self
    }

    /// Anchor parameters derived from this configuration.
    pub fn anchor_params(&self) -> AnchorParams {
        AnchorParams {
            initial_trust: self.initial_trust,
            budget_size: self.budget_size,
            risk_costs: self.risk_costs.clone(),
            trust_required: self.trust_required.clone(),
            trust_boost_clean: self.trust_boost_clean,
            trust_boost_streak: self.trust_boost_streak,
            trust_boost_interaction: self.trust_boost_interaction,
            trust_boost_checkpoint: self.trust_boost_checkpoint,
            trust_penalty_warning: self.trust_penalty_warning,
            trust_penalty_violation: self.trust_penalty_violation,
            max_minutes_without_human: self.max_minutes_without_human,
            history_size: self.history_size,
            drift: DriftParams {
                external_window: self.drift_window_size,
                speed_threshold_per_minute: self.speed_threshold_per_minute,
                ..DriftParams::default()
            },
            ..AnchorParams::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GuardConfig::default();
        assert_eq!(config.initial_trust, 0.7);
        assert_eq!(config.budget_size, 1.0);
        assert_eq!(config.mode, GuardMode::Shadow);
        assert_eq!(config.history_size, 100);
        assert_eq!(config.max_decision_history, 1000);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: GuardConfig =
            serde_json::from_str(r#"{"initial_trust": 0.5, "mode": "enforce"}"#).unwrap();
        assert_eq!(config.initial_trust, 0.5);
        assert_eq!(config.mode, GuardMode::Enforce);
        assert_eq!(config.budget_size, 1.0);
    }

    #[test]
    fn test_sanitize_falls_back_to_defaults() {
        let config = GuardConfig {
            initial_trust: 3.0,
            budget_size: -1.0,
            speed_threshold_per_minute: 0.0,
            drift_window_size: 1,
            history_size: 0,
            ..GuardConfig::default()
        }
        .sanitized();

        assert_eq!(config.initial_trust, 0.7);
        assert_eq!(config.budget_size, 1.0);
        assert_eq!(config.speed_threshold_per_minute, 60.0);
        assert_eq!(config.drift_window_size, 20);
        assert_eq!(config.history_size, 100);
    }

    #[test]
    fn test_sanitize_drops_invalid_overrides() {
        let mut config = GuardConfig::default();
        config.risk_costs.insert(RiskLevel::High, -0.5);
        config.risk_costs.insert(RiskLevel::Low, 0.1);
        config.trust_required.insert(RiskLevel::Medium, 7.0);

        let config = config.sanitized();
        assert!(!config.risk_costs.contains_key(&RiskLevel::High));
        assert_eq!(config.risk_costs[&RiskLevel::Low], 0.1);
        assert!(config.trust_required.is_empty());
    }

    #[test]
    fn test_anchor_params_carry_overrides() {
        let mut config = GuardConfig::default();
        config.risk_costs.insert(RiskLevel::High, 0.25);
        config.drift_window_size = 30;

        let params = config.anchor_params();
        assert_eq!(params.cost_of(RiskLevel::High), 0.25);
        assert_eq!(params.drift.external_window, 30);
        // Untouched drift thresholds keep their defaults.
        assert_eq!(params.drift.repetition_threshold, 7);
    }
}
