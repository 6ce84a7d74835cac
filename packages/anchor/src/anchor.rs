//! Ballast-Anchor: Risk-Weighted Autonomy
//!
//! The anchor holds the agent's standing with its human principal: a
//! bounded risk budget that risky operations deplete, a continuous trust
//! score that behavior moves, and a bounded operation history that the
//! drift detector reads. Human interaction is the only thing that refills
//! the budget.
//!
//! Protocol per operation:
//! - `pre_operation` gates on risk, trust, budget, drift, and human
//!   staleness. It mutates nothing.
//! - `post_operation` debits the budget, appends history, moves trust,
//!   and re-scans for drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::context::Context;
use crate::drift::{Alert, DriftDetector, DriftKind, DriftParams, DriftPattern, DriftSeverity};
use crate::record::OperationRecord;
use crate::risk::RiskLevel;
use crate::trust::TrustLevel;

/// Synthetic operation name appended by `human_corrected`.
const CORRECTION_OP: &str = "_correction";

/// Trust penalty when corrections pile up (more than 3 in the last 10
/// records).
const REPEAT_CORRECTION_PENALTY: f64 = 0.05;

/// Budget level below which the anchor starts recommending a checkpoint.
const LOW_BUDGET_FLOOR: f64 = 0.3;

/// Clean streak length at which the streak bonus kicks in.
const STREAK_BONUS_AT: u32 = 10;

// ============================================================================
// PARAMETERS & STATE
// ============================================================================

/// Anchor tunables. Defaults are the documented behavior; every knob can
/// be overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorParams {
    /// Trust score at construction
    pub initial_trust: f64,
    /// Budget ceiling; checkpoints restore to this
    pub budget_size: f64,
    /// Per-level cost overrides; absent levels use the base schedule
    pub risk_costs: HashMap<RiskLevel, f64>,
    /// Per-level trust-threshold overrides
    pub trust_required: HashMap<RiskLevel, f64>,
    /// Trust gained per clean operation
    pub trust_boost_clean: f64,
    /// Extra trust per clean operation once the streak is established
    pub trust_boost_streak: f64,
    /// Trust gained when the human sends a message
    pub trust_boost_interaction: f64,
    /// Trust gained at an explicit checkpoint
    pub trust_boost_checkpoint: f64,
    /// Trust lost per advisory warning
    pub trust_penalty_warning: f64,
    /// Trust lost on a constraint violation
    pub trust_penalty_violation: f64,
    /// Extra budget debit when reduce_budget drift fires
    pub drift_budget_penalty: f64,
    /// Medium/High operations are denied after this long without a human
    pub max_minutes_without_human: i64,
    /// Operation history capacity (FIFO eviction)
    pub history_size: usize,
    /// Drift detector thresholds
    pub drift: DriftParams,
}

impl Default for AnchorParams {
    fn default() -> Self {
        Self {
            initial_trust: 0.7,
            budget_size: 1.0,
            risk_costs: HashMap::new(),
            trust_required: HashMap::new(),
            trust_boost_clean: 0.005,
            trust_boost_streak: 0.01,
            trust_boost_interaction: 0.05,
            trust_boost_checkpoint: 0.1,
            trust_penalty_warning: 0.02,
            trust_penalty_violation: 0.2,
            drift_budget_penalty: 0.2,
            max_minutes_without_human: 60,
            history_size: 100,
            drift: DriftParams::default(),
        }
    }
}

impl AnchorParams {
    /// Budget cost for one operation at this level.
    pub fn cost_of(&self, risk: RiskLevel) -> f64 {
        self.risk_costs.get(&risk).copied().unwrap_or(risk.base_cost())
    }

    /// Minimum trust score required to attempt this level.
    pub fn trust_required_for(&self, risk: RiskLevel) -> f64 {
        self.trust_required
            .get(&risk)
            .copied()
            .unwrap_or(risk.base_trust_required())
    }
}

/// The anchor's mutable state. Bounded on every update: trust stays in
/// [0, 1], budget in [0, budget_size].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorState {
    pub risk_budget: f64,
    pub trust_score: f64,
    pub last_checkpoint: DateTime<Utc>,
    pub last_human_interaction: DateTime<Utc>,
    pub consecutive_clean_ops: u32,
    pub total_ops_since_checkpoint: u64,
    pub warnings_since_checkpoint: u32,
}

impl AnchorState {
    fn new(params: &AnchorParams) -> Self {
        let now = Utc::now();
        Self {
            risk_budget: params.budget_size,
            trust_score: params.initial_trust.clamp(0.0, 1.0),
            last_checkpoint: now,
            last_human_interaction: now,
            consecutive_clean_ops: 0,
            total_ops_since_checkpoint: 0,
            warnings_since_checkpoint: 0,
        }
    }

    /// Named band for the current trust score.
    pub fn trust_level(&self) -> TrustLevel {
        TrustLevel::from_score(self.trust_score)
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// Why an operation was denied. `tag()` is the machine-readable form;
/// `Display` is the human one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Critical risk is never admissible automatically
    CriticalRequiresHuman,
    /// Trust score below the level's threshold
    TrustBelowThreshold {
        trust: f64,
        required: f64,
        risk: RiskLevel,
    },
    /// Budget would go negative
    BudgetDepleted { budget: f64, cost: f64 },
    /// A checkpoint-severity drift pattern fired
    Drift { kind: DriftKind },
    /// Too long since the human was last heard from
    NoHumanInteraction { minutes: i64 },
}

impl DenyReason {
    /// Stable machine-readable reason tag.
    pub fn tag(&self) -> String {
        match self {
            DenyReason::CriticalRequiresHuman => "critical".to_string(),
            DenyReason::TrustBelowThreshold { .. } => "trust_below_threshold".to_string(),
            DenyReason::BudgetDepleted { .. } => "budget_depleted".to_string(),
            DenyReason::Drift { kind } => format!("drift_{kind}"),
            DenyReason::NoHumanInteraction { .. } => "no_human_interaction".to_string(),
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::CriticalRequiresHuman => {
                write!(f, "critical risk requires human confirmation")
            }
            DenyReason::TrustBelowThreshold {
                trust,
                required,
                risk,
            } => write!(f, "trust {trust:.2} below threshold {required:.2} for {risk} risk"),
            DenyReason::BudgetDepleted { budget, cost } => write!(
                f,
                "risk budget depleted ({budget:.2} remaining, operation costs {cost:.2})"
            ),
            DenyReason::Drift { kind } => write!(f, "drift: {kind}"),
            DenyReason::NoHumanInteraction { minutes } => {
                write!(f, "no human interaction for {minutes} minutes")
            }
        }
    }
}

/// Result of the admission gate.
#[derive(Debug, Clone, Serialize)]
pub struct PreCheckResult {
    /// May the operation proceed?
    pub can_proceed: bool,
    /// Populated exactly when denied
    pub reason: Option<DenyReason>,
    /// Risk level the operation was assessed at
    pub risk: RiskLevel,
    /// Budget after the operation would run (may be negative on denial)
    pub budget_after: f64,
    /// Trust band at check time
    pub trust_level: TrustLevel,
    /// Non-blocking drift warnings
    pub warnings: Vec<String>,
}

/// Result of recording a completed operation.
#[derive(Debug, Clone, Serialize)]
pub struct PostCheckResult {
    /// False when a constraint violation was recorded
    pub valid: bool,
    /// Signed trust movement this operation caused
    pub trust_delta: f64,
    /// Budget after the debit and any drift penalty
    pub budget_remaining: f64,
    /// Pattern the post-scan found, if any
    pub drift_detected: Option<DriftKind>,
    /// Operator guidance
    pub recommendations: Vec<String>,
}

/// Structured anchor snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct AnchorStatus {
    pub state: AnchorState,
    pub trust_level: TrustLevel,
    pub can_proceed_levels: BTreeMap<RiskLevel, bool>,
    pub drift_check: Option<DriftPattern>,
    pub params: AnchorParams,
}

/// Callback invoked with every drift alert.
pub type AlertCallback = Box<dyn Fn(&Alert) + Send + Sync>;

// ============================================================================
// SMART ANCHOR
// ============================================================================

/// Risk-weighted autonomy controller.
///
/// Owns its state and history exclusively; the guard serializes access.
/// Not internally synchronized.
pub struct SmartAnchor {
    params: AnchorParams,
    /// Mutable state; bounded on every update
    pub state: AnchorState,
    history: VecDeque<OperationRecord>,
    detector: DriftDetector,
    alert_callbacks: Vec<AlertCallback>,
}

impl Default for SmartAnchor {
    fn default() -> Self {
        Self::new()
    }
}

impl SmartAnchor {
    /// Create an anchor with default parameters.
    pub fn new() -> Self {
        Self::with_params(AnchorParams::default())
    }

    /// Create an anchor with explicit parameters.
    pub fn with_params(params: AnchorParams) -> Self {
        let state = AnchorState::new(&params);
        let detector = DriftDetector::new(params.drift.clone());
        Self {
            params,
            state,
            history: VecDeque::new(),
            detector,
            alert_callbacks: Vec::new(),
        }
    }

    /// Override the starting trust score.
    pub fn with_initial_trust(mut self, trust: f64) -> Self {
        self.state.trust_score = trust.clamp(0.0, 1.0);
        self
    }

    pub fn params(&self) -> &AnchorParams {
        &self.params
    }

    /// The bounded operation history, oldest first.
    pub fn history(&self) -> &VecDeque<OperationRecord> {
        &self.history
    }

    /// Register a callback for drift alerts. Callback panics are swallowed
    /// so one bad subscriber cannot take down the scan.
    pub fn on_violation(&mut self, callback: AlertCallback) {
        self.alert_callbacks.push(callback);
    }

    // ========================================================================
    // RISK INFERENCE
    // ========================================================================

    /// Determine the risk level for an operation.
    ///
    /// An explicit `risk_level` context key wins. Otherwise the context
    /// flags are consulted in a fixed order (external outranks write, so
    /// an external write is High), then the operation name is matched by
    /// case-insensitive substring.
    pub fn assess_risk(&self, operation: &str, context: &Context) -> RiskLevel {
        if let Some(raw) = context.get_str("risk_level") {
            match RiskLevel::parse(raw) {
                Some(level) => return level,
                None => {
                    tracing::warn!(
                        risk_level = raw,
                        operation,
                        "unrecognized risk_level in context, falling back to inference"
                    );
                }
            }
        }

        if context.get_bool("is_external") {
            return RiskLevel::High;
        }
        if context.get_bool("involves_phi") {
            return RiskLevel::High;
        }
        if context.get_bool("is_destructive") {
            return RiskLevel::Medium;
        }
        if context.get_bool("is_write") {
            return RiskLevel::Low;
        }

        let name = operation.to_ascii_lowercase();
        let contains_any = |words: &[&str]| words.iter().any(|w| name.contains(w));

        if contains_any(&["delete", "remove", "drop", "truncate"]) {
            RiskLevel::Medium
        } else if contains_any(&["write", "update", "create", "insert"]) {
            RiskLevel::Low
        } else if contains_any(&["send", "post", "email", "publish"]) {
            RiskLevel::High
        } else if contains_any(&["execute", "run", "eval"]) {
            RiskLevel::Medium
        } else {
            RiskLevel::Safe
        }
    }

    // ========================================================================
    // PRE-OPERATION
    // ========================================================================

    /// Admission gate. Call BEFORE executing an operation; mutates nothing.
    pub fn pre_operation(&self, operation: &str, context: &Context) -> PreCheckResult {
        let risk = self.assess_risk(operation, context);
        let cost = self.params.cost_of(risk);
        let budget_after = self.state.risk_budget - cost;
        let trust_level = self.state.trust_level();
        let mut warnings = Vec::new();

        let denied = |reason: DenyReason| {
            tracing::info!(operation, risk = %risk, reason = %reason, "operation denied");
            PreCheckResult {
                can_proceed: false,
                reason: Some(reason),
                risk,
                budget_after,
                trust_level,
                warnings: Vec::new(),
            }
        };

        if risk == RiskLevel::Critical {
            return denied(DenyReason::CriticalRequiresHuman);
        }

        let required = self.params.trust_required_for(risk);
        if self.state.trust_score < required {
            return denied(DenyReason::TrustBelowThreshold {
                trust: self.state.trust_score,
                required,
                risk,
            });
        }

        if budget_after < 0.0 {
            return denied(DenyReason::BudgetDepleted {
                budget: self.state.risk_budget,
                cost,
            });
        }

        if let Some(pattern) = self.detector.scan(&self.history) {
            self.emit_alert(&pattern);
            match pattern.severity {
                DriftSeverity::Checkpoint => {
                    return denied(DenyReason::Drift { kind: pattern.kind });
                }
                DriftSeverity::ReduceBudget | DriftSeverity::SlowDown => {
                    warnings.push(format!("drift: {} ({})", pattern.kind, pattern.description));
                }
            }
        }

        let idle_minutes = (Utc::now() - self.state.last_human_interaction).num_minutes();
        if idle_minutes > self.params.max_minutes_without_human
            && matches!(risk, RiskLevel::Medium | RiskLevel::High)
        {
            return denied(DenyReason::NoHumanInteraction {
                minutes: idle_minutes,
            });
        }

        PreCheckResult {
            can_proceed: true,
            reason: None,
            risk,
            budget_after,
            trust_level,
            warnings,
        }
    }

    // ========================================================================
    // POST-OPERATION
    // ========================================================================

    /// Record a completed operation. Call AFTER execution; debits budget,
    /// appends history, moves trust, re-scans for drift.
    pub fn post_operation(
        &mut self,
        operation: &str,
        context: &Context,
        advisory_warnings: u32,
        constraint_violation: bool,
    ) -> PostCheckResult {
        let risk = self.assess_risk(operation, context);
        let cost = self.params.cost_of(risk);
        let trust_before = self.state.trust_score;
        let mut recommendations = Vec::new();

        self.state.risk_budget = (self.state.risk_budget - cost).max(0.0);
        self.state.total_ops_since_checkpoint += 1;

        self.push_record(OperationRecord::new(operation, risk, context, advisory_warnings));

        // Trust moves by exactly one branch per operation.
        if constraint_violation {
            self.state.trust_score =
                clamp01(self.state.trust_score - self.params.trust_penalty_violation);
            self.state.consecutive_clean_ops = 0;
            recommendations.push("constraint violation recorded, checkpoint with a human".to_string());
        } else if advisory_warnings > 0 {
            self.state.trust_score = clamp01(
                self.state.trust_score
                    - self.params.trust_penalty_warning * advisory_warnings as f64,
            );
            self.state.warnings_since_checkpoint += advisory_warnings;
            self.state.consecutive_clean_ops = 0;
        } else {
            self.state.consecutive_clean_ops += 1;
            let mut boosted = self.state.trust_score + self.params.trust_boost_clean;
            if self.state.consecutive_clean_ops >= STREAK_BONUS_AT {
                boosted += self.params.trust_boost_streak;
            }
            self.state.trust_score = clamp01(boosted);
        }

        let mut drift_detected = None;
        if let Some(pattern) = self.detector.scan(&self.history) {
            self.emit_alert(&pattern);
            drift_detected = Some(pattern.kind);
            match pattern.severity {
                DriftSeverity::ReduceBudget => {
                    self.state.risk_budget =
                        (self.state.risk_budget - self.params.drift_budget_penalty).max(0.0);
                    recommendations
                        .push(format!("drift '{}' detected, risk budget reduced", pattern.kind));
                }
                DriftSeverity::SlowDown => {
                    recommendations.push(format!("drift '{}' detected, slow down", pattern.kind));
                }
                DriftSeverity::Checkpoint => {
                    recommendations.push(format!(
                        "drift '{}' detected, checkpoint with a human",
                        pattern.kind
                    ));
                }
            }
        }

        if self.state.risk_budget < LOW_BUDGET_FLOOR {
            recommendations.push("risk budget low, checkpoint with a human soon".to_string());
        }

        let result = PostCheckResult {
            valid: !constraint_violation,
            trust_delta: self.state.trust_score - trust_before,
            budget_remaining: self.state.risk_budget,
            drift_detected,
            recommendations,
        };

        tracing::debug!(
            operation,
            risk = %risk,
            trust = self.state.trust_score,
            budget = self.state.risk_budget,
            drift = ?result.drift_detected,
            "operation recorded"
        );

        result
    }

    // ========================================================================
    // HUMAN INTERACTION
    // ========================================================================

    /// The human sent a message.
    pub fn human_interacted(&mut self) {
        self.state.last_human_interaction = Utc::now();
        self.state.trust_score =
            clamp01(self.state.trust_score + self.params.trust_boost_interaction);
        tracing::debug!(trust = self.state.trust_score, "human interaction recorded");
    }

    /// The human explicitly approved; budget refills, clocks reset.
    /// The clean streak is earned behavior and survives a checkpoint.
    pub fn human_checkpoint(&mut self) {
        let now = Utc::now();
        self.state.risk_budget = self.params.budget_size;
        self.state.trust_score =
            clamp01(self.state.trust_score + self.params.trust_boost_checkpoint);
        self.state.last_checkpoint = now;
        self.state.last_human_interaction = now;
        self.state.total_ops_since_checkpoint = 0;
        self.state.warnings_since_checkpoint = 0;
        tracing::info!(
            trust = self.state.trust_score,
            budget = self.state.risk_budget,
            "human checkpoint"
        );
    }

    /// The human corrected the agent's output. Counts as interaction, but
    /// repeated corrections erode trust.
    pub fn human_corrected(&mut self) {
        self.human_interacted();
        self.push_record(OperationRecord::new(
            CORRECTION_OP,
            RiskLevel::Safe,
            &Context::new(),
            0,
        ));

        let recent_corrections = self
            .history
            .iter()
            .rev()
            .take(10)
            .filter(|r| r.operation == CORRECTION_OP)
            .count();
        if recent_corrections > 3 {
            self.state.trust_score =
                clamp01(self.state.trust_score - REPEAT_CORRECTION_PENALTY);
            tracing::warn!(
                recent_corrections,
                trust = self.state.trust_score,
                "repeated corrections, trust reduced"
            );
        }
    }

    // ========================================================================
    // OBSERVABILITY
    // ========================================================================

    /// Which risk levels could proceed right now (ignoring drift and
    /// staleness, which depend on the specific call).
    pub fn can_proceed_levels(&self) -> BTreeMap<RiskLevel, bool> {
        RiskLevel::ALL
            .iter()
            .map(|&level| {
                let ok = level != RiskLevel::Critical
                    && self.state.trust_score >= self.params.trust_required_for(level)
                    && self.state.risk_budget >= self.params.cost_of(level);
                (level, ok)
            })
            .collect()
    }

    /// Structured snapshot, including a side-effect-free drift check.
    pub fn status(&self) -> AnchorStatus {
        AnchorStatus {
            state: self.state.clone(),
            trust_level: self.state.trust_level(),
            can_proceed_levels: self.can_proceed_levels(),
            drift_check: self.detector.scan(&self.history),
            params: self.params.clone(),
        }
    }

    /// One-screen human-readable state.
    pub fn explain(&self) -> String {
        let idle = (Utc::now() - self.state.last_human_interaction).num_minutes();
        format!(
            "Trust: {:.2} ({}) | Budget: {:.2} of {:.2}\nClean streak: {} | Ops since checkpoint: {} | Warnings since checkpoint: {}\nLast human interaction: {}m ago",
            self.state.trust_score,
            self.state.trust_level(),
            self.state.risk_budget,
            self.params.budget_size,
            self.state.consecutive_clean_ops,
            self.state.total_ops_since_checkpoint,
            self.state.warnings_since_checkpoint,
            idle,
        )
    }

    // ========================================================================
    // INTERNAL
    // ========================================================================

    fn push_record(&mut self, record: OperationRecord) {
        if self.history.len() >= self.params.history_size {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    fn emit_alert(&self, pattern: &DriftPattern) {
        let alert = Alert::from_pattern(pattern);
        tracing::warn!(
            pattern = %alert.pattern,
            severity = alert.severity.as_str(),
            description = %alert.description,
            "drift detected"
        );
        for callback in &self.alert_callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(&alert))).is_err() {
                tracing::warn!(pattern = %alert.pattern, "alert callback panicked, ignoring");
            }
        }
    }
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}
