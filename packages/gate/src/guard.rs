//! Ballast-Gate: Guard Façade
//!
//! Composes the constraint validator and the smart anchor behind one
//! admission surface, and decouples decision from effect through the
//! enforcement mode:
//!
//! - `disabled`: no checks, everything passes
//! - `shadow`: decisions computed and recorded, nothing blocked
//! - `soft`: block High/Critical only, shadow the rest
//! - `enforce`: full enforcement
//!
//! One guard serves one agent-execution context. Every public entry point
//! takes the internal lock; `pre_check` holds it through decision
//! recording and subscriber dispatch, so subscribers must not re-enter
//! the guard.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};

use ballast_anchor::{
    AlertCallback, AnchorStatus, Context, PostCheckResult, RiskLevel, SmartAnchor,
};

use crate::config::GuardConfig;
use crate::error::GuardError;
use crate::metrics::{GuardMetrics, MetricsSummary};
use crate::validator::ConstraintValidator;

/// Context keys copied into a decision's summary. Everything else is
/// omitted so secrets never reach logs or the wire.
const SAFE_CONTEXT_KEYS: [&str; 8] = [
    "operation",
    "risk_level",
    "path",
    "resource",
    "is_external",
    "is_write",
    "is_destructive",
    "user_id",
];

/// Enforcement posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardMode {
    /// No checks
    Disabled,
    /// Log only, never block
    Shadow,
    /// Block High/Critical, shadow the rest
    Soft,
    /// Full enforcement
    Enforce,
}

impl GuardMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GuardMode::Disabled => "disabled",
            GuardMode::Shadow => "shadow",
            GuardMode::Soft => "soft",
            GuardMode::Enforce => "enforce",
        }
    }

    /// Mode policy: turn "would block" into "actually block".
    fn should_block(self, would_block: bool, risk: RiskLevel) -> bool {
        if !would_block {
            return false;
        }
        match self {
            GuardMode::Disabled | GuardMode::Shadow => false,
            GuardMode::Soft => matches!(risk, RiskLevel::High | RiskLevel::Critical),
            GuardMode::Enforce => true,
        }
    }
}

impl std::fmt::Display for GuardMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one admission decision.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub mode: GuardMode,
    pub risk_level: RiskLevel,
    /// Would the engine have blocked this?
    pub would_block: bool,
    /// Did the mode policy actually block it?
    pub actually_blocked: bool,
    /// Blocking issues when blocked, warnings otherwise
    pub reasons: Vec<String>,
    /// Whitelisted context subset
    pub context_summary: serde_json::Map<String, serde_json::Value>,
    pub trust_score: f64,
    pub budget_remaining: f64,
}

/// What the caller gets back from `pre_check`.
#[derive(Debug, Clone)]
pub struct Verdict {
    /// May the operation proceed?
    pub allowed: bool,
    /// Blocking issues when denied, warnings when allowed
    pub messages: Vec<String>,
}

/// Minimal state snapshot for external observers.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub mode: GuardMode,
    pub trust_score: f64,
    pub budget_remaining: f64,
}

/// Full structured status.
#[derive(Serialize)]
pub struct GuardStatus {
    pub mode: GuardMode,
    pub anchor: AnchorStatus,
    pub metrics: MetricsSummary,
    pub constraints_registered: usize,
}

/// Callback invoked with every recorded decision.
pub type DecisionCallback = Box<dyn Fn(&Decision) + Send + Sync>;

struct GuardCore {
    mode: GuardMode,
    validator: ConstraintValidator,
    anchor: SmartAnchor,
    metrics: GuardMetrics,
    decisions: VecDeque<Decision>,
    max_decisions: usize,
    subscribers: Vec<DecisionCallback>,
    budget_size: f64,
}

impl GuardCore {
    fn record_decision(&mut self, decision: Decision) {
        tracing::info!(
            operation = %decision.operation,
            mode = %decision.mode,
            risk = %decision.risk_level,
            would_block = decision.would_block,
            actually_blocked = decision.actually_blocked,
            trust = decision.trust_score,
            budget = decision.budget_remaining,
            "decision recorded"
        );

        self.metrics.record(&decision);

        if self.decisions.len() >= self.max_decisions {
            self.decisions.pop_front();
        }
        self.decisions.push_back(decision);

        // One panicking subscriber must not starve the rest.
        let decision = self.decisions.back().expect("just pushed");
        for subscriber in &self.subscribers {
            if catch_unwind(AssertUnwindSafe(|| subscriber(decision))).is_err() {
                tracing::warn!(operation = %decision.operation, "decision subscriber panicked, ignoring");
            }
        }
    }
}

/// Zero-trust admission layer for AI-agent operations.
///
/// ```no_run
/// use ballast_anchor::Context;
/// use ballast_gate::Guard;
///
/// let guard = Guard::new();
/// guard.on_human_message();
///
/// let ctx = Context::new().with("path", "/data/x.json").with("is_write", true);
/// let verdict = guard.pre_check("file_write", &ctx);
/// if verdict.allowed {
///     // ... do the write ...
///     guard.post_record("file_write", &ctx, 0, false);
/// }
/// ```
pub struct Guard {
    core: Mutex<GuardCore>,
}

impl Default for Guard {
    fn default() -> Self {
        Self::new()
    }
}

impl Guard {
    /// A guard with default configuration and an empty constraint
    /// catalog. Seed compliance rules with
    /// [`compliance_validator`](crate::compliance::compliance_validator)
    /// and [`Guard::with_parts`].
    pub fn new() -> Self {
        Self::with_config(GuardConfig::default())
    }

    /// A guard from configuration.
    pub fn with_config(config: GuardConfig) -> Self {
        let config = config.sanitized();
        Self::with_parts(
            config.clone(),
            ConstraintValidator::new(),
            SmartAnchor::with_params(config.anchor_params()),
        )
    }

    /// Full injection: bring your own validator and anchor.
    pub fn with_parts(
        config: GuardConfig,
        validator: ConstraintValidator,
        anchor: SmartAnchor,
    ) -> Self {
        Self {
            core: Mutex::new(GuardCore {
                mode: config.mode,
                validator,
                anchor,
                metrics: GuardMetrics::new(),
                decisions: VecDeque::new(),
                max_decisions: config.max_decision_history,
                subscribers: Vec::new(),
                budget_size: config.budget_size,
            }),
        }
    }

    // ========================================================================
    // MODE MANAGEMENT
    // ========================================================================

    pub fn mode(&self) -> GuardMode {
        self.core.lock().mode
    }

    pub fn set_mode(&self, mode: GuardMode) {
        let mut core = self.core.lock();
        let from = core.mode;
        core.mode = mode;
        tracing::info!(from = %from, to = %mode, "guard mode changed");
    }

    /// Kill switch: stop checking entirely.
    pub fn disable(&self) {
        self.set_mode(GuardMode::Disabled);
    }

    /// Learning mode: record everything, block nothing.
    pub fn enable_shadow(&self) {
        self.set_mode(GuardMode::Shadow);
    }

    /// Block High/Critical only.
    pub fn enable_soft(&self) {
        self.set_mode(GuardMode::Soft);
    }

    /// Full enforcement.
    pub fn enable_enforce(&self) {
        self.set_mode(GuardMode::Enforce);
    }

    // ========================================================================
    // CORE API
    // ========================================================================

    /// Pre-operation check. Call BEFORE executing any operation.
    pub fn pre_check(&self, operation: &str, context: &Context) -> Verdict {
        self.pre_check_with_override(operation, context, None)
    }

    /// Pre-operation check with an override justification for Required
    /// constraint failures.
    pub fn pre_check_with_override(
        &self,
        operation: &str,
        context: &Context,
        override_justification: Option<&str>,
    ) -> Verdict {
        let mut core = self.core.lock();

        if core.mode == GuardMode::Disabled {
            return Verdict {
                allowed: true,
                messages: Vec::new(),
            };
        }

        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        let anchor_check = core.anchor.pre_operation(operation, context);
        let risk = anchor_check.risk;
        if let Some(reason) = &anchor_check.reason {
            issues.push(format!("[anchor] {reason}"));
        }
        warnings.extend(anchor_check.warnings);

        let validation = core
            .validator
            .validate(operation, context, override_justification);
        if !validation.can_execute() {
            issues.extend(validation.blocking_errors());
        }
        warnings.extend(validation.warnings());

        let would_block = !issues.is_empty();
        let actually_blocked = core.mode.should_block(would_block, risk);

        let decision = Decision {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            mode: core.mode,
            risk_level: risk,
            would_block,
            actually_blocked,
            reasons: if would_block {
                issues.clone()
            } else {
                warnings.clone()
            },
            context_summary: summarize_context(context),
            trust_score: core.anchor.state.trust_score,
            budget_remaining: core.anchor.state.risk_budget,
        };
        core.record_decision(decision);

        if actually_blocked {
            Verdict {
                allowed: false,
                messages: issues,
            }
        } else {
            Verdict {
                allowed: true,
                messages: warnings,
            }
        }
    }

    /// Post-operation record. Call AFTER executing an operation; debits
    /// budget and moves trust.
    pub fn post_record(
        &self,
        operation: &str,
        context: &Context,
        advisory_warnings: u32,
        constraint_violation: bool,
    ) -> PostCheckResult {
        let mut core = self.core.lock();

        if core.mode == GuardMode::Disabled {
            return PostCheckResult {
                valid: true,
                trust_delta: 0.0,
                budget_remaining: core.budget_size,
                drift_detected: None,
                recommendations: Vec::new(),
            };
        }

        core.anchor
            .post_operation(operation, context, advisory_warnings, constraint_violation)
    }

    /// Run a closure under the guard: pre-check, execute, post-record.
    /// Denied calls return [`GuardError::AdmissionDenied`] and the
    /// closure never runs. The lock is not held while the closure runs.
    pub fn guarded<T, F>(&self, operation: &str, context: &Context, f: F) -> Result<T, GuardError>
    where
        F: FnOnce() -> T,
    {
        let verdict = self.pre_check(operation, context);
        if !verdict.allowed {
            return Err(GuardError::AdmissionDenied {
                operation: operation.to_string(),
                reasons: verdict.messages,
            });
        }
        let advisory_warnings = verdict.messages.len() as u32;
        let value = f();
        self.post_record(operation, context, advisory_warnings, false);
        Ok(value)
    }

    // ========================================================================
    // HUMAN INTERACTION
    // ========================================================================

    /// The human sent a message.
    pub fn on_human_message(&self) {
        self.core.lock().anchor.human_interacted();
    }

    /// The human explicitly approved; resets the risk budget.
    pub fn on_human_approval(&self) {
        self.core.lock().anchor.human_checkpoint();
    }

    /// The human corrected the agent's output.
    pub fn on_human_correction(&self) {
        self.core.lock().anchor.human_corrected();
    }

    // ========================================================================
    // CONSTRAINTS
    // ========================================================================

    /// Register a global constraint.
    pub fn register_constraint(&self, constraint: crate::constraint::Constraint) {
        self.core.lock().validator.register(constraint);
    }

    /// Register a constraint scoped to the listed operations.
    pub fn register_constraint_for(
        &self,
        constraint: crate::constraint::Constraint,
        operations: &[&str],
    ) {
        self.core
            .lock()
            .validator
            .register_scoped(constraint, operations);
    }

    // ========================================================================
    // SUBSCRIPTIONS
    // ========================================================================

    /// Register a callback invoked with every recorded decision.
    /// Callbacks run under the guard lock and must return promptly;
    /// panics are swallowed.
    pub fn on_decision(&self, callback: DecisionCallback) {
        self.core.lock().subscribers.push(callback);
    }

    /// Register a callback invoked with every drift alert.
    pub fn on_alert(&self, callback: AlertCallback) {
        self.core.lock().anchor.on_violation(callback);
    }

    // ========================================================================
    // OBSERVABILITY
    // ========================================================================

    /// Full structured status.
    pub fn status(&self) -> GuardStatus {
        let core = self.core.lock();
        GuardStatus {
            mode: core.mode,
            anchor: core.anchor.status(),
            metrics: core.metrics.summary(),
            constraints_registered: core.validator.constraint_count(),
        }
    }

    /// Minimal snapshot for external observers.
    pub fn state_snapshot(&self) -> StateSnapshot {
        let core = self.core.lock();
        StateSnapshot {
            mode: core.mode,
            trust_score: core.anchor.state.trust_score,
            budget_remaining: core.anchor.state.risk_budget,
        }
    }

    /// Metrics snapshot.
    pub fn metrics(&self) -> MetricsSummary {
        self.core.lock().metrics.summary()
    }

    /// The most recent `n` decisions, oldest first.
    pub fn recent_decisions(&self, n: usize) -> Vec<Decision> {
        let core = self.core.lock();
        let skip = core.decisions.len().saturating_sub(n);
        core.decisions.iter().skip(skip).cloned().collect()
    }

    /// Which risk levels could proceed right now.
    pub fn can_proceed_levels(&self) -> std::collections::BTreeMap<RiskLevel, bool> {
        let core = self.core.lock();
        if core.mode == GuardMode::Disabled {
            return RiskLevel::ALL.iter().map(|&r| (r, true)).collect();
        }
        core.anchor.can_proceed_levels()
    }

    /// One-screen human-readable state.
    pub fn explain(&self) -> String {
        let core = self.core.lock();
        let summary = core.metrics.summary();
        let mut lines = vec![
            format!("Mode: {}", core.mode),
            core.anchor.explain(),
            format!(
                "Checks: {} total, {} would-block, {} blocked",
                summary.total_checks, summary.would_block_count, summary.actually_blocked_count
            ),
        ];
        if summary.shadow_passes > 0 {
            lines.push(format!(
                "Shadow passes: {} (would block but allowed)",
                summary.shadow_passes
            ));
        }
        lines.join("\n")
    }

    /// Short human-readable log of recent decisions.
    pub fn decisions_summary(&self) -> String {
        let core = self.core.lock();
        if core.decisions.is_empty() {
            return "No decisions recorded yet.".to_string();
        }
        let mut lines = vec!["Recent decisions:".to_string()];
        let skip = core.decisions.len().saturating_sub(10);
        for d in core.decisions.iter().skip(skip) {
            let status = if d.actually_blocked {
                "BLOCKED"
            } else if d.would_block {
                "WOULD-BLOCK"
            } else {
                "PASS"
            };
            lines.push(format!(
                "  {} {} [{}] {}",
                d.timestamp.format("%H:%M:%S"),
                d.operation,
                d.risk_level,
                status
            ));
        }
        lines.join("\n")
    }
}

fn summarize_context(context: &Context) -> serde_json::Map<String, serde_json::Value> {
    SAFE_CONTEXT_KEYS
        .iter()
        .filter_map(|&key| context.get(key).map(|v| (key.to_string(), v.clone())))
        .collect()
}
