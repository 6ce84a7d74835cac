//! Ballast-Gate: Constraint Validation & Mode-Gated Enforcement
//!
//! Zero-trust admission layer for AI-agent operations. Composes a
//! constraint validator (compliance rules and house policies) with the
//! risk-weighted anchor from `ballast-anchor`, gates every operation
//! through an enforcement mode, and streams decisions to an external
//! observer.
//!
//! ```no_run
//! use ballast_anchor::Context;
//! use ballast_gate::{compliance_validator, Guard, GuardConfig, GuardMode};
//! use ballast_gate::SmartAnchor;
//!
//! let config = GuardConfig {
//!     mode: GuardMode::Soft,
//!     ..GuardConfig::default()
//! };
//! let anchor = SmartAnchor::with_params(config.anchor_params());
//! let guard = Guard::with_parts(config, compliance_validator(), anchor);
//!
//! let ctx = Context::new().with("is_external", true).with("url", "https://api.example");
//! let verdict = guard.pre_check("http_post", &ctx);
//! if verdict.allowed {
//!     // ... perform the call ...
//!     guard.post_record("http_post", &ctx, verdict.messages.len() as u32, false);
//! }
//! ```

pub mod bridge;
pub mod compliance;
pub mod config;
pub mod constraint;
pub mod error;
pub mod guard;
pub mod metrics;
pub mod validator;

// Re-exports
pub use bridge::{AlertEvent, BridgeConfig, BridgeError, BridgeEvent, DecisionBridge, DecisionEvent, EventSender};
pub use compliance::{
    cis_constraints, compliance_validator, custom_constraints, hipaa_constraints, soc2_constraints,
};
pub use config::GuardConfig;
pub use constraint::{
    ComplianceFramework, Constraint, ConstraintResult, ConstraintSeverity, ValidationResult,
};
pub use error::GuardError;
pub use guard::{Decision, DecisionCallback, Guard, GuardMode, GuardStatus, StateSnapshot, Verdict};
pub use metrics::{GuardMetrics, MetricsSummary};
pub use validator::ConstraintValidator;

// Re-export the anchor surface so one import serves most callers.
pub use ballast_anchor::{
    Alert, AnchorParams, AnchorState, Context, DenyReason, DriftKind, DriftParams, DriftSeverity,
    PostCheckResult, PreCheckResult, RiskLevel, SmartAnchor, TrustLevel,
};

use once_cell::sync::OnceCell;

static DEFAULT_GUARD: OnceCell<Guard> = OnceCell::new();

/// Initialize the process-wide guard. The first call wins; later calls
/// return the already-initialized instance and their configuration is
/// ignored. Prefer explicit [`Guard`] injection where you can.
pub fn init_default_guard(config: GuardConfig) -> &'static Guard {
    DEFAULT_GUARD.get_or_init(|| Guard::with_config(config))
}

/// The process-wide guard, created with defaults on first use.
pub fn default_guard() -> &'static Guard {
    DEFAULT_GUARD.get_or_init(Guard::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_guard_is_singleton() {
        let first = default_guard() as *const Guard;
        let second = default_guard() as *const Guard;
        assert_eq!(first, second);
    }
}
