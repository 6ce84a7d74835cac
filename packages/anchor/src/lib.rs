//! Ballast-Anchor: Risk-Weighted Autonomy & Drift Detection
//!
//! The human is not a user; the human is the anchor. This crate keeps an
//! AI agent tethered: every operation spends from a bounded risk budget,
//! every outcome moves a continuous trust score, and a bounded history
//! window is scanned for behavioral drift.
//!
//! Components:
//! - **Risk model**: ordered risk levels with budget costs and trust
//!   thresholds
//! - **Smart anchor**: pre-operation admission, post-operation
//!   accounting, human-interaction hooks
//! - **Drift detector**: five closed-form detectors over the history
//!   window (escalation, externalization, pacing, repetition, warning
//!   accumulation)
//!
//! State is in-memory and bounded; nothing here persists across process
//! restarts, and a single anchor is not internally synchronized. The
//! owning façade serializes access.

pub mod anchor;
pub mod context;
pub mod drift;
pub mod record;
pub mod risk;
pub mod trust;

// Re-exports
pub use anchor::{
    AlertCallback, AnchorParams, AnchorState, AnchorStatus, DenyReason, PostCheckResult,
    PreCheckResult, SmartAnchor,
};
pub use context::Context;
pub use drift::{Alert, DriftDetector, DriftKind, DriftParams, DriftPattern, DriftSeverity};
pub use record::OperationRecord;
pub use risk::RiskLevel;
pub use trust::TrustLevel;
