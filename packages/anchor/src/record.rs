//! Ballast-Anchor: Operation History Records
//!
//! One entry per completed operation, appended by the anchor's
//! post-operation protocol. The history is a bounded FIFO window; drift
//! detection reads it, nothing else mutates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::risk::RiskLevel;

/// A completed operation, as remembered by the anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Operation name
    pub operation: String,
    /// Risk level the operation ran at
    pub risk: RiskLevel,
    /// When it completed
    pub timestamp: DateTime<Utc>,
    /// Similarity key over (operation, path, resource, external flag)
    pub fingerprint: String,
    /// Primary resource identifier, empty when none was given
    pub resource: String,
    /// Did the operation have externally visible effects?
    pub is_external: bool,
    /// Advisory warnings attached to the operation
    pub warnings: u32,
}

impl OperationRecord {
    /// Build a record from an operation and its context.
    pub fn new(operation: &str, risk: RiskLevel, context: &Context, warnings: u32) -> Self {
        let is_external = context.get_bool("is_external");
        let resource = primary_resource(context);
        Self {
            operation: operation.to_string(),
            risk,
            timestamp: Utc::now(),
            fingerprint: fingerprint(operation, context),
            resource,
            is_external,
            warnings,
        }
    }
}

/// The primary resource an operation touched: `resource`, else `path`,
/// else `url`, else empty.
pub fn primary_resource(context: &Context) -> String {
    context
        .get_str("resource")
        .or_else(|| context.get_str("path"))
        .or_else(|| context.get_str("url"))
        .unwrap_or("")
        .to_string()
}

/// Deterministic similarity key for repetition analysis. Not a hash:
/// two attempts at the same thing must produce the same string.
pub fn fingerprint(operation: &str, context: &Context) -> String {
    format!(
        "{}|{}|{}|{}",
        operation,
        context.get_str("path").unwrap_or(""),
        context.get_str("resource").unwrap_or(""),
        context.get_bool("is_external"),
    )
}
