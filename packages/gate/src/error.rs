//! Ballast-Gate: Error Taxonomy
//!
//! Admission is fail-closed: the one error the gate raises is the denial
//! of a guarded call. Everything else (predicate panics, detector faults,
//! subscriber panics, bridge transport failures) is converted locally
//! into structured result fields or logged and dropped, never propagated.

use thiserror::Error;

/// Errors surfaced by the guard.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The pre-check rejected the operation. Raised only by the
    /// [`guarded`](crate::guard::Guard::guarded) wrapper; `pre_check`
    /// itself returns a verdict.
    #[error("operation '{operation}' denied: {}", .reasons.join("; "))]
    AdmissionDenied {
        /// Operation that was denied
        operation: String,
        /// Blocking issues, anchor reasons first
        reasons: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_denied_display() {
        let err = GuardError::AdmissionDenied {
            operation: "send_email".to_string(),
            reasons: vec!["[anchor] trust too low".to_string(), "[REQUIRED] no ticket".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("send_email"));
        assert!(text.contains("trust too low"));
        assert!(text.contains("no ticket"));
    }
}
