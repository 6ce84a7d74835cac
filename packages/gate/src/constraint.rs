//! Ballast-Gate: Constraint Model
//!
//! A constraint is one small predicate over an operation context plus a
//! severity that decides what a failure means: advisory failures warn,
//! required failures block unless a justification overrides them,
//! mandatory failures block unconditionally.
//!
//! Evaluation is total: a predicate that panics is captured and reported
//! as "not satisfied" with the panic text. A misbehaving rule can never
//! take down the gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use ballast_anchor::Context;

/// How critical is this constraint?
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintSeverity {
    /// Log a warning, allow execution
    Advisory,
    /// Block execution; override possible with justification
    Required,
    /// Block execution; no override
    Mandatory,
}

/// Which compliance framework a constraint serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceFramework {
    Soc2,
    Hipaa,
    Cis,
    /// House rules, not tied to an external framework
    Internal,
}

/// Predicate over a context. Returns true when the constraint is
/// satisfied.
pub type ConstraintCheck = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// A single admission rule. Immutable after registration.
#[derive(Clone)]
pub struct Constraint {
    /// Unique identifier; re-registering an id replaces the prior entry
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// What the rule enforces
    pub description: String,
    check: ConstraintCheck,
    /// Failure semantics
    pub severity: ConstraintSeverity,
    /// Frameworks this rule serves
    pub frameworks: Vec<ComplianceFramework>,
    /// Message reported on failure; falls back to a generic one
    pub error_message: String,
}

impl std::fmt::Debug for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constraint")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("frameworks", &self.frameworks)
            .finish_non_exhaustive()
    }
}

impl Constraint {
    /// Create a constraint with Required severity. Tighten or loosen with
    /// the builder methods.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        check: impl Fn(&Context) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            check: Arc::new(check),
            severity: ConstraintSeverity::Required,
            frameworks: Vec::new(),
            error_message: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_severity(mut self, severity: ConstraintSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_framework(mut self, framework: ComplianceFramework) -> Self {
        self.frameworks.push(framework);
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    /// Evaluate against a context. Never panics: predicate panics become
    /// an unsatisfied result carrying the panic text.
    pub fn evaluate(&self, context: &Context) -> ConstraintResult {
        match catch_unwind(AssertUnwindSafe(|| (self.check)(context))) {
            Ok(true) => ConstraintResult {
                constraint_id: self.id.clone(),
                satisfied: true,
                severity: self.severity,
                message: None,
                evaluated_at: Utc::now(),
            },
            Ok(false) => ConstraintResult {
                constraint_id: self.id.clone(),
                satisfied: false,
                severity: self.severity,
                message: Some(if self.error_message.is_empty() {
                    format!("constraint '{}' not satisfied", self.name)
                } else {
                    self.error_message.clone()
                }),
                evaluated_at: Utc::now(),
            },
            Err(payload) => {
                let text = panic_text(payload.as_ref());
                tracing::warn!(
                    constraint_id = %self.id,
                    panic = %text,
                    "constraint predicate panicked"
                );
                ConstraintResult {
                    constraint_id: self.id.clone(),
                    satisfied: false,
                    severity: self.severity,
                    message: Some(format!("evaluation error: {text}")),
                    evaluated_at: Utc::now(),
                }
            }
        }
    }
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "predicate panicked".to_string()
    }
}

/// Outcome of evaluating one constraint.
#[derive(Debug, Clone, Serialize)]
pub struct ConstraintResult {
    pub constraint_id: String,
    pub satisfied: bool,
    pub severity: ConstraintSeverity,
    /// Failure message; `None` when satisfied
    pub message: Option<String>,
    pub evaluated_at: DateTime<Utc>,
}

impl ConstraintResult {
    fn message_text(&self) -> &str {
        self.message.as_deref().unwrap_or("constraint not satisfied")
    }
}

/// Outcome of validating an operation against every applicable
/// constraint.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub operation: String,
    pub results: Vec<ConstraintResult>,
    pub override_justification: Option<String>,
}

impl ValidationResult {
    fn failures(&self, severity: ConstraintSeverity) -> impl Iterator<Item = &ConstraintResult> {
        self.results
            .iter()
            .filter(move |r| !r.satisfied && r.severity == severity)
    }

    pub fn mandatory_failures(&self) -> Vec<&ConstraintResult> {
        self.failures(ConstraintSeverity::Mandatory).collect()
    }

    pub fn required_failures(&self) -> Vec<&ConstraintResult> {
        self.failures(ConstraintSeverity::Required).collect()
    }

    pub fn advisory_failures(&self) -> Vec<&ConstraintResult> {
        self.failures(ConstraintSeverity::Advisory).collect()
    }

    /// CAN this operation proceed? Mandatory failures are absolute;
    /// required failures yield to a justification; advisory failures
    /// never block.
    pub fn can_execute(&self) -> bool {
        if self.failures(ConstraintSeverity::Mandatory).next().is_some() {
            return false;
        }
        if self.failures(ConstraintSeverity::Required).next().is_some()
            && self.override_justification.is_none()
        {
            return false;
        }
        true
    }

    /// Warning messages: advisory failures, plus overridden required
    /// failures stamped with the justification.
    pub fn warnings(&self) -> Vec<String> {
        let mut messages: Vec<String> = self
            .failures(ConstraintSeverity::Advisory)
            .map(|r| format!("[ADVISORY] {}", r.message_text()))
            .collect();
        if let Some(justification) = &self.override_justification {
            for r in self.failures(ConstraintSeverity::Required) {
                messages.push(format!(
                    "[OVERRIDDEN] {} (justification: {justification})",
                    r.message_text()
                ));
            }
        }
        messages
    }

    /// Blocking messages: mandatory failures plus non-overridden required
    /// failures.
    pub fn blocking_errors(&self) -> Vec<String> {
        let mut messages: Vec<String> = self
            .failures(ConstraintSeverity::Mandatory)
            .map(|r| format!("[MANDATORY] {}", r.message_text()))
            .collect();
        if self.override_justification.is_none() {
            for r in self.failures(ConstraintSeverity::Required) {
                messages.push(format!("[REQUIRED] {}", r.message_text()));
            }
        }
        messages
    }
}
