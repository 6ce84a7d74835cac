//! Ballast-Gate: Constraint Validator
//!
//! Catalog of constraints and the validation entry point. A constraint is
//! global (applies to every operation) unless it has ever been scoped to
//! named operations. Validation evaluates every applicable constraint
//! exactly once and appends the result to an append-only history.

use std::collections::{HashMap, HashSet};

use ballast_anchor::Context;

use crate::constraint::{Constraint, ValidationResult};

/// The constraint catalog. Operations that fail validation cannot
/// execute; this is "can't", not "shouldn't".
#[derive(Default)]
pub struct ConstraintValidator {
    /// id -> constraint; re-registration replaces
    constraints: HashMap<String, Constraint>,
    /// operation -> constraint ids scoped to it
    scoped: HashMap<String, Vec<String>>,
    /// Append-only record of every validation
    history: Vec<ValidationResult>,
}

impl ConstraintValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a global constraint: it applies to every operation.
    pub fn register(&mut self, constraint: Constraint) {
        tracing::debug!(constraint_id = %constraint.id, "constraint registered (global)");
        self.constraints.insert(constraint.id.clone(), constraint);
    }

    /// Register a constraint scoped to the listed operations. An empty
    /// list means global. Re-registering an id replaces the definition;
    /// scoping is additive and deduplicated, so repeating a registration
    /// changes nothing.
    pub fn register_scoped(&mut self, constraint: Constraint, operations: &[&str]) {
        if operations.is_empty() {
            self.register(constraint);
            return;
        }
        for op in operations {
            let ids = self.scoped.entry((*op).to_string()).or_default();
            if !ids.contains(&constraint.id) {
                ids.push(constraint.id.clone());
            }
        }
        tracing::debug!(
            constraint_id = %constraint.id,
            operations = ?operations,
            "constraint registered (scoped)"
        );
        self.constraints.insert(constraint.id.clone(), constraint);
    }

    /// Constraints that apply to this operation: every never-scoped
    /// constraint, plus those scoped to the operation.
    pub fn applicable_constraints(&self, operation: &str) -> Vec<&Constraint> {
        let scoped_ids: HashSet<&str> = self
            .scoped
            .values()
            .flatten()
            .map(String::as_str)
            .collect();

        let mut applicable: Vec<&Constraint> = self
            .constraints
            .values()
            .filter(|c| !scoped_ids.contains(c.id.as_str()))
            .collect();

        if let Some(ids) = self.scoped.get(operation) {
            for id in ids {
                if let Some(constraint) = self.constraints.get(id) {
                    applicable.push(constraint);
                }
            }
        }
        applicable
    }

    /// Validate an operation against all applicable constraints. Call
    /// BEFORE executing anything sensitive; if `can_execute()` is false,
    /// do not proceed.
    pub fn validate(
        &mut self,
        operation: &str,
        context: &Context,
        override_justification: Option<&str>,
    ) -> ValidationResult {
        let results = self
            .applicable_constraints(operation)
            .iter()
            .map(|c| c.evaluate(context))
            .collect();

        let validation = ValidationResult {
            operation: operation.to_string(),
            results,
            override_justification: override_justification.map(str::to_string),
        };

        if !validation.can_execute() {
            tracing::info!(
                operation,
                errors = ?validation.blocking_errors(),
                "validation blocked operation"
            );
        }

        self.history.push(validation.clone());
        validation
    }

    /// Convenience: validate and return the bare yes/no.
    pub fn must_execute(
        &mut self,
        operation: &str,
        context: &Context,
        override_justification: Option<&str>,
    ) -> bool {
        self.validate(operation, context, override_justification)
            .can_execute()
    }

    /// Every validation performed, in order.
    pub fn history(&self) -> &[ValidationResult] {
        &self.history
    }

    /// Number of registered constraints.
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }
}
