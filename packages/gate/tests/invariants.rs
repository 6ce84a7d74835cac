//! Property tests for the admission algebra and the guard's universal
//! invariants.

use ballast_gate::{
    Constraint, ConstraintSeverity, ConstraintValidator, Context, Guard, GuardConfig, GuardMode,
    RiskLevel,
};
use proptest::prelude::*;

fn severity_strategy() -> impl Strategy<Value = ConstraintSeverity> {
    prop_oneof![
        Just(ConstraintSeverity::Advisory),
        Just(ConstraintSeverity::Required),
        Just(ConstraintSeverity::Mandatory),
    ]
}

proptest! {
    /// can_execute == (no mandatory failures) && (no required failures ||
    /// justification present), for any constraint set.
    #[test]
    fn can_execute_law(
        rules in prop::collection::vec((severity_strategy(), any::<bool>()), 0..12),
        justified in any::<bool>(),
    ) {
        let mut validator = ConstraintValidator::new();
        for (i, (severity, satisfied)) in rules.iter().enumerate() {
            let satisfied = *satisfied;
            validator.register(
                Constraint::new(format!("c{i}"), format!("c{i}"), move |_| satisfied)
                    .with_severity(*severity),
            );
        }

        let justification = justified.then_some("prop override");
        let result = validator.validate("op", &Context::new(), justification);

        let mandatory_failed = rules
            .iter()
            .any(|(s, ok)| *s == ConstraintSeverity::Mandatory && !ok);
        let required_failed = rules
            .iter()
            .any(|(s, ok)| *s == ConstraintSeverity::Required && !ok);
        let expected = !mandatory_failed && (!required_failed || justified);

        prop_assert_eq!(result.can_execute(), expected);
    }

    /// Registering the same constraint id N times behaves like
    /// registering it once.
    #[test]
    fn registration_idempotent(n in 1usize..8, satisfied in any::<bool>()) {
        let mut repeated = ConstraintValidator::new();
        for _ in 0..n {
            repeated.register(
                Constraint::new("same", "same", move |_| satisfied)
                    .with_severity(ConstraintSeverity::Mandatory),
            );
        }
        let mut once = ConstraintValidator::new();
        once.register(
            Constraint::new("same", "same", move |_| satisfied)
                .with_severity(ConstraintSeverity::Mandatory),
        );

        let a = repeated.validate("op", &Context::new(), None);
        let b = once.validate("op", &Context::new(), None);
        prop_assert_eq!(a.can_execute(), b.can_execute());
        prop_assert_eq!(a.results.len(), b.results.len());
    }

    /// Trust, budget, and history bounds hold across any guard-level
    /// operation mix, in any mode.
    #[test]
    fn guard_bounds_hold(
        mode_idx in 0usize..4,
        ops in prop::collection::vec((0usize..5, 0u32..3, prop::bool::weighted(0.1)), 0..40),
    ) {
        let mode = [
            GuardMode::Disabled,
            GuardMode::Shadow,
            GuardMode::Soft,
            GuardMode::Enforce,
        ][mode_idx];
        let guard = Guard::with_config(GuardConfig { mode, ..GuardConfig::default() });

        for (level_idx, warnings, violation) in ops {
            let level = RiskLevel::ALL[level_idx];
            let ctx = Context::new().with("risk_level", level.as_str());
            guard.pre_check("op", &ctx);
            guard.post_record("op", &ctx, warnings, violation);

            let snapshot = guard.state_snapshot();
            prop_assert!(snapshot.trust_score >= 0.0 && snapshot.trust_score <= 1.0);
            prop_assert!(snapshot.budget_remaining >= 0.0 && snapshot.budget_remaining <= 1.0);
            prop_assert!(guard.recent_decisions(usize::MAX).len() <= 1000);
        }
    }

    /// Critical risk is never admissible outside disabled mode.
    #[test]
    fn critical_never_admissible(trust in 0.0f64..=1.0, mode_idx in 0usize..3) {
        let mode = [GuardMode::Shadow, GuardMode::Soft, GuardMode::Enforce][mode_idx];
        let guard = Guard::with_config(GuardConfig {
            mode,
            initial_trust: trust,
            ..GuardConfig::default()
        });

        guard.pre_check("anything", &Context::new().with("risk_level", "CRITICAL"));
        let decision = &guard.recent_decisions(1)[0];
        prop_assert!(decision.would_block);
        prop_assert!(decision.reasons.iter().any(|r| r.contains("critical")));
    }
}
