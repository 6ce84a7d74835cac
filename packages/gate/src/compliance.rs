//! Ballast-Gate: Compliance Catalog
//!
//! Canned constraint sets for named frameworks. The factories are the
//! contract; the rule contents are a seed set that deployments extend or
//! replace. Each rule reads only the context keys it names.

use ballast_anchor::Context;

use crate::constraint::{ComplianceFramework, Constraint, ConstraintSeverity};
use crate::validator::ConstraintValidator;

/// SOC2-flavored rules: audit trails and change management.
pub fn soc2_constraints() -> Vec<Constraint> {
    vec![
        Constraint::new("soc2_audit_identity", "Audit Trail Identity", |ctx: &Context| {
            !ctx.get_bool("is_write") || ctx.contains("user_id")
        })
        .with_description("Write operations must be attributable to a user")
        .with_severity(ConstraintSeverity::Required)
        .with_framework(ComplianceFramework::Soc2)
        .with_error_message("write operation carries no user_id for the audit trail"),
        Constraint::new("soc2_change_ticket", "Change Management Ticket", |ctx: &Context| {
            !ctx.get_bool("is_destructive") || ctx.contains("change_ticket")
        })
        .with_description("Destructive changes should reference a change ticket")
        .with_severity(ConstraintSeverity::Advisory)
        .with_framework(ComplianceFramework::Soc2)
        .with_error_message("destructive operation has no change_ticket reference"),
    ]
}

/// HIPAA-flavored rules: PHI containment and handling.
pub fn hipaa_constraints() -> Vec<Constraint> {
    vec![
        Constraint::new("hipaa_phi_containment", "PHI Containment", |ctx: &Context| {
            !(ctx.get_bool("involves_phi") && ctx.get_bool("is_external"))
        })
        .with_description("PHI never leaves the trust boundary")
        .with_severity(ConstraintSeverity::Mandatory)
        .with_framework(ComplianceFramework::Hipaa)
        .with_error_message("operation would move PHI across the external boundary"),
        Constraint::new("hipaa_phi_encryption", "PHI At-Rest Encryption", |ctx: &Context| {
            !(ctx.get_bool("involves_phi") && ctx.get_bool("is_write")) || ctx.get_bool("encrypted")
        })
        .with_description("PHI writes go to encrypted storage")
        .with_severity(ConstraintSeverity::Required)
        .with_framework(ComplianceFramework::Hipaa)
        .with_error_message("PHI write without encrypted=true"),
        Constraint::new("hipaa_minimum_necessary", "Minimum Necessary Purpose", |ctx: &Context| {
            !ctx.get_bool("involves_phi") || ctx.contains("purpose")
        })
        .with_description("PHI access states its purpose")
        .with_severity(ConstraintSeverity::Advisory)
        .with_framework(ComplianceFramework::Hipaa)
        .with_error_message("PHI access without a stated purpose"),
    ]
}

/// CIS-flavored rules: host hygiene.
pub fn cis_constraints() -> Vec<Constraint> {
    vec![
        Constraint::new("cis_system_paths", "Protected System Paths", |ctx: &Context| {
            let writing = ctx.get_bool("is_write") || ctx.get_bool("is_destructive");
            let system_path = ctx
                .get_str("path")
                .map(|p| p.starts_with("/etc") || p.starts_with("/boot") || p.starts_with("/usr/bin"))
                .unwrap_or(false);
            !(writing && system_path)
        })
        .with_description("No writes under protected system paths")
        .with_severity(ConstraintSeverity::Required)
        .with_framework(ComplianceFramework::Cis)
        .with_error_message("write targets a protected system path"),
        Constraint::new("cis_shell_source", "Shell Command Provenance", |ctx: &Context| {
            !ctx.contains("command") || ctx.contains("user_id")
        })
        .with_description("Shell commands are attributable")
        .with_severity(ConstraintSeverity::Advisory)
        .with_framework(ComplianceFramework::Cis)
        .with_error_message("shell command with no attributable user_id"),
    ]
}

/// House rules with no external framework.
pub fn custom_constraints() -> Vec<Constraint> {
    vec![
        Constraint::new("internal_prod_guard", "Production Resource Guard", |ctx: &Context| {
            let prod = ctx
                .get_str("resource")
                .map(|r| r.contains("prod"))
                .unwrap_or(false);
            !(prod && ctx.get_bool("is_destructive"))
        })
        .with_description("No destructive operations on production resources")
        .with_severity(ConstraintSeverity::Mandatory)
        .with_framework(ComplianceFramework::Internal)
        .with_error_message("destructive operation targets a production resource"),
        Constraint::new("internal_external_url", "External Destination Named", |ctx: &Context| {
            !ctx.get_bool("is_external") || ctx.contains("url") || ctx.contains("resource")
        })
        .with_description("External operations name their destination")
        .with_severity(ConstraintSeverity::Required)
        .with_framework(ComplianceFramework::Internal)
        .with_error_message("external operation with no url or resource"),
    ]
}

/// A validator pre-seeded with every canned framework.
pub fn compliance_validator() -> ConstraintValidator {
    let mut validator = ConstraintValidator::new();
    for constraint in soc2_constraints()
        .into_iter()
        .chain(hipaa_constraints())
        .chain(cis_constraints())
        .chain(custom_constraints())
    {
        validator.register(constraint);
    }
    validator
}
