//! Ballast-Anchor: Risk Model
//!
//! Ordered risk levels with fixed budget costs and minimum trust
//! thresholds. Critical is a sentinel: it is never admissible through the
//! automatic pre-check and always requires a human checkpoint.

use serde::{Deserialize, Serialize};

/// How much damage can this operation do?
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Read-only, reversible, local
    Safe,
    /// Local writes, easily reversible
    Low,
    /// Destructive or executing operations
    Medium,
    /// Externally visible effects
    High,
    /// Irreversible or production-impacting; human checkpoint only
    Critical,
}

impl RiskLevel {
    /// All levels, lowest risk first.
    pub const ALL: [RiskLevel; 5] = [
        RiskLevel::Safe,
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    /// Ordinal position (Safe = 0 .. Critical = 4).
    pub fn ordinal(self) -> u8 {
        match self {
            RiskLevel::Safe => 0,
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
            RiskLevel::Critical => 4,
        }
    }

    /// Default budget cost debited per operation at this level.
    pub fn base_cost(self) -> f64 {
        match self {
            RiskLevel::Safe => 0.0,
            RiskLevel::Low => 0.05,
            RiskLevel::Medium => 0.15,
            RiskLevel::High => 0.40,
            RiskLevel::Critical => 1.0,
        }
    }

    /// Default minimum trust score required to attempt this level.
    pub fn base_trust_required(self) -> f64 {
        match self {
            RiskLevel::Safe => 0.0,
            RiskLevel::Low => 0.2,
            RiskLevel::Medium => 0.4,
            RiskLevel::High => 0.6,
            RiskLevel::Critical => 0.8,
        }
    }

    /// Wire name, uppercase.
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    /// Case-insensitive parse of a wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SAFE" => Some(RiskLevel::Safe),
            "LOW" => Some(RiskLevel::Low),
            "MEDIUM" => Some(RiskLevel::Medium),
            "HIGH" => Some(RiskLevel::High),
            "CRITICAL" => Some(RiskLevel::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(RiskLevel::Safe < RiskLevel::Low);
        assert!(RiskLevel::High < RiskLevel::Critical);
        assert_eq!(RiskLevel::Medium.ordinal(), 2);
    }

    #[test]
    fn test_costs_monotone() {
        let costs: Vec<f64> = RiskLevel::ALL.iter().map(|r| r.base_cost()).collect();
        for pair in costs.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert_eq!(RiskLevel::Safe.base_cost(), 0.0);
        assert_eq!(RiskLevel::Critical.base_cost(), 1.0);
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(RiskLevel::parse("high"), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse("  Safe "), Some(RiskLevel::Safe));
        assert_eq!(RiskLevel::parse("CRITICAL"), Some(RiskLevel::Critical));
        assert_eq!(RiskLevel::parse("extreme"), None);
    }

    #[test]
    fn test_wire_roundtrip() {
        for level in RiskLevel::ALL {
            assert_eq!(RiskLevel::parse(level.as_str()), Some(level));
        }
    }
}
