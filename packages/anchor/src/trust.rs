//! Ballast-Anchor: Trust Levels
//!
//! Named bands over the continuous trust score. The score itself lives in
//! [`AnchorState`](crate::anchor::AnchorState) and is bounded to [0, 1] on
//! every update; these bands only label it for humans and thresholds.

use serde::{Deserialize, Serialize};

/// Named trust band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// No standing; nothing beyond Safe should run
    Disconnected,
    /// Barely established
    Minimal,
    /// Limited autonomy
    Cautious,
    /// Normal working relationship
    Collaborative,
    /// Earned latitude
    HighTrust,
    /// Near-full autonomy
    Autonomous,
}

impl TrustLevel {
    /// Map a trust score to its band via monotone thresholds.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.95 {
            TrustLevel::Autonomous
        } else if score >= 0.8 {
            TrustLevel::HighTrust
        } else if score >= 0.6 {
            TrustLevel::Collaborative
        } else if score >= 0.4 {
            TrustLevel::Cautious
        } else if score >= 0.2 {
            TrustLevel::Minimal
        } else {
            TrustLevel::Disconnected
        }
    }

    /// Lower bound of this band.
    pub fn floor(self) -> f64 {
        match self {
            TrustLevel::Disconnected => 0.0,
            TrustLevel::Minimal => 0.2,
            TrustLevel::Cautious => 0.4,
            TrustLevel::Collaborative => 0.6,
            TrustLevel::HighTrust => 0.8,
            TrustLevel::Autonomous => 0.95,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrustLevel::Disconnected => "disconnected",
            TrustLevel::Minimal => "minimal",
            TrustLevel::Cautious => "cautious",
            TrustLevel::Collaborative => "collaborative",
            TrustLevel::HighTrust => "high_trust",
            TrustLevel::Autonomous => "autonomous",
        }
    }
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_score_bands() {
        assert_eq!(TrustLevel::from_score(0.0), TrustLevel::Disconnected);
        assert_eq!(TrustLevel::from_score(0.25), TrustLevel::Minimal);
        assert_eq!(TrustLevel::from_score(0.5), TrustLevel::Cautious);
        assert_eq!(TrustLevel::from_score(0.7), TrustLevel::Collaborative);
        assert_eq!(TrustLevel::from_score(0.85), TrustLevel::HighTrust);
        assert_eq!(TrustLevel::from_score(0.99), TrustLevel::Autonomous);
    }

    #[test]
    fn test_band_edges() {
        assert_eq!(TrustLevel::from_score(0.2), TrustLevel::Minimal);
        assert_eq!(TrustLevel::from_score(0.95), TrustLevel::Autonomous);
        assert_eq!(TrustLevel::from_score(0.9499), TrustLevel::HighTrust);
    }

    #[test]
    fn test_floor_matches_from_score() {
        for level in [
            TrustLevel::Disconnected,
            TrustLevel::Minimal,
            TrustLevel::Cautious,
            TrustLevel::Collaborative,
            TrustLevel::HighTrust,
            TrustLevel::Autonomous,
        ] {
            assert_eq!(TrustLevel::from_score(level.floor()), level);
        }
    }
}
