//! Risk tier labels attached to signals and trades.

use serde::{Deserialize, Serialize};

/// Categorical quality label used to scale position size. Ordered A > B > Unknown > C.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    C,
    #[default]
    Unknown,
    B,
    A,
}

impl RiskTier {
    pub const ALL: [RiskTier; 4] = [RiskTier::A, RiskTier::B, RiskTier::Unknown, RiskTier::C];

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::A => "A",
            RiskTier::B => "B",
            RiskTier::Unknown => "UNKNOWN",
            RiskTier::C => "C",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
