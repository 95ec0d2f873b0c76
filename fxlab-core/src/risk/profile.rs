//! Named risk profiles and the numeric limits they stand for.
//!
//! Each profile bounds a worst-case day: at most `daily_cap / risk_per_trade`
//! sequential full-stop losses fit inside the daily cap.

use serde::{Deserialize, Serialize};

/// Numeric limits enforced by the risk engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    pub risk_per_trade_fraction: f64,
    pub daily_loss_cap_fraction: f64,
    pub trailing_drawdown_cap_fraction: f64,
    pub max_concurrent_positions: usize,
}

impl Default for RiskLimits {
    fn default() -> Self {
        RiskProfile::default().limits()
    }
}

/// Conservative prop-firm presets, ordered from most to least cautious.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskProfile {
    UltraUltraConservative,
    UltraConservative,
    #[default]
    Conservative,
}

impl RiskProfile {
    pub const ALL: [RiskProfile; 3] = [
        RiskProfile::UltraUltraConservative,
        RiskProfile::UltraConservative,
        RiskProfile::Conservative,
    ];

    pub fn limits(self) -> RiskLimits {
        match self {
            // Two full losses stay inside 0.4%.
            RiskProfile::UltraUltraConservative => RiskLimits {
                risk_per_trade_fraction: 0.002,
                daily_loss_cap_fraction: 0.01,
                trailing_drawdown_cap_fraction: 0.02,
                max_concurrent_positions: 1,
            },
            RiskProfile::UltraConservative => RiskLimits {
                risk_per_trade_fraction: 0.004,
                daily_loss_cap_fraction: 0.015,
                trailing_drawdown_cap_fraction: 0.03,
                max_concurrent_positions: 1,
            },
            RiskProfile::Conservative => RiskLimits {
                risk_per_trade_fraction: 0.006,
                daily_loss_cap_fraction: 0.02,
                trailing_drawdown_cap_fraction: 0.04,
                max_concurrent_positions: 1,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskProfile::UltraUltraConservative => "ultra_ultra_conservative",
            RiskProfile::UltraConservative => "ultra_conservative",
            RiskProfile::Conservative => "conservative",
        }
    }

    /// Parse a profile name, case-insensitively. Dashes are accepted for underscores.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|p| p.as_str() == normalized)
    }

    /// One step more cautious, saturating at the most cautious profile.
    pub fn step_down(self) -> Self {
        match self {
            RiskProfile::Conservative => RiskProfile::UltraConservative,
            _ => RiskProfile::UltraUltraConservative,
        }
    }

    /// One step less cautious, saturating at `Conservative`.
    pub fn step_up(self) -> Self {
        match self {
            RiskProfile::UltraUltraConservative => RiskProfile::UltraConservative,
            _ => RiskProfile::Conservative,
        }
    }
}

impl std::fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
