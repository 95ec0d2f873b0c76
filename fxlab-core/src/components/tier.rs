//! Risk-tier assignment and scaling.
//!
//! A tier rule matches a signal's tags and assigns a tier; the tier's scale
//! multiplies the base risk-per-trade fraction. A non-positive scale blocks
//! the signal outright.

use serde::{Deserialize, Serialize};

use super::tags::{SessionTag, SignalTags, TrendRegime, VolatilityRegime};
use crate::domain::RiskTier;

/// Tag pattern → tier. `None` fields match anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRule {
    #[serde(default)]
    pub session: Option<SessionTag>,
    #[serde(default)]
    pub trend: Option<TrendRegime>,
    #[serde(default)]
    pub volatility: Option<VolatilityRegime>,
    pub tier: RiskTier,
}

impl TierRule {
    pub fn matches(&self, tags: &SignalTags) -> bool {
        self.session.map_or(true, |s| s == tags.session)
            && self.trend.map_or(true, |t| t == tags.trend)
            && self.volatility.map_or(true, |v| v == tags.volatility)
    }
}

/// Tier scaling configuration. Disabled by default (every signal at scale 1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    pub enabled: bool,
    pub a: f64,
    pub b: f64,
    pub unknown: f64,
    pub c: f64,
    pub rules: Vec<TierRule>,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            a: 1.5,
            b: 0.75,
            unknown: 0.5,
            c: 0.0,
            rules: Vec::new(),
        }
    }
}

/// Outcome of tier resolution for one signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierDecision {
    pub tier: RiskTier,
    pub scale: f64,
}

impl TierDecision {
    pub fn is_blocked(&self) -> bool {
        self.scale <= 0.0
    }
}

impl TierConfig {
    pub fn scale(&self, tier: RiskTier) -> f64 {
        match tier {
            RiskTier::A => self.a,
            RiskTier::B => self.b,
            RiskTier::Unknown => self.unknown,
            RiskTier::C => self.c,
        }
    }

    /// First matching rule wins; otherwise the strategy's own tier stands.
    pub fn resolve(&self, strategy_tier: RiskTier, tags: &SignalTags) -> TierDecision {
        if !self.enabled {
            return TierDecision { tier: strategy_tier, scale: 1.0 };
        }
        let tier = self
            .rules
            .iter()
            .find(|rule| rule.matches(tags))
            .map_or(strategy_tier, |rule| rule.tier);
        TierDecision { tier, scale: self.scale(tier) }
    }
}
