//! Engine configuration, its validation, and the per-instrument input type.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::exits::ExitManagement;
use crate::components::{StrategyConfig, TierConfig, TradeFilters};
use crate::data::GapPolicy;
use crate::domain::{Candle, InstrumentError, InstrumentRegistry, RiskTier};
use crate::risk::{RiskLimits, RiskProfile};

/// How a bar that touches both stop and target is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntrabarPolicy {
    /// Stop triggers first.
    #[default]
    StopFirst,
    /// Target triggers first.
    TargetFirst,
    /// The level nearer the bar open triggers first; a level already
    /// crossed at the open wins outright.
    OpenProximity,
}

/// One instrument's candle history as handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentSeries {
    pub symbol: String,
    pub candles: Vec<Candle>,
}

impl InstrumentSeries {
    pub fn new(symbol: impl Into<String>, candles: Vec<Candle>) -> Self {
        Self { symbol: symbol.into(), candles }
    }
}

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_equity: f64,
    pub limits: RiskLimits,
    /// Ceiling for `limits.risk_per_trade_fraction`.
    pub max_risk_fraction: f64,
    /// Let the risk-per-trade fraction follow the adaptive mode controller.
    pub adaptive_mode: bool,
    /// Starting mode when `adaptive_mode` is on.
    pub initial_mode: RiskProfile,
    pub strategy: StrategyConfig,
    pub filters: TradeFilters,
    pub tiers: TierConfig,
    pub intrabar_policy: IntrabarPolicy,
    pub exits: ExitManagement,
    pub interval_minutes: u32,
    pub gap_policy: GapPolicy,
    pub instruments: InstrumentRegistry,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_equity: 10_000.0,
            limits: RiskLimits::default(),
            max_risk_fraction: 0.05,
            adaptive_mode: false,
            initial_mode: RiskProfile::default(),
            strategy: StrategyConfig::default(),
            filters: TradeFilters::default(),
            tiers: TierConfig::default(),
            intrabar_policy: IntrabarPolicy::default(),
            exits: ExitManagement::default(),
            interval_minutes: 60,
            gap_policy: GapPolicy::default(),
            instruments: InstrumentRegistry::default(),
        }
    }
}

impl EngineConfig {
    pub fn new(initial_equity: f64, limits: RiskLimits) -> Self {
        Self { initial_equity, limits, ..Self::default() }
    }

    pub fn interval(&self) -> Duration {
        Duration::minutes(i64::from(self.interval_minutes))
    }

    /// Check every field that can abort a run before the loop starts.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.initial_equity.is_finite() && self.initial_equity > 0.0) {
            return Err(ConfigurationError::InvalidInitialEquity(self.initial_equity));
        }
        if !(self.max_risk_fraction > 0.0 && self.max_risk_fraction < 1.0) {
            return Err(ConfigurationError::InvalidFraction {
                field: "max_risk_fraction",
                value: self.max_risk_fraction,
            });
        }
        let risk = self.limits.risk_per_trade_fraction;
        if !(risk > 0.0 && risk <= self.max_risk_fraction) {
            return Err(ConfigurationError::RiskFractionOutOfRange {
                value: risk,
                max: self.max_risk_fraction,
            });
        }
        for (field, value) in [
            ("daily_loss_cap_fraction", self.limits.daily_loss_cap_fraction),
            ("trailing_drawdown_cap_fraction", self.limits.trailing_drawdown_cap_fraction),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigurationError::InvalidFraction { field, value });
            }
        }
        if self.limits.max_concurrent_positions == 0 {
            return Err(ConfigurationError::ZeroMaxPositions);
        }
        self.strategy.validate().map_err(ConfigurationError::InvalidStrategy)?;
        self.exits.validate().map_err(ConfigurationError::InvalidExitManagement)?;
        for tier in RiskTier::ALL {
            let scale = self.tiers.scale(tier);
            if !(scale.is_finite() && scale >= 0.0) {
                return Err(ConfigurationError::InvalidTierScale { tier, value: scale });
            }
        }
        if self.interval_minutes == 0 {
            return Err(ConfigurationError::InvalidInterval);
        }
        for meta in self.instruments.iter() {
            meta.validate().map_err(|source| ConfigurationError::InvalidInstrument {
                symbol: meta.symbol.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Fatal configuration problems, raised before the loop starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("initial equity must be positive and finite, got {0}")]
    InvalidInitialEquity(f64),

    #[error("risk_per_trade_fraction {value} must be in (0, {max}]")]
    RiskFractionOutOfRange { value: f64, max: f64 },

    #[error("{field} must be in (0, 1), got {value}")]
    InvalidFraction { field: &'static str, value: f64 },

    #[error("max_concurrent_positions must be at least 1")]
    ZeroMaxPositions,

    #[error("invalid strategy parameters: {0}")]
    InvalidStrategy(String),

    #[error("invalid exit management: {0}")]
    InvalidExitManagement(String),

    #[error("tier {tier} scale must be finite and >= 0, got {value}")]
    InvalidTierScale { tier: RiskTier, value: f64 },

    #[error("bar interval must be at least one minute")]
    InvalidInterval,

    #[error("instrument {symbol}: {source}")]
    InvalidInstrument {
        symbol: String,
        #[source]
        source: InstrumentError,
    },

    #[error("no instrument metadata for {symbol}")]
    UnknownInstrument { symbol: String },

    #[error("instrument {symbol} supplied more than once")]
    DuplicateInstrument { symbol: String },
}
