//! TOML backtest configuration.
//!
//! One file describes a complete run: account, risk limits (optionally from a
//! named profile), strategy, filters, exit management, execution, data
//! handling and the instrument list. Everything defaults so a minimal file only names its
//! instruments.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fxlab_core::components::{StrategyConfig, TierConfig, TradeFilters};
use fxlab_core::data::GapPolicy;
use fxlab_core::domain::InstrumentMeta;
use fxlab_core::engine::{EngineConfig, ExitManagement, IntrabarPolicy};
use fxlab_core::risk::{RiskLimits, RiskProfile};

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

/// Errors from reading or resolving a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown risk profile '{0}' (expected one of: ultra_ultra_conservative, ultra_conservative, conservative)")]
    UnknownProfile(String),

    #[error("instrument '{symbol}' has no preset; set pip_size and pip_value_per_lot explicitly")]
    UnknownInstrument { symbol: String },

    #[error("instrument '{symbol}' is listed more than once")]
    DuplicateInstrument { symbol: String },

    #[error("no [[instruments]] configured")]
    NoInstruments,
}

/// Complete on-disk configuration for one backtest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BacktestConfig {
    pub account: AccountSection,
    pub risk: RiskSection,
    pub strategy: StrategyConfig,
    pub filters: TradeFilters,
    pub exits: ExitManagement,
    pub execution: ExecutionSection,
    pub data: DataSection,
    pub instruments: Vec<InstrumentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AccountSection {
    pub initial_equity: f64,
}

impl Default for AccountSection {
    fn default() -> Self {
        Self { initial_equity: 10_000.0 }
    }
}

/// `[risk]`: a named profile supplies the base limits; explicit fields override it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiskSection {
    pub profile: Option<String>,
    pub risk_per_trade_fraction: Option<f64>,
    pub daily_loss_cap_fraction: Option<f64>,
    pub trailing_drawdown_cap_fraction: Option<f64>,
    pub max_concurrent_positions: Option<usize>,
    pub max_risk_fraction: f64,
    pub adaptive_mode: bool,
    pub tiers: TierConfig,
}

impl Default for RiskSection {
    fn default() -> Self {
        Self {
            profile: None,
            risk_per_trade_fraction: None,
            daily_loss_cap_fraction: None,
            trailing_drawdown_cap_fraction: None,
            max_concurrent_positions: None,
            max_risk_fraction: 0.05,
            adaptive_mode: false,
            tiers: TierConfig::default(),
        }
    }
}

impl RiskSection {
    pub fn resolve_profile(&self) -> Result<RiskProfile, ConfigError> {
        match self.profile.as_deref() {
            None => Ok(RiskProfile::default()),
            Some(name) => {
                RiskProfile::from_name(name).ok_or_else(|| ConfigError::UnknownProfile(name.into()))
            }
        }
    }

    pub fn resolve_limits(&self) -> Result<RiskLimits, ConfigError> {
        let base = self.resolve_profile()?.limits();
        Ok(RiskLimits {
            risk_per_trade_fraction: self.risk_per_trade_fraction.unwrap_or(base.risk_per_trade_fraction),
            daily_loss_cap_fraction: self.daily_loss_cap_fraction.unwrap_or(base.daily_loss_cap_fraction),
            trailing_drawdown_cap_fraction: self
                .trailing_drawdown_cap_fraction
                .unwrap_or(base.trailing_drawdown_cap_fraction),
            max_concurrent_positions: self
                .max_concurrent_positions
                .unwrap_or(base.max_concurrent_positions),
        })
    }

    /// Same section driven purely by `profile`, with the explicit overrides dropped.
    pub fn with_profile(&self, profile: RiskProfile) -> Self {
        Self {
            profile: Some(profile.as_str().to_string()),
            risk_per_trade_fraction: None,
            daily_loss_cap_fraction: None,
            trailing_drawdown_cap_fraction: None,
            max_concurrent_positions: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionSection {
    pub intrabar_policy: IntrabarPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataSection {
    pub interval_minutes: u32,
    pub gap_policy: GapPolicy,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            gap_policy: GapPolicy::default(),
        }
    }
}

/// One `[[instruments]]` entry. Missing pip/lot fields come from the symbol's preset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InstrumentEntry {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pip_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pip_value_per_lot: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_lot: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lot: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_step: Option<f64>,
}

impl InstrumentEntry {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self { symbol: symbol.into(), ..Self::default() }
    }

    /// Resolve pip and lot metadata: explicit fields over the preset.
    pub fn meta(&self) -> Result<InstrumentMeta, ConfigError> {
        let symbol = self.symbol.to_ascii_uppercase();
        let mut meta = match (InstrumentMeta::preset(&symbol), self.pip_size, self.pip_value_per_lot) {
            (Some(preset), _, _) => preset,
            (None, Some(pip_size), Some(pip_value)) => InstrumentMeta::new(symbol.clone(), pip_size, pip_value),
            (None, _, _) => return Err(ConfigError::UnknownInstrument { symbol }),
        };
        if let Some(v) = self.pip_size {
            meta.pip_size = v;
        }
        if let Some(v) = self.pip_value_per_lot {
            meta.pip_value_per_lot = v;
        }
        if let Some(v) = self.min_lot {
            meta.min_lot = v;
        }
        if let Some(v) = self.max_lot {
            meta.max_lot = v;
        }
        if let Some(v) = self.lot_step {
            meta.lot_step = v;
        }
        Ok(meta)
    }
}

impl BacktestConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Symbols in configuration order, upper-cased.
    pub fn symbols(&self) -> Vec<String> {
        self.instruments.iter().map(|i| i.symbol.to_ascii_uppercase()).collect()
    }

    /// Build the engine configuration. Range checks on the values happen in
    /// `EngineConfig::validate` when the run starts.
    pub fn to_engine_config(&self) -> Result<EngineConfig, ConfigError> {
        if self.instruments.is_empty() {
            return Err(ConfigError::NoInstruments);
        }
        let mut config = EngineConfig::new(self.account.initial_equity, self.risk.resolve_limits()?);
        config.max_risk_fraction = self.risk.max_risk_fraction;
        config.adaptive_mode = self.risk.adaptive_mode;
        config.initial_mode = self.risk.resolve_profile()?;
        config.strategy = self.strategy.clone();
        config.filters = self.filters;
        config.exits = self.exits;
        config.tiers = self.risk.tiers.clone();
        config.intrabar_policy = self.execution.intrabar_policy;
        config.interval_minutes = self.data.interval_minutes;
        config.gap_policy = self.data.gap_policy;

        let mut seen = BTreeSet::new();
        for entry in &self.instruments {
            let meta = entry.meta()?;
            if !seen.insert(meta.symbol.clone()) {
                return Err(ConfigError::DuplicateInstrument { symbol: meta.symbol });
            }
            config.instruments.insert(meta);
        }
        Ok(config)
    }

    /// Deterministic hash of the canonical JSON form of this config.
    pub fn run_id(&self) -> RunId {
        // Plain data with no maps keyed by non-strings: serialization cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}
