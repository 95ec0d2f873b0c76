//! Signal generation: strategies consume candle history and emit trade signals.
//!
//! Signals are account-agnostic: a strategy sees only its instrument's candle
//! history, never equity, risk state or open positions. Each strategy owns
//! streaming indicator state that advances exactly one candle per `on_bar`.

pub mod london_breakout;
pub mod mean_reversion;
pub mod sma_crossover;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tags::SignalTags;
use crate::domain::{Candle, Direction, InstrumentMeta, RiskTier};

pub use london_breakout::{LondonBreakout, LondonBreakoutParams};
pub use mean_reversion::{MeanReversion, MeanReversionParams};
pub use sma_crossover::{SmaCrossover, SmaCrossoverParams};

/// Directional intent of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    Long,
    Short,
    Flat,
}

impl SignalDirection {
    /// Position side this signal asks for, `None` when flat.
    pub fn position_side(self) -> Option<Direction> {
        match self {
            SignalDirection::Long => Some(Direction::Long),
            SignalDirection::Short => Some(Direction::Short),
            SignalDirection::Flat => None,
        }
    }
}

impl From<Direction> for SignalDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Long => SignalDirection::Long,
            Direction::Short => SignalDirection::Short,
        }
    }
}

/// A trade signal for one instrument at one bar. Ephemeral: consumed by the
/// loop on the bar it was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub timestamp: DateTime<Utc>,
    pub direction: SignalDirection,
    /// Entry reference price.
    pub entry_price: f64,
    /// Stop-loss distance in price units.
    pub stop_distance: f64,
    /// Take-profit distance in price units.
    pub target_distance: f64,
    pub tier: RiskTier,
    pub tags: SignalTags,
    pub reason: &'static str,
}

impl Signal {
    pub fn is_flat(&self) -> bool {
        self.direction == SignalDirection::Flat
    }
}

/// Trait for signal generators.
///
/// # Architecture invariant
/// `window` is the instrument's candle history up to and including the current
/// bar. Implementations must never index past its end, and must return `None`
/// (not panic) while history is shorter than `required_lookback()`.
pub trait SignalGenerator: Send + Sync {
    /// Human-readable name (e.g., "sma_crossover").
    fn name(&self) -> &str;

    /// Number of candles needed before this generator can produce output.
    fn required_lookback(&self) -> usize;

    /// Advance by one bar and return a signal if one fires.
    fn on_bar(&mut self, timestamp: DateTime<Utc>, window: &[Candle]) -> Option<Signal>;

    /// Forget all indicator state.
    fn reset(&mut self);
}

/// Strategy selection and parameters, as read from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyConfig {
    SmaCrossover(SmaCrossoverParams),
    MeanReversion(MeanReversionParams),
    LondonBreakout(LondonBreakoutParams),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::SmaCrossover(SmaCrossoverParams::default())
    }
}

impl StrategyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::SmaCrossover(_) => "sma_crossover",
            StrategyConfig::MeanReversion(_) => "mean_reversion",
            StrategyConfig::LondonBreakout(_) => "london_breakout",
        }
    }

    /// Check parameters; the message names the offending field.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StrategyConfig::SmaCrossover(p) => p.validate(),
            StrategyConfig::MeanReversion(p) => p.validate(),
            StrategyConfig::LondonBreakout(p) => p.validate(),
        }
    }

    /// Build a fresh strategy instance for one instrument.
    pub fn build(&self, meta: &InstrumentMeta) -> Strategy {
        match self {
            StrategyConfig::SmaCrossover(p) => {
                Strategy::SmaCrossover(SmaCrossover::new(p.clone(), meta.pip_size))
            }
            StrategyConfig::MeanReversion(p) => {
                Strategy::MeanReversion(MeanReversion::new(p.clone(), meta.pip_size))
            }
            StrategyConfig::LondonBreakout(p) => {
                Strategy::LondonBreakout(LondonBreakout::new(p.clone(), meta.pip_size))
            }
        }
    }
}

/// Closed set of strategy variants. The loop holds one per instrument.
#[derive(Debug, Clone)]
pub enum Strategy {
    SmaCrossover(SmaCrossover),
    MeanReversion(MeanReversion),
    LondonBreakout(LondonBreakout),
}

impl SignalGenerator for Strategy {
    fn name(&self) -> &str {
        match self {
            Strategy::SmaCrossover(s) => s.name(),
            Strategy::MeanReversion(s) => s.name(),
            Strategy::LondonBreakout(s) => s.name(),
        }
    }

    fn required_lookback(&self) -> usize {
        match self {
            Strategy::SmaCrossover(s) => s.required_lookback(),
            Strategy::MeanReversion(s) => s.required_lookback(),
            Strategy::LondonBreakout(s) => s.required_lookback(),
        }
    }

    fn on_bar(&mut self, timestamp: DateTime<Utc>, window: &[Candle]) -> Option<Signal> {
        match self {
            Strategy::SmaCrossover(s) => s.on_bar(timestamp, window),
            Strategy::MeanReversion(s) => s.on_bar(timestamp, window),
            Strategy::LondonBreakout(s) => s.on_bar(timestamp, window),
        }
    }

    fn reset(&mut self) {
        match self {
            Strategy::SmaCrossover(s) => s.reset(),
            Strategy::MeanReversion(s) => s.reset(),
            Strategy::LondonBreakout(s) => s.reset(),
        }
    }
}
