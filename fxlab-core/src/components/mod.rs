//! Strategy components: the signal pipeline ahead of sizing and risk.
//!
//! A raw signal passes through three independent stages before it can become
//! an entry request:
//! - Signal generator: detects market events, emits direction plus stop/target distances
//! - Trade filters: gate signals on session/trend/volatility tags
//! - Risk tier: labels the signal and scales its risk fraction
//!
//! Plus the streaming indicator trait the generators are built on.

pub mod filter;
pub mod indicator;
pub mod signal;
pub mod tags;
pub mod tier;

pub use filter::{FilterReason, TradeFilters};
pub use indicator::Indicator;
pub use signal::{Signal, SignalDirection, SignalGenerator, Strategy, StrategyConfig};
pub use tags::{SessionTag, SignalTags, TrendRegime, VolatilityRegime};
pub use tier::{TierConfig, TierDecision, TierRule};
