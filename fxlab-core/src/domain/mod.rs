//! Domain types for FxLab

pub mod candle;
pub mod equity;
pub mod instrument;
pub mod position;
pub mod tier;
pub mod trade;

pub use candle::Candle;
pub use equity::EquityState;
pub use instrument::{InstrumentError, InstrumentMeta, InstrumentRegistry};
pub use position::{Direction, Position};
pub use tier::RiskTier;
pub use trade::{EntryLogEntry, ExitReason, TradeLogEntry};

/// Symbol type alias
pub type Symbol = String;
