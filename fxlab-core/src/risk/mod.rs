//! Risk overlay: profiles, the entry gate and adaptive mode switching.
//!
//! All gating lives here so the backtest loop never decides on its own
//! whether an entry is allowed.

pub mod engine;
pub mod mode;
pub mod profile;

pub use engine::{
    BlockReason, DayRollover, RiskEngine, RiskState, RiskTransition, CAP_TOLERANCE,
};
pub use mode::{ModeController, ModeTransition};
pub use profile::{RiskLimits, RiskProfile};
