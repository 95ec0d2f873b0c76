//! Position sizers: determine trade quantity in lots.
//!
//! Sizers translate a risk budget and a stop distance into a lot size.
//! They are equity-aware but signal-agnostic, and resolve every price
//! distance through the instrument's pip metadata.

pub mod pip_risk;

pub use pip_risk::{calculate_position_size, size_breakdown, SizeBreakdown};
