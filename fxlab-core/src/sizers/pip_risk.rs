//! Pip-risk sizer
//!
//! Lot size from a risk fraction of equity and a stop distance, resolved
//! through the instrument's pip metadata.
//!
//! # Formula
//! ```text
//! risk_amount  = equity * risk_fraction
//! pips_at_risk = stop_distance_price / pip_size
//! raw_lots     = risk_amount / (pips_at_risk * pip_value_per_lot)
//! lots         = floor(min(raw_lots, max_lot) / lot_step) * lot_step
//! ```
//!
//! # Example
//! - Equity: $10,000, risk 1% ($100)
//! - EURUSD stop 20 pips (0.0020), $10/pip/lot
//! - raw = 100 / (20 * 10) = 0.5 lots
//!
//! A trade whose `raw_lots` is below `min_lot` is skipped (zero), never
//! rounded up: taking `min_lot` would risk more than the budget.

use serde::Serialize;

use crate::domain::InstrumentMeta;

/// Tolerance when flooring to `lot_step`, absorbing representation error
/// such as 0.29 / 0.01 = 28.999999999999996.
const STEP_EPSILON: f64 = 1e-9;

/// Intermediate values of one sizing decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizeBreakdown {
    pub risk_amount: f64,
    pub pips_at_risk: f64,
    pub raw_lots: f64,
    pub lots: f64,
}

impl SizeBreakdown {
    const ZERO: Self = Self {
        risk_amount: 0.0,
        pips_at_risk: 0.0,
        raw_lots: 0.0,
        lots: 0.0,
    };

    /// Whether the sizer produced a tradable quantity.
    pub fn is_tradable(&self) -> bool {
        self.lots > 0.0
    }
}

/// Full sizing computation. Invalid inputs give an all-zero breakdown.
pub fn size_breakdown(
    equity: f64,
    risk_fraction: f64,
    stop_distance_price: f64,
    meta: &InstrumentMeta,
) -> SizeBreakdown {
    let positive = |v: f64| v.is_finite() && v > 0.0;
    if !positive(equity)
        || !positive(risk_fraction)
        || !positive(stop_distance_price)
        || meta.validate().is_err()
    {
        return SizeBreakdown::ZERO;
    }

    let risk_amount = equity * risk_fraction;
    let pips_at_risk = stop_distance_price / meta.pip_size;
    let raw_lots = risk_amount / (pips_at_risk * meta.pip_value_per_lot);
    if !raw_lots.is_finite() {
        return SizeBreakdown::ZERO;
    }

    let mut breakdown = SizeBreakdown {
        risk_amount,
        pips_at_risk,
        raw_lots,
        lots: 0.0,
    };

    if raw_lots < meta.min_lot {
        return breakdown;
    }

    let clamped = raw_lots.min(meta.max_lot);
    let steps = (clamped / meta.lot_step + STEP_EPSILON).floor();
    let lots = steps * meta.lot_step;
    if lots + STEP_EPSILON < meta.min_lot {
        return breakdown;
    }
    breakdown.lots = lots;
    breakdown
}

/// Lot size for a trade risking `risk_fraction` of `equity` over `stop_distance_price`.
///
/// Returns `0.0` ("no trade") on non-positive equity, risk fraction or stop
/// distance, invalid metadata, or when the result cannot honor `min_lot`
/// without exceeding the risk budget.
pub fn calculate_position_size(
    equity: f64,
    risk_fraction: f64,
    stop_distance_price: f64,
    meta: &InstrumentMeta,
) -> f64 {
    size_breakdown(equity, risk_fraction, stop_distance_price, meta).lots
}
