//! Exit handling for one open position on one bar.
//!
//! Gap rule: a stop already crossed at the bar open fills at the open (the
//! worse price) under every intrabar policy; a target always fills at its
//! own price.
//!
//! Optional exit management runs at the bar close after the stop/target
//! check: break-even move, ATR trail and an extended R target.

use serde::{Deserialize, Serialize};

use super::config::IntrabarPolicy;
use crate::domain::{Candle, Direction, ExitReason, Position};

/// Close-of-bar exit management rules. Everything is off by default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitManagement {
    /// Enable break-even, trailing and extended-target handling.
    pub dynamic: bool,
    /// Open profit, in R, that moves the stop to the entry price.
    pub breakeven_trigger_r_multiple: f64,
    /// Trail distance behind the close, in ATRs, once break-even is active.
    pub trailing_atr_multiple: f64,
    /// Open profit, in R, that closes the position at the bar close.
    pub extended_tp_r_multiple: f64,
    pub atr_period: usize,
    /// Close at the bar close on a signal in the other direction.
    pub opposite_signal: bool,
}

impl Default for ExitManagement {
    fn default() -> Self {
        Self {
            dynamic: false,
            breakeven_trigger_r_multiple: 1.0,
            trailing_atr_multiple: 1.0,
            extended_tp_r_multiple: 1.75,
            atr_period: 14,
            opposite_signal: false,
        }
    }
}

impl ExitManagement {
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("breakeven_trigger_r_multiple", self.breakeven_trigger_r_multiple),
            ("trailing_atr_multiple", self.trailing_atr_multiple),
            ("extended_tp_r_multiple", self.extended_tp_r_multiple),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("{name} ({value}) must be > 0"));
            }
        }
        if self.atr_period == 0 {
            return Err("atr_period must be >= 1".into());
        }
        Ok(())
    }
}

/// Resolved exit for a position on a bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitFill {
    pub price: f64,
    pub reason: ExitReason,
}

/// Check whether `candle` closes `position`.
pub fn check_exit(position: &Position, candle: &Candle, policy: IntrabarPolicy) -> Option<ExitFill> {
    let (stop_hit, target_hit, stop_gapped, target_gapped) = match position.direction {
        Direction::Long => (
            candle.low <= position.stop_price,
            candle.high >= position.target_price,
            candle.open <= position.stop_price,
            candle.open >= position.target_price,
        ),
        Direction::Short => (
            candle.high >= position.stop_price,
            candle.low <= position.target_price,
            candle.open >= position.stop_price,
            candle.open <= position.target_price,
        ),
    };

    let stop = ExitFill {
        price: if stop_gapped { candle.open } else { position.stop_price },
        reason: if position.breakeven_active {
            ExitReason::TrailingStop
        } else {
            ExitReason::Stop
        },
    };
    let target = ExitFill {
        price: position.target_price,
        reason: ExitReason::Target,
    };

    match (stop_hit, target_hit) {
        (false, false) => None,
        (true, false) => Some(stop),
        (false, true) => Some(target),
        (true, true) if stop_gapped => Some(stop),
        (true, true) => Some(match policy {
            IntrabarPolicy::StopFirst => stop,
            IntrabarPolicy::TargetFirst => target,
            IntrabarPolicy::OpenProximity => {
                if target_gapped {
                    target
                } else {
                    let to_stop = (candle.open - position.stop_price).abs();
                    let to_target = (candle.open - position.target_price).abs();
                    if to_stop <= to_target {
                        stop
                    } else {
                        target
                    }
                }
            }
        }),
    }
}

/// Apply exit management at the bar close.
///
/// In order: arm break-even and pull the stop to entry, close at `close` once
/// the extended R target is reached, then trail the stop `close` minus (or
/// plus, for shorts) `trailing_atr_multiple` ATRs. The stop never loosens.
/// A non-finite `atr` falls back to the initial stop distance.
pub fn update_dynamic_exit(
    position: &mut Position,
    close: f64,
    atr: f64,
    rules: &ExitManagement,
) -> Option<ExitFill> {
    let risk = position.initial_risk_distance();
    if !rules.dynamic || risk <= 0.0 {
        return None;
    }

    let r_multiple = position.r_multiple_at(close);
    if !position.breakeven_active && r_multiple >= rules.breakeven_trigger_r_multiple {
        position.breakeven_active = true;
        position.tighten_stop(position.entry_price);
    }
    if r_multiple >= rules.extended_tp_r_multiple {
        return Some(ExitFill {
            price: close,
            reason: ExitReason::ExtendedTarget,
        });
    }
    if position.breakeven_active {
        let atr = if atr.is_finite() && atr > 0.0 { atr } else { risk };
        let offset = rules.trailing_atr_multiple * atr;
        let trail = match position.direction {
            Direction::Long => close - offset,
            Direction::Short => close + offset,
        };
        position.tighten_stop(trail);
    }
    None
}
