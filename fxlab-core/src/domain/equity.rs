//! Equity bookkeeping: current equity, daily start, high-water mark, realized P&L.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Realized equity state of one run.
///
/// Mutated only when a close is booked or a UTC day rolls over. The high-water
/// mark never decreases and is never below current equity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityState {
    pub initial_equity: f64,
    pub current_equity: f64,
    pub daily_start_equity: f64,
    pub high_water_mark: f64,
    pub realized_pnl: f64,
    pub daily_realized_pnl: f64,
    /// UTC day the daily figures belong to. `None` until the first bar is seen.
    pub current_day: Option<NaiveDate>,
}

impl EquityState {
    pub fn new(initial_equity: f64) -> Self {
        Self {
            initial_equity,
            current_equity: initial_equity,
            daily_start_equity: initial_equity,
            high_water_mark: initial_equity,
            realized_pnl: 0.0,
            daily_realized_pnl: 0.0,
            current_day: None,
        }
    }

    /// Book a realized P&L and lift the high-water mark if exceeded.
    pub fn apply_close(&mut self, pnl: f64) {
        self.current_equity += pnl;
        self.realized_pnl += pnl;
        self.daily_realized_pnl += pnl;
        if self.current_equity > self.high_water_mark {
            self.high_water_mark = self.current_equity;
        }
    }

    /// Start a new UTC day. Returns `true` if `day` differs from the tracked day.
    pub fn roll_day(&mut self, day: NaiveDate) -> bool {
        match self.current_day {
            Some(current) if current == day => false,
            Some(_) => {
                self.current_day = Some(day);
                self.daily_start_equity = self.current_equity;
                self.daily_realized_pnl = 0.0;
                true
            }
            None => {
                // First bar of the run: the day starts at the initial equity.
                self.current_day = Some(day);
                self.daily_start_equity = self.current_equity;
                false
            }
        }
    }

    /// `(daily_start - current) / daily_start`. Negative on a winning day.
    pub fn daily_loss_pct(&self) -> f64 {
        if self.daily_start_equity > 0.0 {
            (self.daily_start_equity - self.current_equity) / self.daily_start_equity
        } else {
            0.0
        }
    }

    /// `(hwm - current) / hwm`, always >= 0.
    pub fn trailing_dd_pct(&self) -> f64 {
        if self.high_water_mark > 0.0 {
            (self.high_water_mark - self.current_equity) / self.high_water_mark
        } else {
            0.0
        }
    }

    /// Money already lost today (zero on a winning day).
    pub fn daily_loss_amount(&self) -> f64 {
        (self.daily_start_equity - self.current_equity).max(0.0)
    }
}
