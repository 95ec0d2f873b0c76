//! Relative Strength Index (RSI).
//!
//! Uses Wilder smoothing of average gains and average losses.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period.
//! Edge cases: avg_loss == 0 → RSI = 100; avg_gain == 0 → RSI = 0.

use crate::components::indicator::Indicator;
use crate::domain::Candle;

use super::atr::WilderSmoother;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
    prev_close: Option<f64>,
    gains: WilderSmoother,
    losses: WilderSmoother,
    current: f64,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
            prev_close: None,
            gains: WilderSmoother::new(period),
            losses: WilderSmoother::new(period),
            current: f64::NAN,
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn update(&mut self, candle: &Candle) -> f64 {
        if let Some(prev) = self.prev_close {
            let change = candle.close - prev;
            let avg_gain = self.gains.push(change.max(0.0));
            let avg_loss = self.losses.push((-change).max(0.0));
            if self.gains.is_ready() {
                self.current = compute_rsi(avg_gain, avg_loss);
            }
        }
        self.prev_close = Some(candle.close);
        self.current
    }

    fn value(&self) -> f64 {
        self.current
    }

    fn reset(&mut self) {
        self.prev_close = None;
        self.gains.reset();
        self.losses.reset();
        self.current = f64::NAN;
    }
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0 // no movement
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
