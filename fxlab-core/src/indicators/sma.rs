//! Simple Moving Average (SMA).
//!
//! Rolling mean of close prices over a lookback window.
//! Lookback: period - 1 (first valid value at index period-1).

use std::collections::VecDeque;

use crate::components::indicator::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
    window: VecDeque<f64>,
    current: f64,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
            window: VecDeque::with_capacity(period + 1),
            current: f64::NAN,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Feed a raw value instead of a candle close.
    pub fn push(&mut self, value: f64) -> f64 {
        self.window.push_back(value);
        if self.window.len() > self.period {
            self.window.pop_front();
        }
        // Recomputed from the window, no running sum.
        self.current = if self.window.len() == self.period {
            self.window.iter().sum::<f64>() / self.period as f64
        } else {
            f64::NAN
        };
        self.current
    }

    /// Values currently inside the window, oldest first.
    pub fn window(&self) -> impl Iterator<Item = f64> + '_ {
        self.window.iter().copied()
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn update(&mut self, candle: &Candle) -> f64 {
        self.push(candle.close)
    }

    fn value(&self) -> f64 {
        self.current
    }

    fn reset(&mut self) {
        self.window.clear();
        self.current = f64::NAN;
    }
}
