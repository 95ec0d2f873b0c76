//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (EMA with alpha = 1/period), seeded with the
//! mean of the first `period` true ranges.
//! Lookback: period (the first candle has no previous close, so the seed
//! window starts at the second candle).

use crate::components::indicator::Indicator;
use crate::domain::Candle;

/// Compute the True Range series from candles.
/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(candles.len());
    let mut prev_close: Option<f64> = None;
    for candle in candles {
        tr.push(match prev_close {
            Some(pc) => true_range_step(candle, pc),
            None => candle.high - candle.low,
        });
        prev_close = Some(candle.close);
    }
    tr
}

fn true_range_step(candle: &Candle, prev_close: f64) -> f64 {
    let (h, l) = (candle.high, candle.low);
    (h - l).max((h - prev_close).abs()).max((l - prev_close).abs())
}

/// Streaming Wilder smoother. Alpha = 1/period.
/// Seed: mean of the first `period` values.
#[derive(Debug, Clone)]
pub struct WilderSmoother {
    period: usize,
    count: usize,
    seed_sum: f64,
    value: f64,
}

impl WilderSmoother {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            count: 0,
            seed_sum: 0.0,
            value: f64::NAN,
        }
    }

    pub fn push(&mut self, x: f64) -> f64 {
        if self.count < self.period {
            self.count += 1;
            self.seed_sum += x;
            if self.count == self.period {
                self.value = self.seed_sum / self.period as f64;
            }
        } else {
            let alpha = 1.0 / self.period as f64;
            self.value = alpha * x + (1.0 - alpha) * self.value;
        }
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_ready(&self) -> bool {
        self.count >= self.period
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.seed_sum = 0.0;
        self.value = f64::NAN;
    }
}

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
    prev_close: Option<f64>,
    smoother: WilderSmoother,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
            prev_close: None,
            smoother: WilderSmoother::new(period),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn update(&mut self, candle: &Candle) -> f64 {
        let value = match self.prev_close {
            Some(pc) => self.smoother.push(true_range_step(candle, pc)),
            None => f64::NAN,
        };
        self.prev_close = Some(candle.close);
        value
    }

    fn value(&self) -> f64 {
        self.smoother.value()
    }

    fn reset(&mut self) {
        self.prev_close = None;
        self.smoother.reset();
    }
}
