//! ADX: Average Directional Index (Wilder).
//!
//! Steps:
//! 1. Compute +DM and -DM from consecutive candles
//! 2. Smooth +DM, -DM, and TR using Wilder smoothing (alpha = 1/period)
//! 3. +DI = 100 * smoothed(+DM) / smoothed(TR)
//! 4. -DI = 100 * smoothed(-DM) / smoothed(TR)
//! 5. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 6. ADX = Wilder-smoothed DX
//!
//! Lookback: 2 * period - 1 (period candles for the DI seed, then period - 1
//! more DX values for the ADX seed).

use crate::components::indicator::Indicator;
use crate::domain::Candle;

use super::atr::WilderSmoother;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
    prev: Option<(f64, f64, f64)>,
    tr: WilderSmoother,
    plus_dm: WilderSmoother,
    minus_dm: WilderSmoother,
    adx: WilderSmoother,
    current: f64,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            period,
            name: format!("adx_{period}"),
            prev: None,
            tr: WilderSmoother::new(period),
            plus_dm: WilderSmoother::new(period),
            minus_dm: WilderSmoother::new(period),
            adx: WilderSmoother::new(period),
            current: f64::NAN,
        }
    }
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period - 1
    }

    fn update(&mut self, candle: &Candle) -> f64 {
        if let Some((prev_high, prev_low, prev_close)) = self.prev {
            let high_diff = candle.high - prev_high;
            let low_diff = prev_low - candle.low;
            let plus = if high_diff > low_diff && high_diff > 0.0 { high_diff } else { 0.0 };
            let minus = if low_diff > high_diff && low_diff > 0.0 { low_diff } else { 0.0 };
            let tr = (candle.high - candle.low)
                .max((candle.high - prev_close).abs())
                .max((candle.low - prev_close).abs());

            let s_tr = self.tr.push(tr);
            let s_plus = self.plus_dm.push(plus);
            let s_minus = self.minus_dm.push(minus);

            if self.tr.is_ready() {
                let dx = if s_tr == 0.0 {
                    0.0
                } else {
                    let plus_di = 100.0 * s_plus / s_tr;
                    let minus_di = 100.0 * s_minus / s_tr;
                    let di_sum = plus_di + minus_di;
                    if di_sum == 0.0 {
                        0.0
                    } else {
                        100.0 * (plus_di - minus_di).abs() / di_sum
                    }
                };
                self.current = self.adx.push(dx);
            }
        }
        self.prev = Some((candle.high, candle.low, candle.close));
        self.current
    }

    fn value(&self) -> f64 {
        self.current
    }

    fn reset(&mut self) {
        self.prev = None;
        self.tr.reset();
        self.plus_dm.reset();
        self.minus_dm.reset();
        self.adx.reset();
        self.current = f64::NAN;
    }
}
