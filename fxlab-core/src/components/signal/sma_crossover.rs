//! SMA crossover signal with an ATR volatility gate.
//!
//! Fires Long when the fast SMA crosses above the slow SMA, Short when it
//! crosses below. No signal while ATR (in pips) is below `min_atr_threshold`.
//! Stop and target distances are ATR multiples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Signal, SignalDirection, SignalGenerator};
use crate::components::indicator::Indicator;
use crate::components::tags::{SessionTag, SignalTags, TrendRegime, VolatilityRegime};
use crate::domain::{Candle, RiskTier};
use crate::indicators::{Atr, Sma};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmaCrossoverParams {
    pub fast_ma_period: usize,
    pub slow_ma_period: usize,
    /// Higher-timeframe SMA used only for trend-regime tagging.
    pub trend_ma_period: usize,
    pub atr_period: usize,
    pub stop_atr_multiple: f64,
    pub target_atr_multiple: f64,
    /// Minimum ATR in pips for a signal to fire.
    pub min_atr_threshold: f64,
    pub atr_low_pips: f64,
    pub atr_high_pips: f64,
    /// |slow - trend| below this many pips is tagged SIDEWAYS.
    pub sideways_band_pips: f64,
}

impl Default for SmaCrossoverParams {
    fn default() -> Self {
        Self {
            fast_ma_period: 20,
            slow_ma_period: 50,
            trend_ma_period: 200,
            atr_period: 14,
            stop_atr_multiple: 1.5,
            target_atr_multiple: 3.0,
            min_atr_threshold: 0.0,
            atr_low_pips: 6.0,
            atr_high_pips: 15.0,
            sideways_band_pips: 1.5,
        }
    }
}

impl SmaCrossoverParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.fast_ma_period == 0 || self.slow_ma_period == 0 || self.trend_ma_period == 0 {
            return Err("moving-average periods must be >= 1".into());
        }
        if self.fast_ma_period >= self.slow_ma_period {
            return Err(format!(
                "fast_ma_period ({}) must be < slow_ma_period ({})",
                self.fast_ma_period, self.slow_ma_period
            ));
        }
        if self.atr_period == 0 {
            return Err("atr_period must be >= 1".into());
        }
        if !(self.stop_atr_multiple > 0.0) || !self.stop_atr_multiple.is_finite() {
            return Err(format!("stop_atr_multiple ({}) must be > 0", self.stop_atr_multiple));
        }
        if !(self.target_atr_multiple > self.stop_atr_multiple)
            || !self.target_atr_multiple.is_finite()
        {
            return Err(format!(
                "target_atr_multiple ({}) must be > stop_atr_multiple ({})",
                self.target_atr_multiple, self.stop_atr_multiple
            ));
        }
        if !(self.min_atr_threshold >= 0.0) {
            return Err(format!("min_atr_threshold ({}) must be >= 0", self.min_atr_threshold));
        }
        if !(self.atr_low_pips <= self.atr_high_pips) {
            return Err("atr_low_pips must be <= atr_high_pips".into());
        }
        Ok(())
    }
}

/// Moving average crossover signal generator.
#[derive(Debug, Clone)]
pub struct SmaCrossover {
    params: SmaCrossoverParams,
    pip_size: f64,
    fast: Sma,
    slow: Sma,
    trend: Sma,
    atr: Atr,
    prev_fast: f64,
    prev_slow: f64,
}

impl SmaCrossover {
    pub fn new(params: SmaCrossoverParams, pip_size: f64) -> Self {
        Self {
            fast: Sma::new(params.fast_ma_period.max(1)),
            slow: Sma::new(params.slow_ma_period.max(1)),
            trend: Sma::new(params.trend_ma_period.max(1)),
            atr: Atr::new(params.atr_period.max(1)),
            params,
            pip_size,
            prev_fast: f64::NAN,
            prev_slow: f64::NAN,
        }
    }

    pub fn params(&self) -> &SmaCrossoverParams {
        &self.params
    }

    fn crossover(&self, fast: f64, slow: f64) -> Option<SignalDirection> {
        let (fast_prev, slow_prev) = (self.prev_fast, self.prev_slow);
        if !(fast.is_finite() && slow.is_finite() && fast_prev.is_finite() && slow_prev.is_finite())
        {
            return None;
        }
        if fast > slow && fast_prev <= slow_prev {
            Some(SignalDirection::Long)
        } else if fast < slow && fast_prev >= slow_prev {
            Some(SignalDirection::Short)
        } else {
            None
        }
    }
}

impl SignalGenerator for SmaCrossover {
    fn name(&self) -> &str {
        "sma_crossover"
    }

    fn required_lookback(&self) -> usize {
        self.params.slow_ma_period.max(self.params.atr_period) + 1
    }

    fn on_bar(&mut self, timestamp: DateTime<Utc>, window: &[Candle]) -> Option<Signal> {
        let candle = window.last()?;

        let fast = self.fast.update(candle);
        let slow = self.slow.update(candle);
        let trend = self.trend.update(candle);
        let atr = self.atr.update(candle);

        let direction = self.crossover(fast, slow);
        self.prev_fast = fast;
        self.prev_slow = slow;
        let direction = direction?;

        if !(atr.is_finite() && atr > 0.0) {
            return None;
        }
        let atr_pips = atr / self.pip_size;
        if atr_pips < self.params.min_atr_threshold {
            return None;
        }

        let is_long = direction == SignalDirection::Long;
        let tags = SignalTags {
            session: SessionTag::from_hour(candle.hour()),
            trend: TrendRegime::classify(
                is_long,
                slow,
                trend,
                self.params.sideways_band_pips * self.pip_size,
            ),
            volatility: VolatilityRegime::classify(
                atr_pips,
                self.params.atr_low_pips,
                self.params.atr_high_pips,
            ),
        };

        Some(Signal {
            timestamp,
            direction,
            entry_price: candle.close,
            stop_distance: self.params.stop_atr_multiple * atr,
            target_distance: self.params.target_atr_multiple * atr,
            tier: RiskTier::Unknown,
            tags,
            reason: if is_long { "sma_cross_up" } else { "sma_cross_down" },
        })
    }

    fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
        self.trend.reset();
        self.atr.reset();
        self.prev_fast = f64::NAN;
        self.prev_slow = f64::NAN;
    }
}
