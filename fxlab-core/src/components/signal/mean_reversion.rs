//! Bollinger/RSI mean-reversion fade, active only in low-ADX (ranging) markets.
//!
//! Long when the close is below the lower band and RSI is oversold; short when
//! the close is above the upper band and RSI is overbought. Target is the
//! distance back to the middle band.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Signal, SignalDirection, SignalGenerator};
use crate::components::indicator::Indicator;
use crate::components::tags::{SessionTag, SignalTags, TrendRegime, VolatilityRegime};
use crate::domain::{Candle, RiskTier};
use crate::indicators::{Adx, Atr, Bollinger, Rsi};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanReversionParams {
    pub bb_period: usize,
    pub bb_std: f64,
    pub rsi_period: usize,
    pub rsi_low: f64,
    pub rsi_high: f64,
    pub adx_period: usize,
    /// Signals only fire while ADX is strictly below this.
    pub adx_threshold: f64,
    pub atr_period: usize,
    pub stop_atr_multiple: f64,
    pub atr_low_pips: f64,
    pub atr_high_pips: f64,
}

impl Default for MeanReversionParams {
    fn default() -> Self {
        Self {
            bb_period: 20,
            bb_std: 2.0,
            rsi_period: 14,
            rsi_low: 30.0,
            rsi_high: 70.0,
            adx_period: 14,
            adx_threshold: 30.0,
            atr_period: 14,
            stop_atr_multiple: 1.5,
            atr_low_pips: 6.0,
            atr_high_pips: 15.0,
        }
    }
}

impl MeanReversionParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.bb_period < 2 || self.rsi_period == 0 || self.adx_period == 0 || self.atr_period == 0
        {
            return Err("bb_period must be >= 2 and rsi/adx/atr periods >= 1".into());
        }
        if !(self.bb_std > 0.0) {
            return Err(format!("bb_std ({}) must be > 0", self.bb_std));
        }
        if !(0.0..=100.0).contains(&self.rsi_low)
            || !(0.0..=100.0).contains(&self.rsi_high)
            || self.rsi_low >= self.rsi_high
        {
            return Err(format!(
                "rsi_low ({}) and rsi_high ({}) must satisfy 0 <= low < high <= 100",
                self.rsi_low, self.rsi_high
            ));
        }
        if !(self.stop_atr_multiple > 0.0) {
            return Err(format!("stop_atr_multiple ({}) must be > 0", self.stop_atr_multiple));
        }
        if !(self.atr_low_pips <= self.atr_high_pips) {
            return Err("atr_low_pips must be <= atr_high_pips".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MeanReversion {
    params: MeanReversionParams,
    pip_size: f64,
    bands: Bollinger,
    rsi: Rsi,
    adx: Adx,
    atr: Atr,
}

impl MeanReversion {
    pub fn new(params: MeanReversionParams, pip_size: f64) -> Self {
        Self {
            bands: Bollinger::middle(params.bb_period.max(1), params.bb_std),
            rsi: Rsi::new(params.rsi_period.max(1)),
            adx: Adx::new(params.adx_period.max(1)),
            atr: Atr::new(params.atr_period.max(1)),
            params,
            pip_size,
        }
    }
}

impl SignalGenerator for MeanReversion {
    fn name(&self) -> &str {
        "mean_reversion"
    }

    fn required_lookback(&self) -> usize {
        self.bands
            .lookback()
            .max(self.rsi.lookback())
            .max(self.adx.lookback())
            .max(self.atr.lookback())
            + 1
    }

    fn on_bar(&mut self, timestamp: DateTime<Utc>, window: &[Candle]) -> Option<Signal> {
        let candle = window.last()?;

        self.bands.update(candle);
        let rsi = self.rsi.update(candle);
        let adx = self.adx.update(candle);
        let atr = self.atr.update(candle);
        let bands = self.bands.bands();

        if !(bands.is_valid() && rsi.is_finite() && adx.is_finite() && atr.is_finite()) {
            return None;
        }
        if adx >= self.params.adx_threshold {
            return None;
        }

        let close = candle.close;
        let (direction, reversion) = if close < bands.lower && rsi < self.params.rsi_low {
            (SignalDirection::Long, bands.middle - close)
        } else if close > bands.upper && rsi > self.params.rsi_high {
            (SignalDirection::Short, close - bands.middle)
        } else {
            return None;
        };

        let stop_distance = (self.params.stop_atr_multiple * atr).max(self.pip_size);
        let target_distance = if reversion > 0.0 { reversion } else { stop_distance };
        let atr_pips = atr / self.pip_size;

        Some(Signal {
            timestamp,
            direction,
            entry_price: close,
            stop_distance,
            target_distance,
            tier: RiskTier::Unknown,
            tags: SignalTags {
                session: SessionTag::from_hour(candle.hour()),
                trend: TrendRegime::Unknown,
                volatility: VolatilityRegime::classify(
                    atr_pips,
                    self.params.atr_low_pips,
                    self.params.atr_high_pips,
                ),
            },
            reason: match direction {
                SignalDirection::Long => "bb_rsi_fade_long",
                _ => "bb_rsi_fade_short",
            },
        })
    }

    fn reset(&mut self) {
        self.bands.reset();
        self.rsi.reset();
        self.adx.reset();
        self.atr.reset();
    }
}
