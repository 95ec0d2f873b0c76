//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! - Middle: SMA(close, period)
//! - Upper: middle + mult * stddev(close, period)
//! - Lower: middle - mult * stddev(close, period)
//!
//! Uses sample stddev (divide by N-1; zero when period is 1).
//! Lookback: period - 1.

use crate::components::indicator::Indicator;
use crate::domain::Candle;

use super::sma::Sma;

/// Which band of the Bollinger Bands the `Indicator` impl reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

/// All three bands at one candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerBands {
    const WARMUP: Self = Self {
        upper: f64::NAN,
        middle: f64::NAN,
        lower: f64::NAN,
    };

    pub fn is_valid(&self) -> bool {
        self.middle.is_finite() && self.upper.is_finite() && self.lower.is_finite()
    }
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
    sma: Sma,
    bands: BollingerBands,
}

impl Bollinger {
    fn with_band(period: usize, multiplier: f64, band: BollingerBand) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        let label = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
        };
        Self {
            period,
            multiplier,
            band,
            name: format!("bollinger_{label}_{period}_{multiplier}"),
            sma: Sma::new(period),
            bands: BollingerBands::WARMUP,
        }
    }

    pub fn upper(period: usize, multiplier: f64) -> Self {
        Self::with_band(period, multiplier, BollingerBand::Upper)
    }

    pub fn middle(period: usize, multiplier: f64) -> Self {
        Self::with_band(period, multiplier, BollingerBand::Middle)
    }

    pub fn lower(period: usize, multiplier: f64) -> Self {
        Self::with_band(period, multiplier, BollingerBand::Lower)
    }

    /// All three bands as of the last update.
    pub fn bands(&self) -> BollingerBands {
        self.bands
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn update(&mut self, candle: &Candle) -> f64 {
        let middle = self.sma.update(candle);
        self.bands = if middle.is_nan() {
            BollingerBands::WARMUP
        } else {
            let std = if self.period > 1 {
                let ss: f64 = self.sma.window().map(|v| (v - middle).powi(2)).sum();
                (ss / (self.period - 1) as f64).sqrt()
            } else {
                0.0
            };
            BollingerBands {
                upper: middle + self.multiplier * std,
                middle,
                lower: middle - self.multiplier * std,
            }
        };
        self.value()
    }

    fn value(&self) -> f64 {
        match self.band {
            BollingerBand::Upper => self.bands.upper,
            BollingerBand::Middle => self.bands.middle,
            BollingerBand::Lower => self.bands.lower,
        }
    }

    fn reset(&mut self) {
        self.sma.reset();
        self.bands = BollingerBands::WARMUP;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn bollinger_bands_sample_std() {
        // Window [2, 4, 4, 4, 5, 5, 7, 9]: mean 5, sample variance 32/7
        let candles = make_candles(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let upper = Bollinger::upper(8, 2.0).compute(&candles);
        let middle = Bollinger::middle(8, 2.0).compute(&candles);
        let lower = Bollinger::lower(8, 2.0).compute(&candles);

        let std = (32.0_f64 / 7.0).sqrt();
        assert!(middle[6].is_nan());
        assert_approx(middle[7], 5.0, DEFAULT_EPSILON);
        assert_approx(upper[7], 5.0 + 2.0 * std, 1e-9);
        assert_approx(lower[7], 5.0 - 2.0 * std, 1e-9);
    }

    #[test]
    fn bollinger_flat_series_collapses() {
        let candles = make_candles(&[1.25; 5]);
        let mut bb = Bollinger::middle(3, 2.0);
        for c in &candles {
            bb.update(c);
        }
        let bands = bb.bands();
        assert!(bands.is_valid());
        assert_approx(bands.upper, bands.lower, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_lookback_and_name() {
        let bb = Bollinger::upper(20, 2.0);
        assert_eq!(bb.lookback(), 19);
        assert_eq!(bb.name(), "bollinger_upper_20_2");
    }
}
