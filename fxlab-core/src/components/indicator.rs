//! Indicator trait.
//!
//! Indicators are streaming: each call to `update` consumes exactly one candle
//! and returns the value as of that candle. A strategy owns its indicators and
//! advances them once per bar, so the value at bar t can only depend on
//! candles up to and including t.

use crate::domain::Candle;

/// Trait for streaming indicators.
///
/// The first `lookback()` updates return `f64::NAN` (warmup).
///
/// # Look-ahead contamination guard
/// No indicator value at bar t may depend on price data from bar t+1 or later.
/// `compute` over a truncated series must equal the prefix of `compute` over
/// the full series.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Number of candles consumed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Advance by one candle and return the current value (NaN during warmup).
    fn update(&mut self, candle: &Candle) -> f64;

    /// Latest value without advancing.
    fn value(&self) -> f64;

    /// Forget all history.
    fn reset(&mut self);

    /// Batch helper: run a fresh copy of this indicator over `candles`.
    ///
    /// Returns a `Vec<f64>` of the same length as `candles`.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>
    where
        Self: Clone + Sized,
    {
        let mut fresh = self.clone();
        fresh.reset();
        candles.iter().map(|c| fresh.update(c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{make_candles, Sma};

    #[test]
    fn compute_ignores_prior_state() {
        let candles = make_candles(&[1.0, 2.0, 3.0, 4.0]);
        let mut sma = Sma::new(2);
        for c in &candles {
            sma.update(c);
        }
        let batch = sma.compute(&candles);
        assert!(batch[0].is_nan());
        assert_eq!(batch[1], 1.5);
        // Streaming state is untouched by compute
        assert_eq!(sma.value(), 3.5);
    }

    #[test]
    fn trait_object_is_usable() {
        let mut boxed: Box<dyn Indicator> = Box::new(Sma::new(3));
        assert_eq!(boxed.name(), "sma_3");
        for c in &make_candles(&[1.0, 2.0, 3.0]) {
            boxed.update(c);
        }
        assert_eq!(boxed.value(), 2.0);
        boxed.reset();
        assert!(boxed.value().is_nan());
    }
}
