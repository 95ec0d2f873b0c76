//! Candle: the fundamental market data unit.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candle for a single instrument over one bar interval (hourly by default).
///
/// Timestamps are UTC and mark the bar open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self { timestamp, open, high, low, close, volume }
    }

    /// UTC calendar day of the bar. Daily risk limits reset on this boundary.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// UTC hour of the bar open (0..24).
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    /// Describe why this candle is not a plausible OHLCV record, if it isn't.
    pub fn sanity_violation(&self) -> Option<&'static str> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Some("non-finite price");
        }
        if prices.iter().any(|&p| p <= 0.0) {
            return Some("non-positive price");
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Some("negative or non-finite volume");
        }
        if self.high < self.low {
            return Some("high below low");
        }
        if self.high < self.open.max(self.close) {
            return Some("high below open/close");
        }
        if self.low > self.open.min(self.close) {
            return Some("low above open/close");
        }
        None
    }

    /// Basic OHLCV sanity check: positive finite prices, high >= low, body inside the range.
    pub fn is_sane(&self) -> bool {
        self.sanity_violation().is_none()
    }
}
