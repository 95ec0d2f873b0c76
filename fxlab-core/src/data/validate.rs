//! Candle series validation.
//!
//! Every series is checked once, before the event loop starts. Checks per
//! candle, in order: OHLCV sanity, interval alignment, strict timestamp
//! monotonicity (duplicates reported separately from backwards steps), and
//! fixed spacing. Nothing is interpolated or skipped: a violation either
//! aborts the run or, for spacing gaps under [`GapPolicy::Flag`], is recorded.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::domain::Candle;

/// What to do with a spacing gap between consecutive candles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapPolicy {
    /// Abort with [`DataIntegrityError::Gap`].
    #[default]
    Reject,
    /// Record the gap and continue (weekend closures in real FX data).
    Flag,
}

/// A spacing gap that was flagged rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataGap {
    pub symbol: String,
    /// Timestamp of the last candle before the gap.
    pub after: DateTime<Utc>,
    /// Timestamp of the first candle after the gap.
    pub before: DateTime<Utc>,
    pub missing_bars: i64,
}

/// Summary of a series that passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesReport {
    pub symbol: String,
    pub bars: usize,
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
    pub gaps: Vec<DataGap>,
}

/// Fatal input-data problems. Every variant names the instrument and timestamp.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataIntegrityError {
    #[error("{symbol}: candle series is empty")]
    Empty { symbol: String },

    #[error("{symbol}: timestamp {timestamp} at row {index} is earlier than previous {previous}")]
    NonMonotonic {
        symbol: String,
        index: usize,
        previous: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    #[error("{symbol}: duplicate timestamp {timestamp} at row {index}")]
    Duplicate {
        symbol: String,
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("{symbol}: gap of {missing_bars} bar(s) between {after} and {before}")]
    Gap {
        symbol: String,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
        missing_bars: i64,
    },

    #[error("{symbol}: timestamp {timestamp} at row {index} is not aligned to the bar interval")]
    Misaligned {
        symbol: String,
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("{symbol}: invalid candle at {timestamp} (row {index}): {reason}")]
    InvalidCandle {
        symbol: String,
        index: usize,
        timestamp: DateTime<Utc>,
        reason: String,
    },
}

impl DataIntegrityError {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Empty { symbol }
            | Self::NonMonotonic { symbol, .. }
            | Self::Duplicate { symbol, .. }
            | Self::Gap { symbol, .. }
            | Self::Misaligned { symbol, .. }
            | Self::InvalidCandle { symbol, .. } => symbol,
        }
    }

    /// Offending timestamp (`None` for an empty series).
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Empty { .. } => None,
            Self::NonMonotonic { timestamp, .. }
            | Self::Duplicate { timestamp, .. }
            | Self::Misaligned { timestamp, .. }
            | Self::InvalidCandle { timestamp, .. } => Some(*timestamp),
            Self::Gap { before, .. } => Some(*before),
        }
    }
}

/// Validate one instrument's candle series.
///
/// `interval` is the expected bar spacing (one hour for the default data set).
pub fn validate_series(
    symbol: &str,
    candles: &[Candle],
    interval: Duration,
    gap_policy: GapPolicy,
) -> Result<SeriesReport, DataIntegrityError> {
    let (first, last) = match (candles.first(), candles.last()) {
        (Some(f), Some(l)) => (f.timestamp, l.timestamp),
        _ => {
            return Err(DataIntegrityError::Empty {
                symbol: symbol.to_string(),
            })
        }
    };

    let interval_secs = interval.num_seconds().max(1);
    let mut gaps = Vec::new();

    for (index, candle) in candles.iter().enumerate() {
        if let Some(reason) = candle.sanity_violation() {
            return Err(DataIntegrityError::InvalidCandle {
                symbol: symbol.to_string(),
                index,
                timestamp: candle.timestamp,
                reason: reason.to_string(),
            });
        }

        if candle.timestamp.timestamp().rem_euclid(interval_secs) != 0
            || candle.timestamp.timestamp_subsec_nanos() != 0
        {
            return Err(DataIntegrityError::Misaligned {
                symbol: symbol.to_string(),
                index,
                timestamp: candle.timestamp,
            });
        }

        if index == 0 {
            continue;
        }

        let previous = candles[index - 1].timestamp;
        let step = (candle.timestamp - previous).num_seconds();
        if step == 0 {
            return Err(DataIntegrityError::Duplicate {
                symbol: symbol.to_string(),
                index,
                timestamp: candle.timestamp,
            });
        }
        if step < 0 {
            return Err(DataIntegrityError::NonMonotonic {
                symbol: symbol.to_string(),
                index,
                previous,
                timestamp: candle.timestamp,
            });
        }
        if step > interval_secs {
            let missing_bars = step / interval_secs - 1;
            match gap_policy {
                GapPolicy::Reject => {
                    return Err(DataIntegrityError::Gap {
                        symbol: symbol.to_string(),
                        after: previous,
                        before: candle.timestamp,
                        missing_bars,
                    })
                }
                GapPolicy::Flag => {
                    warn!(
                        symbol,
                        after = %previous,
                        before = %candle.timestamp,
                        missing_bars,
                        "data gap flagged"
                    );
                    gaps.push(DataGap {
                        symbol: symbol.to_string(),
                        after: previous,
                        before: candle.timestamp,
                        missing_bars,
                    });
                }
            }
        }
    }

    Ok(SeriesReport {
        symbol: symbol.to_string(),
        bars: candles.len(),
        first,
        last,
        gaps,
    })
}
