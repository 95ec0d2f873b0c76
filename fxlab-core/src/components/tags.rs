//! Context tags attached to every signal: trading session, trend regime, volatility regime.

use serde::{Deserialize, Serialize};

/// Trading session by UTC hour of the bar open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionTag {
    Asia,
    London,
    Ny,
}

impl SessionTag {
    /// ASIA [0, 8), LONDON [8, 16), NY [16, 24).
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=7 => SessionTag::Asia,
            8..=15 => SessionTag::London,
            _ => SessionTag::Ny,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionTag::Asia => "ASIA",
            SessionTag::London => "LONDON",
            SessionTag::Ny => "NY",
        }
    }
}

/// Position of the signal relative to the higher-timeframe trend.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendRegime {
    WithTrend,
    CounterTrend,
    Sideways,
    #[default]
    Unknown,
}

impl TrendRegime {
    /// Classify a directional signal against `slow - trend` SMA spread.
    ///
    /// A spread within `sideways_band` (price units) is SIDEWAYS.
    pub fn classify(is_long: bool, slow: f64, trend: f64, sideways_band: f64) -> Self {
        if !slow.is_finite() || !trend.is_finite() {
            return TrendRegime::Unknown;
        }
        let diff = slow - trend;
        if diff.abs() < sideways_band {
            return TrendRegime::Sideways;
        }
        if (diff > 0.0) == is_long {
            TrendRegime::WithTrend
        } else {
            TrendRegime::CounterTrend
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrendRegime::WithTrend => "WITH_TREND",
            TrendRegime::CounterTrend => "COUNTER_TREND",
            TrendRegime::Sideways => "SIDEWAYS",
            TrendRegime::Unknown => "UNKNOWN",
        }
    }
}

/// ATR level bucket.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityRegime {
    Low,
    Normal,
    High,
    #[default]
    Unknown,
}

impl VolatilityRegime {
    /// LOW below `low_pips`, HIGH above `high_pips`, NORMAL in between (inclusive).
    pub fn classify(atr_pips: f64, low_pips: f64, high_pips: f64) -> Self {
        if !atr_pips.is_finite() {
            VolatilityRegime::Unknown
        } else if atr_pips < low_pips {
            VolatilityRegime::Low
        } else if atr_pips <= high_pips {
            VolatilityRegime::Normal
        } else {
            VolatilityRegime::High
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VolatilityRegime::Low => "LOW",
            VolatilityRegime::Normal => "NORMAL",
            VolatilityRegime::High => "HIGH",
            VolatilityRegime::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalTags {
    pub session: SessionTag,
    pub trend: TrendRegime,
    pub volatility: VolatilityRegime,
}

impl SignalTags {
    /// Session from the hour; trend and volatility unknown.
    pub fn for_hour(hour: u32) -> Self {
        Self {
            session: SessionTag::from_hour(hour),
            trend: TrendRegime::Unknown,
            volatility: VolatilityRegime::Unknown,
        }
    }
}
