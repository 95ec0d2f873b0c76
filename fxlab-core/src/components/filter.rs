//! Trade filters: session, trend and volatility gates applied to raw signals.
//!
//! Filters never see account or position state: they decide on the signal's
//! tags alone. A filtered signal never reaches the risk engine.

use serde::{Deserialize, Serialize};

use super::tags::{SessionTag, SignalTags, TrendRegime, VolatilityRegime};

/// Which filter rejected a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterReason {
    Session,
    Trend,
    LowVolatility,
    HighVolSideways,
}

impl FilterReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterReason::Session => "session",
            FilterReason::Trend => "trend",
            FilterReason::LowVolatility => "low_volatility",
            FilterReason::HighVolSideways => "high_vol_sideways",
        }
    }
}

/// Filter switches. All off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeFilters {
    /// Block signals in the ASIA session.
    pub session: bool,
    /// Block COUNTER_TREND signals.
    pub trend: bool,
    /// Block LOW volatility signals.
    pub low_volatility: bool,
    /// Block HIGH volatility signals in a SIDEWAYS trend.
    pub high_vol_sideways: bool,
}

impl TradeFilters {
    /// Evaluate in fixed order (session, trend, volatility); first rejection wins.
    pub fn evaluate(&self, tags: &SignalTags) -> Result<(), FilterReason> {
        if self.session && tags.session == SessionTag::Asia {
            return Err(FilterReason::Session);
        }
        if self.trend && tags.trend == TrendRegime::CounterTrend {
            return Err(FilterReason::Trend);
        }
        if self.low_volatility && tags.volatility == VolatilityRegime::Low {
            return Err(FilterReason::LowVolatility);
        }
        if self.high_vol_sideways
            && tags.volatility == VolatilityRegime::High
            && tags.trend == TrendRegime::Sideways
        {
            return Err(FilterReason::HighVolSideways);
        }
        Ok(())
    }

    pub fn any_enabled(&self) -> bool {
        self.session || self.trend || self.low_volatility || self.high_vol_sideways
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(session: SessionTag, trend: TrendRegime, volatility: VolatilityRegime) -> SignalTags {
        SignalTags { session, trend, volatility }
    }

    #[test]
    fn default_filters_pass_everything() {
        let filters = TradeFilters::default();
        assert!(!filters.any_enabled());
        let t = tags(SessionTag::Asia, TrendRegime::CounterTrend, VolatilityRegime::Low);
        assert_eq!(filters.evaluate(&t), Ok(()));
    }

    #[test]
    fn session_filter_blocks_asia_first() {
        let filters = TradeFilters { session: true, trend: true, ..Default::default() };
        let t = tags(SessionTag::Asia, TrendRegime::CounterTrend, VolatilityRegime::Normal);
        assert_eq!(filters.evaluate(&t), Err(FilterReason::Session));
        let t = tags(SessionTag::London, TrendRegime::CounterTrend, VolatilityRegime::Normal);
        assert_eq!(filters.evaluate(&t), Err(FilterReason::Trend));
    }

    #[test]
    fn volatility_filters() {
        let filters = TradeFilters {
            low_volatility: true,
            high_vol_sideways: true,
            ..Default::default()
        };
        let low = tags(SessionTag::Ny, TrendRegime::WithTrend, VolatilityRegime::Low);
        assert_eq!(filters.evaluate(&low), Err(FilterReason::LowVolatility));

        let high_sideways = tags(SessionTag::Ny, TrendRegime::Sideways, VolatilityRegime::High);
        assert_eq!(filters.evaluate(&high_sideways), Err(FilterReason::HighVolSideways));

        let high_trending = tags(SessionTag::Ny, TrendRegime::WithTrend, VolatilityRegime::High);
        assert_eq!(filters.evaluate(&high_trending), Ok(()));
    }

    #[test]
    fn filters_deserialize_with_defaults() {
        let filters: TradeFilters = serde_json::from_str(r#"{"trend": true}"#).unwrap();
        assert!(filters.trend);
        assert!(!filters.session);
    }
}
