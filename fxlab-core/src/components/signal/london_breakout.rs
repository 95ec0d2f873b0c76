//! London session breakout of the Asian range.
//!
//! Per UTC day: the Asian session's high/low form a box. If the box height is
//! within `[min_range_pips, max_range_pips]`, the first trade through
//! `high + buffer` (long) or `low - buffer` (short) before `london_end_hour`
//! fires one signal for the day. Stop at the box midpoint, target one box height.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Signal, SignalDirection, SignalGenerator};
use crate::components::tags::SignalTags;
use crate::domain::{Candle, RiskTier};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LondonBreakoutParams {
    pub asian_start_hour: u32,
    pub asian_end_hour: u32,
    pub london_end_hour: u32,
    pub min_range_pips: f64,
    pub max_range_pips: f64,
    pub trigger_buffer_pips: f64,
}

impl Default for LondonBreakoutParams {
    fn default() -> Self {
        Self {
            asian_start_hour: 0,
            asian_end_hour: 7,
            london_end_hour: 12,
            min_range_pips: 15.0,
            max_range_pips: 60.0,
            trigger_buffer_pips: 3.0,
        }
    }
}

impl LondonBreakoutParams {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.asian_start_hour < self.asian_end_hour
            && self.asian_end_hour < self.london_end_hour
            && self.london_end_hour <= 24)
        {
            return Err(format!(
                "session hours must satisfy start ({}) < asian_end ({}) < london_end ({}) <= 24",
                self.asian_start_hour, self.asian_end_hour, self.london_end_hour
            ));
        }
        if !(self.min_range_pips >= 0.0 && self.min_range_pips <= self.max_range_pips) {
            return Err("range pips must satisfy 0 <= min_range_pips <= max_range_pips".into());
        }
        if !(self.trigger_buffer_pips >= 0.0) {
            return Err("trigger_buffer_pips must be >= 0".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RangeBox {
    buy_trigger: f64,
    sell_trigger: f64,
    mid: f64,
    height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BoxState {
    Building,
    Ready(RangeBox),
    Invalid,
}

#[derive(Debug, Clone)]
pub struct LondonBreakout {
    params: LondonBreakoutParams,
    pip_size: f64,
    current_day: Option<NaiveDate>,
    asian_high: Option<f64>,
    asian_low: Option<f64>,
    state: BoxState,
    triggered: bool,
}

impl LondonBreakout {
    pub fn new(params: LondonBreakoutParams, pip_size: f64) -> Self {
        Self {
            params,
            pip_size,
            current_day: None,
            asian_high: None,
            asian_low: None,
            state: BoxState::Building,
            triggered: false,
        }
    }

    fn start_day(&mut self, day: NaiveDate) {
        self.current_day = Some(day);
        self.asian_high = None;
        self.asian_low = None;
        self.state = BoxState::Building;
        self.triggered = false;
    }

    fn finalize_box(&mut self) {
        self.state = match (self.asian_high, self.asian_low) {
            (Some(high), Some(low)) => {
                let height = high - low;
                let height_pips = height / self.pip_size;
                if height_pips < self.params.min_range_pips
                    || height_pips > self.params.max_range_pips
                {
                    BoxState::Invalid
                } else {
                    let buffer = self.params.trigger_buffer_pips * self.pip_size;
                    BoxState::Ready(RangeBox {
                        buy_trigger: high + buffer,
                        sell_trigger: low - buffer,
                        mid: (high + low) / 2.0,
                        height,
                    })
                }
            }
            _ => BoxState::Invalid,
        };
    }
}

impl SignalGenerator for LondonBreakout {
    fn name(&self) -> &str {
        "london_breakout"
    }

    fn required_lookback(&self) -> usize {
        1
    }

    fn on_bar(&mut self, timestamp: DateTime<Utc>, window: &[Candle]) -> Option<Signal> {
        let candle = window.last()?;
        let day = candle.date();
        if self.current_day != Some(day) {
            self.start_day(day);
        }

        let hour = candle.hour();
        let p = &self.params;
        if (p.asian_start_hour..p.asian_end_hour).contains(&hour) {
            self.asian_high = Some(self.asian_high.map_or(candle.high, |h| h.max(candle.high)));
            self.asian_low = Some(self.asian_low.map_or(candle.low, |l| l.min(candle.low)));
            return None;
        }
        if hour < p.asian_end_hour || hour >= p.london_end_hour || self.triggered {
            return None;
        }
        if self.state == BoxState::Building {
            self.finalize_box();
        }
        let range = match self.state {
            BoxState::Ready(range) => range,
            _ => return None,
        };

        let (direction, entry_price) = if candle.high >= range.buy_trigger {
            (SignalDirection::Long, range.buy_trigger)
        } else if candle.low <= range.sell_trigger {
            (SignalDirection::Short, range.sell_trigger)
        } else {
            return None;
        };
        self.triggered = true;

        let mut stop_distance = (entry_price - range.mid).abs();
        if stop_distance <= 0.0 {
            stop_distance = (range.height / 2.0).max(self.pip_size);
        }
        let target_distance = range.height.max(self.pip_size);

        Some(Signal {
            timestamp,
            direction,
            entry_price,
            stop_distance,
            target_distance,
            tier: RiskTier::Unknown,
            tags: SignalTags::for_hour(hour),
            reason: match direction {
                SignalDirection::Long => "ldn_long",
                _ => "ldn_short",
            },
        })
    }

    fn reset(&mut self) {
        self.current_day = None;
        self.asian_high = None;
        self.asian_low = None;
        self.state = BoxState::Building;
        self.triggered = false;
    }
}
