use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tier::RiskTier;

/// Side of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One open trade, exclusively owned by the backtest loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub direction: Direction,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    /// Live stop level. Starts at `initial_stop_price` and only moves in the
    /// position's favor once exit management is active.
    pub stop_price: f64,
    pub initial_stop_price: f64,
    pub target_price: f64,
    pub lots: f64,
    /// Money lost if the stop fills at its price.
    pub risk_amount: f64,
    pub tier: RiskTier,
    /// Risk fraction the position was sized with (after tier scaling).
    pub risk_fraction: f64,
    /// Stop has been moved to entry.
    #[serde(default)]
    pub breakeven_active: bool,
}

impl Position {
    /// Build a position from an entry reference and stop/target distances.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        symbol: impl Into<String>,
        direction: Direction,
        entry_time: DateTime<Utc>,
        entry_price: f64,
        stop_distance: f64,
        target_distance: f64,
        lots: f64,
        risk_amount: f64,
        tier: RiskTier,
        risk_fraction: f64,
    ) -> Self {
        let sign = direction.sign();
        let stop_price = entry_price - sign * stop_distance;
        Self {
            symbol: symbol.into(),
            direction,
            entry_time,
            entry_price,
            stop_price,
            initial_stop_price: stop_price,
            target_price: entry_price + sign * target_distance,
            lots,
            risk_amount,
            tier,
            risk_fraction,
            breakeven_active: false,
        }
    }

    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    pub fn is_short(&self) -> bool {
        self.direction == Direction::Short
    }

    pub fn stop_distance(&self) -> f64 {
        (self.entry_price - self.stop_price).abs()
    }

    pub fn target_distance(&self) -> f64 {
        (self.target_price - self.entry_price).abs()
    }

    /// Whether `price` is at or beyond the stop.
    pub fn stop_touched(&self, price: f64) -> bool {
        match self.direction {
            Direction::Long => price <= self.stop_price,
            Direction::Short => price >= self.stop_price,
        }
    }

    /// Whether `price` is at or beyond the target.
    pub fn target_touched(&self, price: f64) -> bool {
        match self.direction {
            Direction::Long => price >= self.target_price,
            Direction::Short => price <= self.target_price,
        }
    }

    /// Signed price move from entry to `price` in the position's favor.
    pub fn favorable_move(&self, price: f64) -> f64 {
        self.direction.sign() * (price - self.entry_price)
    }

    /// Price distance between entry and the stop the position opened with.
    pub fn initial_risk_distance(&self) -> f64 {
        (self.entry_price - self.initial_stop_price).abs()
    }

    /// Open profit at `price` in multiples of the initial risk distance.
    pub fn r_multiple_at(&self, price: f64) -> f64 {
        let risk = self.initial_risk_distance();
        if risk > 0.0 {
            self.favorable_move(price) / risk
        } else {
            0.0
        }
    }

    /// Move the stop to `level` if that tightens it. Returns whether it moved.
    pub fn tighten_stop(&mut self, level: f64) -> bool {
        let moved = level.is_finite()
            && match self.direction {
                Direction::Long => level > self.stop_price,
                Direction::Short => level < self.stop_price,
            };
        if moved {
            self.stop_price = level;
        }
        moved
    }
}
