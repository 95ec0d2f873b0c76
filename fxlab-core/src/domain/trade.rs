//! Trade log entries: immutable records of entries and closed round trips.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::{Direction, Position};
use super::tier::RiskTier;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Stop,
    Target,
    /// Stop hit after it was moved to break-even or trailed.
    TrailingStop,
    /// Closed at the bar close once open profit reached the extended R target.
    ExtendedTarget,
    /// Closed at the bar close on a signal in the other direction.
    OppositeSignal,
    /// Force-closed at the instrument's final close.
    DataEnd,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::Stop => "stop",
            ExitReason::Target => "target",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::ExtendedTarget => "extended_target",
            ExitReason::OppositeSignal => "opposite_signal",
            ExitReason::DataEnd => "data_end",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A closed position. Created once at close and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    // ── Identification ──
    pub symbol: String,
    pub direction: Direction,
    pub tier: RiskTier,

    // ── Entry ──
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,

    // ── Exit ──
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_reason: ExitReason,

    // ── Size ──
    pub lots: f64,
    pub risk_amount: f64,

    // ── PnL ──
    pub pnl: f64,
    /// Equity after this close was booked.
    pub equity_after: f64,
}

impl TradeLogEntry {
    pub fn from_close(
        position: &Position,
        exit_time: DateTime<Utc>,
        exit_price: f64,
        exit_reason: ExitReason,
        pnl: f64,
        equity_after: f64,
    ) -> Self {
        Self {
            symbol: position.symbol.clone(),
            direction: position.direction,
            tier: position.tier,
            entry_time: position.entry_time,
            entry_price: position.entry_price,
            stop_price: position.initial_stop_price,
            target_price: position.target_price,
            exit_time,
            exit_price,
            exit_reason,
            lots: position.lots,
            risk_amount: position.risk_amount,
            pnl,
            equity_after,
        }
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    /// P&L in units of initial risk. Zero when no risk was committed.
    pub fn r_multiple(&self) -> f64 {
        if self.risk_amount > 0.0 {
            self.pnl / self.risk_amount
        } else {
            0.0
        }
    }

    /// Planned reward:risk from the entry's stop and target levels.
    pub fn planned_reward_risk(&self) -> f64 {
        let risk = (self.entry_price - self.stop_price).abs();
        if risk > 0.0 {
            (self.target_price - self.entry_price).abs() / risk
        } else {
            0.0
        }
    }
}

/// An entry event, appended when a position opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryLogEntry {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub direction: Direction,
    pub tier: RiskTier,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub lots: f64,
    pub risk_amount: f64,
    pub risk_fraction: f64,
    pub reason: String,
}

impl EntryLogEntry {
    pub fn from_position(position: &Position, reason: &str) -> Self {
        Self {
            timestamp: position.entry_time,
            symbol: position.symbol.clone(),
            direction: position.direction,
            tier: position.tier,
            entry_price: position.entry_price,
            stop_price: position.stop_price,
            target_price: position.target_price,
            lots: position.lots,
            risk_amount: position.risk_amount,
            risk_fraction: position.risk_fraction,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_position() -> Position {
        Position::open(
            "EURUSD",
            Direction::Long,
            Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap(),
            1.1000,
            0.0020,
            0.0040,
            0.5,
            100.0,
            RiskTier::B,
            0.01,
        )
    }

    #[test]
    fn r_multiple_and_planned_rr() {
        let pos = sample_position();
        let trade = TradeLogEntry::from_close(
            &pos,
            Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap(),
            1.1040,
            ExitReason::Target,
            200.0,
            10_200.0,
        );
        assert!(trade.is_winner());
        assert!((trade.r_multiple() - 2.0).abs() < 1e-10);
        assert!((trade.planned_reward_risk() - 2.0).abs() < 1e-9);
        assert_eq!(trade.tier, RiskTier::B);
    }

    #[test]
    fn zero_risk_gives_zero_r() {
        let mut pos = sample_position();
        pos.risk_amount = 0.0;
        let trade = TradeLogEntry::from_close(
            &pos,
            pos.entry_time,
            1.1000,
            ExitReason::DataEnd,
            0.0,
            10_000.0,
        );
        assert_eq!(trade.r_multiple(), 0.0);
        assert!(!trade.is_winner());
    }

    #[test]
    fn trailed_stop_keeps_planned_levels() {
        let mut pos = sample_position();
        pos.tighten_stop(1.1010);
        let trade = TradeLogEntry::from_close(
            &pos,
            Utc.with_ymd_and_hms(2024, 1, 2, 18, 0, 0).unwrap(),
            1.1010,
            ExitReason::TrailingStop,
            50.0,
            10_050.0,
        );
        assert!((trade.stop_price - 1.0980).abs() < 1e-12);
        assert!((trade.planned_reward_risk() - 2.0).abs() < 1e-9);
        assert!((trade.r_multiple() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn exit_reason_labels() {
        assert_eq!(ExitReason::DataEnd.to_string(), "data_end");
        assert_eq!(serde_json::to_string(&ExitReason::Stop).unwrap(), "\"stop\"");
        assert_eq!(
            serde_json::to_string(&ExitReason::ExtendedTarget).unwrap(),
            format!("\"{}\"", ExitReason::ExtendedTarget.as_str())
        );
        assert_eq!(ExitReason::OppositeSignal.to_string(), "opposite_signal");
    }

    #[test]
    fn entry_log_copies_position() {
        let pos = sample_position();
        let entry = EntryLogEntry::from_position(&pos, "sma_cross_up");
        assert_eq!(entry.symbol, "EURUSD");
        assert_eq!(entry.lots, 0.5);
        assert_eq!(entry.reason, "sma_cross_up");
    }
}
