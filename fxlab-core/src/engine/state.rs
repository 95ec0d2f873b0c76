//! Run result types and the per-day / per-signal counters the loop keeps.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::components::FilterReason;
use crate::data::DataGap;
use crate::domain::{EntryLogEntry, TradeLogEntry};
use crate::risk::{BlockReason, ModeTransition, RiskState, RiskTransition};

/// One point of the equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    /// Realized equity (what the risk engine sees).
    pub equity: f64,
    /// Realized equity plus open positions marked at their last close.
    pub marked_equity: f64,
}

/// Realized figures for one UTC day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub start_equity: f64,
    pub end_equity: f64,
    /// Lowest realized equity seen during the day.
    pub min_equity: f64,
    pub realized_pnl: f64,
    pub entries: usize,
    pub closes: usize,
    /// Risk state when the day ended.
    pub end_state: RiskState,
}

impl DailyStats {
    pub fn open(date: NaiveDate, start_equity: f64) -> Self {
        Self {
            date,
            start_equity,
            end_equity: start_equity,
            min_equity: start_equity,
            realized_pnl: 0.0,
            entries: 0,
            closes: 0,
            end_state: RiskState::Trading,
        }
    }

    pub fn record_close(&mut self, pnl: f64, equity_after: f64) {
        self.realized_pnl += pnl;
        self.end_equity = equity_after;
        self.min_equity = self.min_equity.min(equity_after);
        self.closes += 1;
    }

    /// Deepest realized loss of the day as a fraction of its start equity.
    pub fn max_loss_pct(&self) -> f64 {
        if self.start_equity > 0.0 {
            ((self.start_equity - self.min_equity) / self.start_equity).max(0.0)
        } else {
            0.0
        }
    }
}

/// What happened to the signals the strategies produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignalStats {
    /// Non-flat signals on an instrument with no open position.
    pub raw_signals: usize,
    /// Signals ignored because the instrument already held a position.
    pub while_in_position: usize,
    pub filtered: BTreeMap<FilterReason, usize>,
    pub tier_blocked: usize,
    pub risk_blocked: BTreeMap<BlockReason, usize>,
    /// Sizer returned zero lots.
    pub sizing_skips: usize,
    pub entries: usize,
}

impl SignalStats {
    pub fn total_filtered(&self) -> usize {
        self.filtered.values().sum()
    }

    pub fn total_risk_blocked(&self) -> usize {
        self.risk_blocked.values().sum()
    }

    pub fn blocked_by(&self, reason: BlockReason) -> usize {
        self.risk_blocked.get(&reason).copied().unwrap_or(0)
    }
}

/// Result of a complete backtest run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub initial_equity: f64,
    pub final_equity: f64,
    /// Closed trades in close order.
    pub trades: Vec<TradeLogEntry>,
    /// Entries in open order.
    pub entries: Vec<EntryLogEntry>,
    /// One point per distinct event timestamp.
    pub equity_curve: Vec<EquityPoint>,
    pub daily_stats: Vec<DailyStats>,
    pub signal_stats: SignalStats,
    pub risk_transitions: Vec<RiskTransition>,
    pub mode_transitions: Vec<ModeTransition>,
    /// Gaps tolerated under `GapPolicy::Flag`.
    pub data_gaps: Vec<DataGap>,
    pub bar_counts: BTreeMap<String, usize>,
    pub event_count: usize,
    pub final_risk_state: RiskState,
}

impl RunResult {
    pub fn total_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    /// Time of the first lock into `GLOBAL_LOCKED`, if any.
    pub fn global_lock_time(&self) -> Option<DateTime<Utc>> {
        self.risk_transitions
            .iter()
            .find(|t| t.to == RiskState::GlobalLocked)
            .map(|t| t.timestamp)
    }
}
