//! Risk engine: the single gate every entry passes through.
//!
//! Three states:
//! - `TRADING`: entries allowed subject to position count and the worst-case check
//! - `DAILY_LOCKED`: daily loss reached the cap; lifts at the next UTC day
//! - `GLOBAL_LOCKED`: trailing drawdown reached the cap; terminal for the run
//!
//! The engine owns the realized [`EquityState`]. Closes are booked and the
//! state re-evaluated in one call so the two can never interleave.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::profile::RiskLimits;
use crate::domain::{EquityState, Position};

/// Slack on cap comparisons so a loss of exactly the cap locks.
pub const CAP_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskState {
    #[default]
    Trading,
    DailyLocked,
    GlobalLocked,
}

impl RiskState {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskState::Trading => "TRADING",
            RiskState::DailyLocked => "DAILY_LOCKED",
            RiskState::GlobalLocked => "GLOBAL_LOCKED",
        }
    }
}

impl std::fmt::Display for RiskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an entry was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    DailyLocked,
    GlobalLocked,
    MaxPositions,
    /// Realized loss today plus open risk plus the candidate would breach the daily cap.
    DailyWorstCase,
}

impl BlockReason {
    pub const ALL: [BlockReason; 4] = [
        BlockReason::DailyLocked,
        BlockReason::GlobalLocked,
        BlockReason::MaxPositions,
        BlockReason::DailyWorstCase,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlockReason::DailyLocked => "daily_locked",
            BlockReason::GlobalLocked => "global_locked",
            BlockReason::MaxPositions => "max_positions",
            BlockReason::DailyWorstCase => "daily_worst_case",
        }
    }
}

/// A recorded state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTransition {
    pub timestamp: DateTime<Utc>,
    pub from: RiskState,
    pub to: RiskState,
    pub daily_loss_pct: f64,
    pub trailing_dd_pct: f64,
}

/// Emitted when a bar opens a new UTC day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayRollover {
    pub previous_day: NaiveDate,
    pub day: NaiveDate,
    pub daily_start_equity: f64,
    /// The rollover lifted a `DAILY_LOCKED` state.
    pub unlocked: bool,
}

#[derive(Debug, Clone)]
pub struct RiskEngine {
    limits: RiskLimits,
    equity: EquityState,
    state: RiskState,
    clock: DateTime<Utc>,
    transitions: Vec<RiskTransition>,
}

impl RiskEngine {
    pub fn new(initial_equity: f64, limits: RiskLimits) -> Self {
        Self {
            limits,
            equity: EquityState::new(initial_equity),
            state: RiskState::Trading,
            clock: DateTime::<Utc>::default(),
            transitions: Vec::new(),
        }
    }

    // ── Queries ──

    pub fn state(&self) -> RiskState {
        self.state
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn equity(&self) -> &EquityState {
        &self.equity
    }

    pub fn current_equity(&self) -> f64 {
        self.equity.current_equity
    }

    pub fn daily_loss_pct(&self) -> f64 {
        self.equity.daily_loss_pct()
    }

    pub fn trailing_dd_pct(&self) -> f64 {
        self.equity.trailing_dd_pct()
    }

    pub fn transitions(&self) -> &[RiskTransition] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<RiskTransition> {
        self.transitions
    }

    // ── Clock ──

    /// Advance the engine clock. On the first bar of a new UTC day the daily
    /// start equity resets to current equity and a daily lock lifts.
    pub fn on_timestamp(&mut self, timestamp: DateTime<Utc>) -> Option<DayRollover> {
        self.clock = timestamp;
        let previous_day = self.equity.current_day;
        if !self.equity.roll_day(timestamp.date_naive()) {
            return None;
        }

        let unlocked = self.state == RiskState::DailyLocked;
        if unlocked {
            self.transition(RiskState::Trading);
        }
        Some(DayRollover {
            previous_day: previous_day.unwrap_or_else(|| timestamp.date_naive()),
            day: timestamp.date_naive(),
            daily_start_equity: self.equity.daily_start_equity,
            unlocked,
        })
    }

    // ── Entry gate ──

    /// Decide whether a new position risking `candidate_risk_fraction` of
    /// current equity may open alongside `open_positions`.
    pub fn check_entry(
        &self,
        candidate_risk_fraction: f64,
        open_positions: &[Position],
    ) -> Result<(), BlockReason> {
        match self.state {
            RiskState::GlobalLocked => return Err(BlockReason::GlobalLocked),
            RiskState::DailyLocked => return Err(BlockReason::DailyLocked),
            RiskState::Trading => {}
        }
        if open_positions.len() >= self.limits.max_concurrent_positions {
            return Err(BlockReason::MaxPositions);
        }

        let start = self.equity.daily_start_equity;
        let realized_today = start - self.equity.current_equity;
        let open_risk: f64 = open_positions.iter().map(|p| p.risk_amount).sum();
        let candidate = candidate_risk_fraction.max(0.0) * self.equity.current_equity;
        let worst_case = realized_today + open_risk + candidate;
        let budget = self.limits.daily_loss_cap_fraction * start;
        if worst_case > budget + CAP_TOLERANCE * start {
            return Err(BlockReason::DailyWorstCase);
        }
        Ok(())
    }

    pub fn can_open_position(&self, candidate_risk_fraction: f64, open_positions: &[Position]) -> bool {
        self.check_entry(candidate_risk_fraction, open_positions).is_ok()
    }

    // ── Closes ──

    /// Book a realized P&L and re-evaluate the state. Returns the transition
    /// this close caused, if any.
    pub fn record_close(&mut self, realized_pnl: f64) -> Option<RiskTransition> {
        self.equity.apply_close(realized_pnl);
        self.evaluate()
    }

    fn evaluate(&mut self) -> Option<RiskTransition> {
        if self.state == RiskState::GlobalLocked {
            return None;
        }

        let trailing = self.equity.trailing_dd_pct();
        if trailing + CAP_TOLERANCE >= self.limits.trailing_drawdown_cap_fraction {
            let t = self.transition(RiskState::GlobalLocked);
            warn!(
                equity = self.equity.current_equity,
                hwm = self.equity.high_water_mark,
                trailing_dd_pct = trailing,
                "trailing drawdown cap reached, entries disabled for the rest of the run"
            );
            return Some(t);
        }

        let daily = self.equity.daily_loss_pct();
        if self.state == RiskState::Trading
            && daily + CAP_TOLERANCE >= self.limits.daily_loss_cap_fraction
        {
            let t = self.transition(RiskState::DailyLocked);
            warn!(
                equity = self.equity.current_equity,
                daily_start = self.equity.daily_start_equity,
                daily_loss_pct = daily,
                "daily loss cap reached, entries blocked until next UTC day"
            );
            return Some(t);
        }
        None
    }

    fn transition(&mut self, to: RiskState) -> RiskTransition {
        let t = RiskTransition {
            timestamp: self.clock,
            from: self.state,
            to,
            daily_loss_pct: self.equity.daily_loss_pct(),
            trailing_dd_pct: self.equity.trailing_dd_pct(),
        };
        self.state = to;
        self.transitions.push(t.clone());
        t
    }
}
