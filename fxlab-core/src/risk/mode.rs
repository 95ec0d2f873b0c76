//! Adaptive risk mode: steps the active profile down on drawdown and back up
//! after a sustained run of good performance.
//!
//! Only the per-trade risk fraction follows the mode. Daily and trailing caps
//! stay as configured.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::profile::RiskProfile;

/// Trades in the performance window.
pub const STEP_UP_WINDOW: usize = 40;
const STEP_UP_MIN_WIN_RATE: f64 = 0.58;
/// Max (high - low) / high of equity across the window.
const STEP_UP_MAX_EQUITY_RANGE: f64 = 0.015;
const STEP_DOWN_SEVERE_DD: f64 = 0.03;
const STEP_DOWN_DD: f64 = 0.02;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeTransition {
    pub timestamp: DateTime<Utc>,
    pub from: RiskProfile,
    pub to: RiskProfile,
    pub reason: &'static str,
}

#[derive(Debug, Clone)]
pub struct ModeController {
    mode: RiskProfile,
    window: usize,
    trade_pnls: VecDeque<f64>,
    equity_history: VecDeque<f64>,
    transitions: Vec<ModeTransition>,
}

impl ModeController {
    pub fn new(initial: RiskProfile) -> Self {
        Self::with_window(initial, STEP_UP_WINDOW)
    }

    pub fn with_window(initial: RiskProfile, window: usize) -> Self {
        let window = window.max(1);
        Self {
            mode: initial,
            window,
            trade_pnls: VecDeque::with_capacity(window),
            equity_history: VecDeque::with_capacity(window),
            transitions: Vec::new(),
        }
    }

    pub fn mode(&self) -> RiskProfile {
        self.mode
    }

    /// Risk-per-trade fraction of the active mode.
    pub fn risk_fraction(&self) -> f64 {
        self.mode.limits().risk_per_trade_fraction
    }

    pub fn transitions(&self) -> &[ModeTransition] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<ModeTransition> {
        self.transitions
    }

    /// Step down when the trailing drawdown deepens.
    pub fn on_drawdown(&mut self, timestamp: DateTime<Utc>, trailing_dd: f64) {
        if trailing_dd >= STEP_DOWN_SEVERE_DD {
            self.switch(timestamp, RiskProfile::UltraUltraConservative, "drawdown >= 3%");
        } else if trailing_dd >= STEP_DOWN_DD && self.mode == RiskProfile::Conservative {
            self.switch(timestamp, RiskProfile::UltraConservative, "drawdown >= 2%");
        }
    }

    /// Feed a closed trade. Steps up once the window is full, the win rate is
    /// high, equity has been stable and sits at its high-water mark.
    pub fn record_trade(
        &mut self,
        timestamp: DateTime<Utc>,
        pnl: f64,
        equity_after: f64,
        high_water_mark: f64,
    ) {
        if self.trade_pnls.len() == self.window {
            self.trade_pnls.pop_front();
            self.equity_history.pop_front();
        }
        self.trade_pnls.push_back(pnl);
        self.equity_history.push_back(equity_after);

        if self.trade_pnls.len() < self.window || equity_after < high_water_mark - 1e-9 {
            return;
        }
        let wins = self.trade_pnls.iter().filter(|&&p| p > 0.0).count();
        let win_rate = wins as f64 / self.trade_pnls.len() as f64;
        if win_rate < STEP_UP_MIN_WIN_RATE || self.recent_equity_range() > STEP_UP_MAX_EQUITY_RANGE {
            return;
        }
        let next = self.mode.step_up();
        self.switch(timestamp, next, "performance step-up");
    }

    fn recent_equity_range(&self) -> f64 {
        if self.equity_history.len() < 2 {
            return 0.0;
        }
        let high = self.equity_history.iter().copied().fold(f64::MIN, f64::max);
        let low = self.equity_history.iter().copied().fold(f64::MAX, f64::min);
        if high <= 0.0 {
            return 0.0;
        }
        (high - low) / high
    }

    fn switch(&mut self, timestamp: DateTime<Utc>, to: RiskProfile, reason: &'static str) {
        if to == self.mode {
            return;
        }
        if to < self.mode {
            warn!(from = %self.mode, to = %to, reason, "risk mode step-down");
        } else {
            info!(from = %self.mode, to = %to, reason, "risk mode step-up");
        }
        self.transitions.push(ModeTransition { timestamp, from: self.mode, to, reason });
        self.mode = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn two_percent_drawdown_steps_conservative_down_once() {
        let mut mc = ModeController::new(RiskProfile::Conservative);
        mc.on_drawdown(ts(), 0.021);
        assert_eq!(mc.mode(), RiskProfile::UltraConservative);
        mc.on_drawdown(ts(), 0.025);
        assert_eq!(mc.mode(), RiskProfile::UltraConservative);
        assert_eq!(mc.transitions().len(), 1);
    }

    #[test]
    fn severe_drawdown_goes_to_most_cautious() {
        let mut mc = ModeController::new(RiskProfile::Conservative);
        mc.on_drawdown(ts(), 0.031);
        assert_eq!(mc.mode(), RiskProfile::UltraUltraConservative);
        assert!((mc.risk_fraction() - 0.002).abs() < 1e-12);
    }

    #[test]
    fn steps_up_after_full_winning_window() {
        let mut mc = ModeController::with_window(RiskProfile::UltraUltraConservative, 10);
        let mut equity: f64 = 10_000.0;
        let mut hwm = equity;
        for i in 0..10 {
            let pnl = if i % 4 == 2 { -5.0 } else { 10.0 };
            equity += pnl;
            hwm = hwm.max(equity);
            mc.record_trade(ts(), pnl, equity, hwm);
        }
        assert_eq!(mc.mode(), RiskProfile::UltraConservative);
        assert_eq!(mc.transitions()[0].reason, "performance step-up");
    }

    #[test]
    fn no_step_up_below_hwm_or_partial_window() {
        let mut mc = ModeController::with_window(RiskProfile::UltraConservative, 5);
        for _ in 0..4 {
            mc.record_trade(ts(), 10.0, 10_000.0, 10_000.0);
        }
        assert_eq!(mc.mode(), RiskProfile::UltraConservative);
        mc.record_trade(ts(), 10.0, 9_990.0, 10_000.0);
        assert_eq!(mc.mode(), RiskProfile::UltraConservative);
    }

    #[test]
    fn losing_window_does_not_step_up() {
        let mut mc = ModeController::with_window(RiskProfile::UltraConservative, 4);
        for pnl in [10.0, -5.0, -5.0, 10.0] {
            mc.record_trade(ts(), pnl, 10_000.0, 10_000.0);
        }
        assert_eq!(mc.mode(), RiskProfile::UltraConservative);
    }
}
