//! Performance metrics: pure functions over the trade log and equity curve.
//!
//! Drawdown and daily figures use realized equity, the same series the risk
//! engine enforces its limits on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fxlab_core::domain::TradeLogEntry;
use fxlab_core::engine::{DailyStats, EquityPoint};

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    /// Peak-to-trough fraction of realized equity, reported positive.
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub avg_win: f64,
    /// Average losing trade, reported positive.
    pub avg_loss: f64,
    pub trade_count: usize,
    /// Deepest realized loss within one UTC day, against that day's start equity.
    pub max_daily_loss: f64,
    pub profit_factor: f64,
    /// Mean P&L in units of committed risk.
    pub expectancy_r: f64,
    pub avg_reward_risk: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub sharpe: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics for one run.
    pub fn compute(
        equity_curve: &[EquityPoint],
        trades: &[TradeLogEntry],
        initial_equity: f64,
        daily_stats: &[DailyStats],
    ) -> Self {
        let final_equity = equity_curve.last().map_or(initial_equity, |p| p.equity);
        let realized: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
        Self {
            total_return: total_return(initial_equity, final_equity),
            max_drawdown: max_drawdown(initial_equity, &realized),
            win_rate: win_rate(trades),
            avg_win: avg_win(trades),
            avg_loss: avg_loss(trades),
            trade_count: trades.len(),
            max_daily_loss: max_daily_loss(daily_stats),
            profit_factor: profit_factor(trades),
            expectancy_r: expectancy_r(trades),
            avg_reward_risk: avg_reward_risk(trades),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            sharpe: sharpe_ratio(&daily_returns(daily_stats)),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction of initial equity.
pub fn total_return(initial_equity: f64, final_equity: f64) -> f64 {
    if initial_equity <= 0.0 {
        return 0.0;
    }
    (final_equity - initial_equity) / initial_equity
}

/// Largest peak-to-trough decline as a positive fraction of the peak.
///
/// The peak starts at `initial_equity`, so a run that only loses still
/// reports its drawdown.
pub fn max_drawdown(initial_equity: f64, equity: &[f64]) -> f64 {
    let mut peak = initial_equity;
    let mut max_dd = 0.0_f64;
    for &eq in equity {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak);
        }
    }
    max_dd
}

/// Fraction of trades with positive P&L.
pub fn win_rate(trades: &[TradeLogEntry]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

pub fn avg_win(trades: &[TradeLogEntry]) -> f64 {
    mean_f64(&trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).collect::<Vec<_>>())
}

pub fn avg_loss(trades: &[TradeLogEntry]) -> f64 {
    mean_f64(&trades.iter().filter(|t| t.pnl < 0.0).map(|t| -t.pnl).collect::<Vec<_>>())
}

/// Gross profit over gross loss, capped at 100.0 (all winners).
pub fn profit_factor(trades: &[TradeLogEntry]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades.iter().filter(|t| t.pnl < 0.0).map(|t| -t.pnl).sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Mean R multiple.
pub fn expectancy_r(trades: &[TradeLogEntry]) -> f64 {
    mean_f64(&trades.iter().map(|t| t.r_multiple()).collect::<Vec<_>>())
}

/// Mean planned reward:risk at entry.
pub fn avg_reward_risk(trades: &[TradeLogEntry]) -> f64 {
    mean_f64(&trades.iter().map(|t| t.planned_reward_risk()).collect::<Vec<_>>())
}

pub fn max_daily_loss(daily_stats: &[DailyStats]) -> f64 {
    daily_stats.iter().map(DailyStats::max_loss_pct).fold(0.0, f64::max)
}

/// Annualized Sharpe ratio: mean / sample std × √252.
///
/// Returns 0.0 with fewer than two returns or zero variance.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(returns) / std * 252.0_f64.sqrt()
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Realized return of each UTC day.
pub fn daily_returns(daily_stats: &[DailyStats]) -> Vec<f64> {
    daily_stats
        .iter()
        .map(|d| {
            if d.start_equity > 0.0 {
                (d.end_equity - d.start_equity) / d.start_equity
            } else {
                0.0
            }
        })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_consecutive(trades: &[TradeLogEntry], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

// ─── Breakdowns ─────────────────────────────────────────────────────

/// Counts and averages for one group of trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub trades: usize,
    pub wins: usize,
    pub pnl: f64,
    pub expectancy_r: f64,
}

impl GroupStats {
    fn from_trades<'a>(trades: impl Iterator<Item = &'a TradeLogEntry>) -> Self {
        let mut stats = GroupStats::default();
        let mut r_sum = 0.0;
        for t in trades {
            stats.trades += 1;
            stats.wins += usize::from(t.is_winner());
            stats.pnl += t.pnl;
            r_sum += t.r_multiple();
        }
        if stats.trades > 0 {
            stats.expectancy_r = r_sum / stats.trades as f64;
        }
        stats
    }

    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            self.wins as f64 / self.trades as f64
        }
    }
}

/// Trade log grouped by risk tier, by symbol and by exit reason.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeBreakdown {
    pub by_tier: BTreeMap<String, GroupStats>,
    pub by_symbol: BTreeMap<String, GroupStats>,
    pub by_exit_reason: BTreeMap<String, GroupStats>,
}

impl TradeBreakdown {
    pub fn compute(trades: &[TradeLogEntry]) -> Self {
        fn group<F: Fn(&TradeLogEntry) -> String>(
            trades: &[TradeLogEntry],
            key: F,
        ) -> BTreeMap<String, GroupStats> {
            let mut buckets: BTreeMap<String, Vec<&TradeLogEntry>> = BTreeMap::new();
            for t in trades {
                buckets.entry(key(t)).or_default().push(t);
            }
            buckets
                .into_iter()
                .map(|(k, v)| (k, GroupStats::from_trades(v.into_iter())))
                .collect()
        }

        Self {
            by_tier: group(trades, |t| t.tier.as_str().to_string()),
            by_symbol: group(trades, |t| t.symbol.clone()),
            by_exit_reason: group(trades, |t| t.exit_reason.as_str().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use fxlab_core::domain::{Direction, ExitReason, RiskTier};
    use fxlab_core::risk::RiskState;
    use proptest::prelude::*;

    fn make_trade(symbol: &str, pnl: f64, tier: RiskTier, reason: ExitReason) -> TradeLogEntry {
        let entry = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        TradeLogEntry {
            symbol: symbol.into(),
            direction: Direction::Long,
            tier,
            entry_time: entry,
            entry_price: 1.1000,
            stop_price: 1.0980,
            target_price: 1.1040,
            exit_time: entry + Duration::hours(3),
            exit_price: 1.1000 + pnl / 1_000_000.0,
            exit_reason: reason,
            lots: 0.5,
            risk_amount: 100.0,
            pnl,
            equity_after: 10_000.0 + pnl,
        }
    }

    fn trade(pnl: f64) -> TradeLogEntry {
        make_trade("EURUSD", pnl, RiskTier::Unknown, ExitReason::Stop)
    }

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| EquityPoint {
                timestamp: t0 + Duration::hours(i as i64),
                equity: v,
                marked_equity: v,
            })
            .collect()
    }

    fn day(d: u32, start: f64, end: f64, min: f64) -> DailyStats {
        DailyStats {
            date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
            start_equity: start,
            end_equity: end,
            min_equity: min,
            realized_pnl: end - start,
            entries: 1,
            closes: 1,
            end_state: RiskState::Trading,
        }
    }

    // ── Returns and drawdown ──

    #[test]
    fn total_return_fraction() {
        assert!((total_return(10_000.0, 11_000.0) - 0.1).abs() < 1e-12);
        assert!((total_return(10_000.0, 9_500.0) + 0.05).abs() < 1e-12);
        assert_eq!(total_return(0.0, 100.0), 0.0);
    }

    #[test]
    fn drawdown_is_positive_peak_to_trough() {
        let dd = max_drawdown(10_000.0, &[10_500.0, 10_000.0, 9_975.0, 10_800.0, 10_600.0]);
        assert!((dd - 525.0 / 10_500.0).abs() < 1e-12);
    }

    #[test]
    fn drawdown_counts_from_initial_equity() {
        let dd = max_drawdown(10_000.0, &[9_800.0, 9_900.0]);
        assert!((dd - 0.02).abs() < 1e-12);
        assert_eq!(max_drawdown(10_000.0, &[10_000.0, 10_100.0]), 0.0);
        assert_eq!(max_drawdown(10_000.0, &[]), 0.0);
    }

    // ── Trade statistics ──

    #[test]
    fn win_rate_and_averages() {
        let trades = vec![trade(200.0), trade(-100.0), trade(100.0), trade(-50.0)];
        assert!((win_rate(&trades) - 0.5).abs() < 1e-12);
        assert!((avg_win(&trades) - 150.0).abs() < 1e-12);
        assert!((avg_loss(&trades) - 75.0).abs() < 1e-12);
        assert!((profit_factor(&trades) - 2.0).abs() < 1e-12);
        // R = pnl / 100
        assert!((expectancy_r(&trades) - 0.375).abs() < 1e-12);
        assert!((avg_reward_risk(&trades) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn empty_trade_log_is_all_zero() {
        assert_eq!(win_rate(&[]), 0.0);
        assert_eq!(avg_win(&[]), 0.0);
        assert_eq!(profit_factor(&[]), 0.0);
        assert_eq!(expectancy_r(&[]), 0.0);
    }

    #[test]
    fn profit_factor_capped_when_no_losses() {
        assert_eq!(profit_factor(&[trade(10.0), trade(20.0)]), 100.0);
        assert_eq!(profit_factor(&[trade(0.0)]), 0.0);
    }

    #[test]
    fn streaks() {
        let pnls = [1.0, 1.0, -1.0, -1.0, -1.0, 1.0, -1.0];
        let trades: Vec<_> = pnls.iter().map(|&p| trade(p)).collect();
        assert_eq!(max_consecutive(&trades, true), 2);
        assert_eq!(max_consecutive(&trades, false), 3);
    }

    // ── Daily figures ──

    #[test]
    fn max_daily_loss_uses_intraday_minimum() {
        let days = vec![
            day(2, 10_000.0, 10_100.0, 9_900.0),
            day(3, 10_100.0, 9_950.0, 9_898.0),
            day(4, 9_950.0, 10_000.0, 9_950.0),
        ];
        assert!((max_daily_loss(&days) - 202.0 / 10_100.0).abs() < 1e-12);
    }

    #[test]
    fn sharpe_needs_variance() {
        assert_eq!(sharpe_ratio(&[0.01, 0.01, 0.01]), 0.0);
        assert_eq!(sharpe_ratio(&[0.01]), 0.0);
        let s = sharpe_ratio(&[0.002, 0.0005, 0.002, 0.0005]);
        assert!(s > 5.0, "consistently positive returns, got {s}");
    }

    #[test]
    fn compute_assembles_everything() {
        let trades = vec![trade(150.0), trade(-100.0)];
        let eq = curve(&[10_000.0, 10_150.0, 10_050.0]);
        let days = vec![day(2, 10_000.0, 10_050.0, 10_000.0)];
        let m = PerformanceMetrics::compute(&eq, &trades, 10_000.0, &days);
        assert_eq!(m.trade_count, 2);
        assert!((m.total_return - 0.005).abs() < 1e-12);
        assert!((m.max_drawdown - 100.0 / 10_150.0).abs() < 1e-12);
        assert!((m.profit_factor - 1.5).abs() < 1e-12);
        assert_eq!(m.max_consecutive_losses, 1);
        assert_eq!(m.sharpe, 0.0);
    }

    #[test]
    fn compute_on_empty_run() {
        let m = PerformanceMetrics::compute(&[], &[], 10_000.0, &[]);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.trade_count, 0);
    }

    // ── Breakdowns ──

    #[test]
    fn breakdown_groups_by_tier_symbol_and_reason() {
        let trades = vec![
            make_trade("EURUSD", 200.0, RiskTier::A, ExitReason::Target),
            make_trade("EURUSD", -100.0, RiskTier::A, ExitReason::Stop),
            make_trade("USDJPY", -100.0, RiskTier::B, ExitReason::Stop),
            make_trade("USDJPY", 30.0, RiskTier::B, ExitReason::DataEnd),
        ];
        let b = TradeBreakdown::compute(&trades);

        let a = &b.by_tier["A"];
        assert_eq!(a.trades, 2);
        assert!((a.expectancy_r - 0.5).abs() < 1e-12);
        assert!((a.win_rate() - 0.5).abs() < 1e-12);

        assert_eq!(b.by_symbol["USDJPY"].trades, 2);
        assert!((b.by_symbol["USDJPY"].pnl + 70.0).abs() < 1e-12);
        assert_eq!(b.by_exit_reason["stop"].trades, 2);
        assert_eq!(b.by_exit_reason["data_end"].wins, 1);
        assert!(!b.by_tier.contains_key("C"));
    }

    proptest! {
        #[test]
        fn drawdown_bounded(values in prop::collection::vec(1.0..1e6_f64, 0..200)) {
            let dd = max_drawdown(1e5, &values);
            prop_assert!((0.0..1.0).contains(&dd));
        }

        #[test]
        fn win_rate_bounded(pnls in prop::collection::vec(-500.0..500.0_f64, 1..100)) {
            let trades: Vec<_> = pnls.iter().map(|&p| trade(p)).collect();
            let w = win_rate(&trades);
            prop_assert!((0.0..=1.0).contains(&w));
            let pf = profit_factor(&trades);
            prop_assert!((0.0..=100.0).contains(&pf));
        }
    }
}
