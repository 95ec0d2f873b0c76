//! End-to-end scenarios with hand-built hourly EURUSD data.
//!
//! Each scenario pins down one behavior of the loop with prices chosen so the
//! expected trades can be worked out by hand.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use fxlab_core::components::signal::SmaCrossoverParams;
use fxlab_core::components::StrategyConfig;
use fxlab_core::domain::{Candle, Direction, ExitReason, InstrumentMeta};
use fxlab_core::engine::{run_backtest, EngineConfig, InstrumentSeries, RunResult};
use fxlab_core::risk::{BlockReason, RiskEngine, RiskLimits, RiskState};

const PIP: f64 = 0.0001;
const WICK: f64 = 0.0002;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
}

/// Appends bars whose open is the previous close, with two-pip wicks.
fn push_walk(out: &mut Vec<Candle>, closes: &[f64]) {
    for &close in closes {
        let open = out.last().map_or(close, |c| c.close);
        push_bar(out, open, open.max(close) + WICK, open.min(close) - WICK, close);
    }
}

fn push_bar(out: &mut Vec<Candle>, open: f64, high: f64, low: f64, close: f64) {
    let timestamp = t0() + Duration::hours(out.len() as i64);
    out.push(Candle::new(timestamp, open, high, low, close, 1000.0));
}

fn pad_flat(out: &mut Vec<Candle>, until: usize) {
    while out.len() < until {
        let close = out.last().map_or(1.1, |c| c.close);
        push_bar(out, close, close, close, close);
    }
}

fn run(candles: Vec<Candle>, config: &EngineConfig) -> RunResult {
    run_backtest(vec![InstrumentSeries::new("EURUSD", candles)], config).unwrap()
}

fn eurusd_config(params: SmaCrossoverParams, limits: RiskLimits) -> EngineConfig {
    let mut config = EngineConfig::new(10_000.0, limits);
    config.strategy = StrategyConfig::SmaCrossover(params);
    config.instruments.insert(InstrumentMeta::preset("EURUSD").unwrap());
    config
}

fn fast_params() -> SmaCrossoverParams {
    SmaCrossoverParams {
        fast_ma_period: 2,
        slow_ma_period: 4,
        trend_ma_period: 8,
        atr_period: 3,
        ..Default::default()
    }
}

/// Golden cross at bar 6, a long stopped through a gap at bar 7 for a loss of
/// 70 pips x 0.15 lots = 105.00, two more crosses later the same day, and two
/// more crosses on the following day (bars 24 and 29).
fn gap_loss_day() -> Vec<Candle> {
    let mut candles = Vec::new();
    push_walk(&mut candles, &[1.1000, 1.0990, 1.0980, 1.0970, 1.0960, 1.0985, 1.1020]);
    push_bar(&mut candles, 1.0950, 1.0955, 1.0935, 1.0940);
    push_walk(&mut candles, &[1.0930, 1.0920, 1.0910, 1.0935, 1.0970]);
    pad_flat(&mut candles, 24);
    push_walk(&mut candles, &[1.0960, 1.0950, 1.0940, 1.0930, 1.0955, 1.0990]);
    pad_flat(&mut candles, 40);
    candles
}

fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
}

// ── Flat market ──────────────────────────────────────────────────────

#[test]
fn flat_market_trades_nothing() {
    let mut candles = Vec::new();
    pad_flat(&mut candles, 100);
    let config = eurusd_config(SmaCrossoverParams::default(), RiskLimits::default());
    let result = run(candles, &config);

    assert!(result.trades.is_empty());
    assert!(result.entries.is_empty());
    assert_eq!(result.signal_stats.raw_signals, 0);
    assert_eq!(result.equity_curve.len(), 100);
    assert!(result
        .equity_curve
        .iter()
        .all(|p| p.equity == 10_000.0 && p.marked_equity == 10_000.0));
    assert_eq!(result.final_equity, 10_000.0);
    assert!(result.risk_transitions.is_empty());
}

// ── Golden cross to target ───────────────────────────────────────────

#[test]
fn golden_cross_runs_to_target() {
    // Slow drift down for 50 bars, a 15-pip jump at bar 50, then +10 pips/bar
    let mut closes: Vec<f64> = (0..50).map(|i| 1.1000 - 0.00002 * f64::from(i)).collect();
    closes.push(closes[49] + 0.0015);
    for _ in 51..80 {
        let last = closes[closes.len() - 1];
        closes.push(last + 0.0010);
    }
    let mut candles = Vec::new();
    push_walk(&mut candles, &closes);

    let params = SmaCrossoverParams {
        fast_ma_period: 5,
        slow_ma_period: 20,
        trend_ma_period: 50,
        atr_period: 14,
        ..Default::default()
    };
    let config = eurusd_config(params, RiskLimits::default());
    let result = run(candles.clone(), &config);

    assert_eq!(result.entries.len(), 1);
    assert_eq!(result.trades.len(), 1);
    let entry = &result.entries[0];
    assert_eq!(entry.timestamp, candles[50].timestamp);
    assert_eq!(entry.direction, Direction::Long);
    assert!((entry.entry_price - closes[50]).abs() < 1e-12);
    // 0.6% of 10,000 over a ~7.9-pip stop
    assert!((entry.lots - 0.76).abs() < 1e-9, "lots {}", entry.lots);

    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::Target);
    assert_eq!(trade.exit_time, candles[52].timestamp);
    assert!((trade.exit_price - trade.target_price).abs() < 1e-12);
    assert!((trade.target_price - trade.entry_price - 2.0 * (trade.entry_price - trade.stop_price)).abs() < 1e-9);

    let expected_pnl = trade.lots * (trade.exit_price - trade.entry_price) / PIP * 10.0;
    assert!((trade.pnl - expected_pnl).abs() < 1e-9);
    assert!(trade.pnl > 0.0);
    assert!((result.final_equity - (10_000.0 + expected_pnl)).abs() < 1e-9);
    assert_eq!(result.final_risk_state, RiskState::Trading);
}

// ── Daily cap ────────────────────────────────────────────────────────

#[test]
fn losses_at_exactly_the_daily_cap_lock_until_next_day() {
    let limits = RiskLimits {
        risk_per_trade_fraction: 0.005,
        daily_loss_cap_fraction: 0.02,
        trailing_drawdown_cap_fraction: 0.05,
        max_concurrent_positions: 1,
    };
    let mut engine = RiskEngine::new(10_000.0, limits);
    engine.on_timestamp(t0() + Duration::hours(8));

    // 50 + 70 + 80 = 200 = 2% of the day's start
    for loss in [-50.0, -70.0, -80.0] {
        assert_eq!(engine.check_entry(0.005, &[]), Ok(()));
        engine.record_close(loss);
    }
    assert_eq!(engine.state(), RiskState::DailyLocked);
    assert_eq!(engine.check_entry(0.005, &[]), Err(BlockReason::DailyLocked));

    // Still the same UTC day
    assert!(engine.on_timestamp(t0() + Duration::hours(23)).is_none());
    assert_eq!(engine.check_entry(0.005, &[]), Err(BlockReason::DailyLocked));

    let rollover = engine.on_timestamp(t0() + Duration::hours(24)).unwrap();
    assert!(rollover.unlocked);
    assert_eq!(rollover.daily_start_equity, 9_800.0);
    assert_eq!(engine.state(), RiskState::Trading);
    assert_eq!(engine.check_entry(0.005, &[]), Ok(()));
}

#[test]
fn gapped_stop_locks_the_day_in_the_loop() {
    let limits = RiskLimits {
        risk_per_trade_fraction: 0.006,
        daily_loss_cap_fraction: 0.01,
        trailing_drawdown_cap_fraction: 0.10,
        max_concurrent_positions: 1,
    };
    let candles = gap_loss_day();
    let result = run(candles.clone(), &eurusd_config(fast_params(), limits));

    let first = &result.trades[0];
    assert_eq!(first.exit_reason, ExitReason::Stop);
    assert!((first.exit_price - 1.0950).abs() < 1e-12, "gapped stop fills at the open");
    assert!((first.pnl + 105.0).abs() < 1e-6);

    let lock = result
        .risk_transitions
        .iter()
        .find(|t| t.to == RiskState::DailyLocked)
        .unwrap();
    assert_eq!(lock.timestamp, candles[7].timestamp);
    assert!(result.signal_stats.blocked_by(BlockReason::DailyLocked) >= 2);

    assert!(result
        .entries
        .iter()
        .all(|e| e.timestamp <= candles[6].timestamp || e.timestamp.date_naive() >= day(3)));
    assert!(result.entries.iter().any(|e| e.timestamp.date_naive() == day(3)));

    let unlock = result
        .risk_transitions
        .iter()
        .find(|t| t.from == RiskState::DailyLocked && t.to == RiskState::Trading)
        .unwrap();
    assert_eq!(unlock.timestamp, candles[24].timestamp);

    let locked_day = &result.daily_stats[0];
    assert_eq!(locked_day.date, day(2));
    assert_eq!(locked_day.end_state, RiskState::DailyLocked);
    assert!(locked_day.max_loss_pct() >= 0.01);
    assert_ne!(result.final_risk_state, RiskState::GlobalLocked);
}

/// Three losers on 2024-01-02: a long stopped at bar 7, a short stopped at
/// bar 12 and a long from bar 12 stopped through a gap at bar 13. Together
/// they lose 57.75 + 58.67 + 84.00, just over 2% of the day's start. Later
/// crosses at bars 14 and 18, then at bars 24 and 29 on the next day.
fn three_loss_day() -> Vec<Candle> {
    let mut candles = Vec::new();
    push_walk(&mut candles, &[1.1000, 1.0990, 1.0980, 1.0970, 1.0960, 1.0985, 1.1020]);
    push_bar(&mut candles, 1.0990, 1.0995, 1.0975, 1.0980);
    push_walk(&mut candles, &[1.0970, 1.0960, 1.0950, 1.0975, 1.1010]);
    push_bar(&mut candles, 1.0950, 1.0955, 1.0940, 1.0945);
    push_walk(&mut candles, &[1.0935, 1.0925, 1.0915, 1.0940, 1.0975]);
    pad_flat(&mut candles, 24);
    push_walk(&mut candles, &[1.0965, 1.0955, 1.0945, 1.0935, 1.0960, 1.0995]);
    pad_flat(&mut candles, 36);
    candles
}

#[test]
fn third_loss_locks_the_day_and_next_day_trades() {
    let limits = RiskLimits {
        risk_per_trade_fraction: 0.006,
        daily_loss_cap_fraction: 0.02,
        trailing_drawdown_cap_fraction: 0.10,
        max_concurrent_positions: 1,
    };
    let candles = three_loss_day();
    let result = run(candles.clone(), &eurusd_config(fast_params(), limits));

    let losers: Vec<_> = result.trades.iter().take(3).collect();
    assert_eq!(losers.len(), 3);
    assert!(losers.iter().all(|t| t.exit_reason == ExitReason::Stop && t.pnl < 0.0));
    assert!(losers.iter().all(|t| t.exit_time.date_naive() == day(2)));
    // The first two fill at their stops and stay inside the cap
    assert!((losers[0].exit_price - losers[0].stop_price).abs() < 1e-12);
    assert!((losers[1].exit_price - losers[1].stop_price).abs() < 1e-12);
    assert!((losers[2].exit_price - 1.0950).abs() < 1e-12);
    assert!(losers[2].pnl < losers[0].pnl && losers[2].pnl < losers[1].pnl);

    let lock = result
        .risk_transitions
        .iter()
        .find(|t| t.to == RiskState::DailyLocked)
        .unwrap();
    assert_eq!(lock.timestamp, candles[13].timestamp);
    assert!(lock.daily_loss_pct >= 0.02);

    // The fourth and fifth signals of the day never reach the sizer
    assert_eq!(result.signal_stats.blocked_by(BlockReason::DailyLocked), 2);
    assert_eq!(result.signal_stats.blocked_by(BlockReason::DailyWorstCase), 0);
    let day_one: Vec<_> = result
        .entries
        .iter()
        .filter(|e| e.timestamp.date_naive() == day(2))
        .collect();
    assert_eq!(day_one.len(), 3);
    assert_eq!(result.daily_stats[0].end_state, RiskState::DailyLocked);
    assert_eq!(result.daily_stats[0].entries, 3);

    // Next UTC day: unlocked and the first signal is taken
    let unlock = result
        .risk_transitions
        .iter()
        .find(|t| t.from == RiskState::DailyLocked)
        .unwrap();
    assert_eq!(unlock.to, RiskState::Trading);
    assert_eq!(unlock.timestamp, candles[24].timestamp);
    assert_eq!(result.entries[3].timestamp, candles[24].timestamp);
    assert_eq!(result.daily_stats[1].date, day(3));
    assert!(result.daily_stats[1].entries >= 1);
}

// ── Trailing cap ─────────────────────────────────────────────────────

#[test]
fn trailing_cap_is_terminal_on_the_engine() {
    let limits = RiskLimits {
        risk_per_trade_fraction: 0.005,
        daily_loss_cap_fraction: 0.03,
        trailing_drawdown_cap_fraction: 0.04,
        max_concurrent_positions: 1,
    };
    let mut engine = RiskEngine::new(10_000.0, limits);
    engine.on_timestamp(t0());
    engine.record_close(-250.0);
    assert_eq!(engine.state(), RiskState::Trading);

    engine.on_timestamp(t0() + Duration::days(1));
    let transition = engine.record_close(-150.0).unwrap();
    assert_eq!(transition.to, RiskState::GlobalLocked);
    assert_eq!(engine.state(), RiskState::GlobalLocked);

    // Recovery and new days change nothing
    engine.record_close(500.0);
    for d in 2..5 {
        engine.on_timestamp(t0() + Duration::days(d));
        assert_eq!(engine.state(), RiskState::GlobalLocked);
        assert_eq!(engine.check_entry(0.001, &[]), Err(BlockReason::GlobalLocked));
    }
}

#[test]
fn trailing_cap_stops_all_later_entries_in_the_loop() {
    let limits = RiskLimits {
        risk_per_trade_fraction: 0.006,
        daily_loss_cap_fraction: 0.05,
        trailing_drawdown_cap_fraction: 0.01,
        max_concurrent_positions: 1,
    };
    let candles = gap_loss_day();
    let result = run(candles.clone(), &eurusd_config(fast_params(), limits));

    assert_eq!(result.entries.len(), 1);
    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.final_risk_state, RiskState::GlobalLocked);
    assert_eq!(result.global_lock_time(), Some(candles[7].timestamp));
    assert!(result.signal_stats.blocked_by(BlockReason::GlobalLocked) >= 3);
    assert_eq!(result.signal_stats.blocked_by(BlockReason::DailyLocked), 0);
    assert!(result.daily_stats.iter().skip(1).all(|d| d.entries == 0));
}

// ── Intrabar ambiguity ───────────────────────────────────────────────

#[test]
fn ambiguous_bar_resolves_stop_first_by_default() {
    let mut candles = Vec::new();
    push_walk(&mut candles, &[1.1000, 1.0990, 1.0980, 1.0970, 1.0960, 1.0985, 1.1020]);
    // Spans both the ~38-pip stop and the ~75-pip target
    push_bar(&mut candles, 1.1020, 1.1150, 1.0900, 1.1000);
    pad_flat(&mut candles, 12);

    let limits = RiskLimits::default();
    let stop_first = run(candles.clone(), &eurusd_config(fast_params(), limits));
    assert_eq!(stop_first.trades[0].exit_reason, ExitReason::Stop);
    assert!(stop_first.trades[0].pnl < 0.0);

    let mut config = eurusd_config(fast_params(), limits);
    config.intrabar_policy = fxlab_core::engine::IntrabarPolicy::TargetFirst;
    let target_first = run(candles, &config);
    assert_eq!(target_first.trades[0].exit_reason, ExitReason::Target);
    assert!(target_first.trades[0].pnl > 0.0);
}
