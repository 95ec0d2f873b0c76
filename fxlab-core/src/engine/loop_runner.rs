//! Event loop: replays the merged candle stream through strategy, filters,
//! tiers, risk gate and sizer.
//!
//! Per event, in order:
//! 1. Roll the UTC day (resets daily equity, lifts a daily lock)
//! 2. Stop/target check for an open position on this instrument
//! 3. Advance the instrument's strategy by one bar
//! 4. Close-of-bar exit management (opposite signal, break-even, trail)
//! 5. Entry pipeline for a non-flat signal on a flat instrument
//! 6. Data-end close when this is the instrument's final bar
//! 7. Mark-to-market and equity curve update
//!
//! An instrument whose series ends early frees its position slot at its own
//! last close, not at the end of the merged stream.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use super::config::{ConfigurationError, EngineConfig, InstrumentSeries};
use super::exits::{check_exit, update_dynamic_exit};
use super::state::{DailyStats, EquityPoint, RunResult, SignalStats};
use crate::components::{Indicator, Signal, SignalGenerator, Strategy};
use crate::data::{validate_series, DataIntegrityError, MergedEvents};
use crate::domain::{
    Candle, EntryLogEntry, ExitReason, InstrumentMeta, Position, TradeLogEntry,
};
use crate::indicators::Atr;
use crate::risk::{ModeController, RiskEngine};
use crate::sizers::size_breakdown;

/// Fatal errors: the run aborts before or instead of producing a result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("no instrument series supplied")]
    EmptyInput,

    #[error(transparent)]
    DataIntegrity(#[from] DataIntegrityError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Per-instrument state the loop advances.
struct Lane {
    symbol: String,
    meta: InstrumentMeta,
    strategy: Strategy,
    /// Trail distance source; only tracked when exit management is on.
    atr: Option<Atr>,
    last_close: Option<f64>,
}

/// Run a backtest over one or more instruments.
///
/// Validates the configuration, then every series, then replays the merged
/// stream. Series are processed in symbol order, which fixes the tie-break for
/// same-timestamp bars.
pub fn run_backtest(
    mut inputs: Vec<InstrumentSeries>,
    config: &EngineConfig,
) -> Result<RunResult, BacktestError> {
    config.validate()?;
    if inputs.is_empty() {
        return Err(BacktestError::EmptyInput);
    }

    inputs.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    if let Some(pair) = inputs.windows(2).find(|w| w[0].symbol == w[1].symbol) {
        return Err(ConfigurationError::DuplicateInstrument {
            symbol: pair[0].symbol.clone(),
        }
        .into());
    }

    let mut lanes = Vec::with_capacity(inputs.len());
    for series in &inputs {
        let meta = config.instruments.get(&series.symbol).ok_or_else(|| {
            ConfigurationError::UnknownInstrument {
                symbol: series.symbol.clone(),
            }
        })?;
        lanes.push(Lane {
            symbol: series.symbol.clone(),
            meta: meta.clone(),
            strategy: config.strategy.build(meta),
            atr: config.exits.dynamic.then(|| Atr::new(config.exits.atr_period)),
            last_close: None,
        });
    }

    let mut data_gaps = Vec::new();
    let mut bar_counts = BTreeMap::new();
    for series in &inputs {
        let report = validate_series(
            &series.symbol,
            &series.candles,
            config.interval(),
            config.gap_policy,
        )?;
        bar_counts.insert(report.symbol, report.bars);
        data_gaps.extend(report.gaps);
    }

    let events = MergedEvents::new(inputs.iter().map(|s| s.candles.as_slice()).collect());
    let event_count = events.total_events();
    info!(
        instruments = inputs.len(),
        events = event_count,
        strategy = config.strategy.name(),
        initial_equity = config.initial_equity,
        "backtest started"
    );

    let mut bt = Backtest::new(config);
    for event in events {
        let series = &inputs[event.symbol_index];
        let candle = &series.candles[event.candle_index];
        let window = &series.candles[..=event.candle_index];
        let final_bar = event.candle_index + 1 == series.candles.len();

        bt.roll_day(event.timestamp);
        {
            let lane = &mut lanes[event.symbol_index];
            let atr = lane.atr.as_mut().map_or(f64::NAN, |atr| atr.update(candle));
            bt.check_exit(lane, candle);
            let signal = lane.strategy.on_bar(event.timestamp, window);
            bt.manage_exit(lane, candle, signal.as_ref(), atr);
            bt.step_mode(event.timestamp);
            if let Some(signal) = signal {
                bt.try_enter(lane, signal);
            }
            lane.last_close = Some(candle.close);
            if final_bar {
                bt.close_at_data_end(lane, candle);
            }
        }
        bt.mark(event.timestamp, &lanes);
    }

    Ok(bt.finish(data_gaps, bar_counts, event_count))
}

/// Mutable run state. Owns the risk engine and the open positions so every
/// close books equity and re-evaluates risk in one step.
struct Backtest<'c> {
    config: &'c EngineConfig,
    risk: RiskEngine,
    mode: Option<ModeController>,
    open: Vec<Position>,
    trades: Vec<TradeLogEntry>,
    entries: Vec<EntryLogEntry>,
    equity_curve: Vec<EquityPoint>,
    day: Option<DailyStats>,
    daily_stats: Vec<DailyStats>,
    stats: SignalStats,
}

impl<'c> Backtest<'c> {
    fn new(config: &'c EngineConfig) -> Self {
        Self {
            config,
            risk: RiskEngine::new(config.initial_equity, config.limits),
            mode: config
                .adaptive_mode
                .then(|| ModeController::new(config.initial_mode)),
            open: Vec::with_capacity(config.limits.max_concurrent_positions),
            trades: Vec::new(),
            entries: Vec::new(),
            equity_curve: Vec::new(),
            day: None,
            daily_stats: Vec::new(),
            stats: SignalStats::default(),
        }
    }

    // ── Day boundary ──

    fn roll_day(&mut self, timestamp: DateTime<Utc>) {
        let state_before = self.risk.state();
        match self.risk.on_timestamp(timestamp) {
            Some(rollover) => {
                if let Some(mut done) = self.day.take() {
                    done.end_state = state_before;
                    self.daily_stats.push(done);
                }
                if rollover.unlocked {
                    info!(day = %rollover.day, equity = rollover.daily_start_equity, "daily lock lifted");
                }
                self.day = Some(DailyStats::open(rollover.day, rollover.daily_start_equity));
            }
            None if self.day.is_none() => {
                self.day = Some(DailyStats::open(timestamp.date_naive(), self.risk.current_equity()));
            }
            None => {}
        }
    }

    // ── Exits ──

    fn open_index(&self, symbol: &str) -> Option<usize> {
        self.open.iter().position(|p| p.symbol == symbol)
    }

    fn check_exit(&mut self, lane: &Lane, candle: &Candle) {
        let Some(index) = self.open_index(&lane.symbol) else {
            return;
        };
        if let Some(fill) = check_exit(&self.open[index], candle, self.config.intrabar_policy) {
            self.close(index, &lane.meta, candle.timestamp, fill.price, fill.reason);
        }
    }

    /// Exits decided at the bar close, after the strategy has seen the bar.
    fn manage_exit(&mut self, lane: &Lane, candle: &Candle, signal: Option<&Signal>, atr: f64) {
        let Some(index) = self.open_index(&lane.symbol) else {
            return;
        };
        let rules = self.config.exits;
        let reversed = signal
            .and_then(|s| s.direction.position_side())
            .is_some_and(|side| side != self.open[index].direction);
        if rules.opposite_signal && reversed {
            self.close(index, &lane.meta, candle.timestamp, candle.close, ExitReason::OppositeSignal);
            return;
        }
        if let Some(fill) = update_dynamic_exit(&mut self.open[index], candle.close, atr, &rules) {
            self.close(index, &lane.meta, candle.timestamp, fill.price, fill.reason);
        }
    }

    fn close_at_data_end(&mut self, lane: &Lane, candle: &Candle) {
        if let Some(index) = self.open_index(&lane.symbol) {
            self.close(index, &lane.meta, candle.timestamp, candle.close, ExitReason::DataEnd);
        }
    }

    fn close(
        &mut self,
        index: usize,
        meta: &InstrumentMeta,
        timestamp: DateTime<Utc>,
        price: f64,
        reason: ExitReason,
    ) {
        let position = self.open.remove(index);
        let pnl = meta.pnl(position.direction, position.entry_price, price, position.lots);
        self.risk.record_close(pnl);
        let equity = self.risk.current_equity();

        if let Some(day) = self.day.as_mut() {
            day.record_close(pnl, equity);
        }
        if let Some(mode) = self.mode.as_mut() {
            mode.record_trade(timestamp, pnl, equity, self.risk.equity().high_water_mark);
        }
        debug!(
            symbol = %position.symbol,
            direction = %position.direction,
            reason = reason.as_str(),
            price,
            pnl,
            equity,
            "position closed"
        );
        self.trades.push(TradeLogEntry::from_close(&position, timestamp, price, reason, pnl, equity));
    }

    fn step_mode(&mut self, timestamp: DateTime<Utc>) {
        if let Some(mode) = self.mode.as_mut() {
            mode.on_drawdown(timestamp, self.risk.trailing_dd_pct());
        }
    }

    // ── Entries ──

    fn try_enter(&mut self, lane: &Lane, signal: Signal) {
        let Some(direction) = signal.direction.position_side() else {
            return;
        };
        if self.open_index(&lane.symbol).is_some() {
            self.stats.while_in_position += 1;
            return;
        }
        self.stats.raw_signals += 1;

        if let Err(reason) = self.config.filters.evaluate(&signal.tags) {
            *self.stats.filtered.entry(reason).or_default() += 1;
            debug!(symbol = %lane.symbol, filter = reason.as_str(), "signal filtered");
            return;
        }

        let decision = self.config.tiers.resolve(signal.tier, &signal.tags);
        if decision.is_blocked() {
            self.stats.tier_blocked += 1;
            debug!(symbol = %lane.symbol, tier = %decision.tier, "signal blocked by tier");
            return;
        }

        let base_fraction = match &self.mode {
            Some(mode) => mode.risk_fraction(),
            None => self.config.limits.risk_per_trade_fraction,
        };
        // Tier scaling never lifts risk above the configured ceiling.
        let risk_fraction = (base_fraction * decision.scale).min(self.config.max_risk_fraction);
        if let Err(reason) = self.risk.check_entry(risk_fraction, &self.open) {
            *self.stats.risk_blocked.entry(reason).or_default() += 1;
            debug!(symbol = %lane.symbol, reason = reason.as_str(), state = %self.risk.state(), "entry blocked");
            return;
        }

        let sized = size_breakdown(
            self.risk.current_equity(),
            risk_fraction,
            signal.stop_distance,
            &lane.meta,
        );
        if !sized.is_tradable() {
            self.stats.sizing_skips += 1;
            debug!(symbol = %lane.symbol, raw_lots = sized.raw_lots, "skipped, size too small");
            return;
        }

        let risk_amount = lane.meta.money_at_risk(signal.stop_distance, sized.lots);
        let position = Position::open(
            lane.symbol.clone(),
            direction,
            signal.timestamp,
            signal.entry_price,
            signal.stop_distance,
            signal.target_distance,
            sized.lots,
            risk_amount,
            decision.tier,
            risk_fraction,
        );
        debug!(
            symbol = %lane.symbol,
            direction = %direction,
            entry = position.entry_price,
            stop = position.stop_price,
            target = position.target_price,
            lots = position.lots,
            risk_amount,
            "position opened"
        );
        self.entries.push(EntryLogEntry::from_position(&position, signal.reason));
        if let Some(day) = self.day.as_mut() {
            day.entries += 1;
        }
        self.stats.entries += 1;
        self.open.push(position);
    }

    // ── Equity curve ──

    fn mark(&mut self, timestamp: DateTime<Utc>, lanes: &[Lane]) {
        let realized = self.risk.current_equity();
        let unrealized: f64 = self
            .open
            .iter()
            .filter_map(|p| {
                let lane = lanes.iter().find(|l| l.symbol == p.symbol)?;
                let close = lane.last_close?;
                Some(lane.meta.pnl(p.direction, p.entry_price, close, p.lots))
            })
            .sum();
        let point = EquityPoint {
            timestamp,
            equity: realized,
            marked_equity: realized + unrealized,
        };
        match self.equity_curve.last_mut() {
            Some(last) if last.timestamp == timestamp => *last = point,
            _ => self.equity_curve.push(point),
        }
    }

    fn finish(
        mut self,
        data_gaps: Vec<crate::data::DataGap>,
        bar_counts: BTreeMap<String, usize>,
        event_count: usize,
    ) -> RunResult {
        let final_risk_state = self.risk.state();
        if let Some(mut day) = self.day.take() {
            day.end_state = final_risk_state;
            self.daily_stats.push(day);
        }
        let final_equity = self.risk.current_equity();
        info!(
            trades = self.trades.len(),
            final_equity,
            state = %final_risk_state,
            "backtest finished"
        );

        RunResult {
            initial_equity: self.config.initial_equity,
            final_equity,
            trades: self.trades,
            entries: self.entries,
            equity_curve: self.equity_curve,
            daily_stats: self.daily_stats,
            signal_stats: self.stats,
            risk_transitions: self.risk.into_transitions(),
            mode_transitions: self.mode.map(ModeController::into_transitions).unwrap_or_default(),
            data_gaps,
            bar_counts,
            event_count,
            final_risk_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::signal::SmaCrossoverParams;
    use crate::components::StrategyConfig;
    use crate::data::GapPolicy;
    use crate::engine::ExitManagement;
    use crate::domain::{Direction, InstrumentMeta};
    use crate::indicators::make_candles;
    use crate::risk::RiskState;
    use chrono::Duration;

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.strategy = StrategyConfig::SmaCrossover(SmaCrossoverParams {
            fast_ma_period: 2,
            slow_ma_period: 4,
            trend_ma_period: 8,
            atr_period: 3,
            ..Default::default()
        });
        config.instruments.insert(InstrumentMeta::new("EURUSD", 0.0001, 10.0));
        config.instruments.insert(InstrumentMeta::new("GBPUSD", 0.0001, 10.0));
        config
    }

    /// Hourly FX candles with two-pip wicks around open/close.
    fn prices(closes: &[f64]) -> Vec<Candle> {
        make_candles(closes)
            .into_iter()
            .map(|mut c| {
                c.high = c.open.max(c.close) + 0.0002;
                c.low = c.open.min(c.close) - 0.0002;
                c
            })
            .collect()
    }

    #[test]
    fn empty_input_is_fatal() {
        assert_eq!(run_backtest(vec![], &config()).unwrap_err(), BacktestError::EmptyInput);
    }

    #[test]
    fn empty_series_names_instrument() {
        let err = run_backtest(vec![InstrumentSeries::new("EURUSD", vec![])], &config()).unwrap_err();
        match err {
            BacktestError::DataIntegrity(e) => assert_eq!(e.symbol(), "EURUSD"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unknown_and_duplicate_instruments_are_fatal() {
        let candles = prices(&[1.1; 5]);
        let err = run_backtest(vec![InstrumentSeries::new("AUDCAD", candles.clone())], &config())
            .unwrap_err();
        assert!(matches!(
            err,
            BacktestError::Configuration(ConfigurationError::UnknownInstrument { .. })
        ));

        let err = run_backtest(
            vec![
                InstrumentSeries::new("EURUSD", candles.clone()),
                InstrumentSeries::new("EURUSD", candles),
            ],
            &config(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BacktestError::Configuration(ConfigurationError::DuplicateInstrument { .. })
        ));
    }

    #[test]
    fn misconfigured_cap_aborts_before_loop() {
        let mut c = config();
        c.limits.daily_loss_cap_fraction = 0.0;
        let err = run_backtest(vec![InstrumentSeries::new("EURUSD", prices(&[1.1; 5]))], &c)
            .unwrap_err();
        assert!(matches!(err, BacktestError::Configuration(_)));
    }

    #[test]
    fn gap_rejected_or_flagged() {
        let mut candles = prices(&[1.1; 6]);
        for c in candles.iter_mut().skip(3) {
            c.timestamp = c.timestamp + Duration::hours(2);
        }
        let series = || vec![InstrumentSeries::new("EURUSD", candles.clone())];

        let err = run_backtest(series(), &config()).unwrap_err();
        assert!(matches!(
            err,
            BacktestError::DataIntegrity(DataIntegrityError::Gap { missing_bars: 2, .. })
        ));

        let flagged = EngineConfig { gap_policy: GapPolicy::Flag, ..config() };
        let result = run_backtest(series(), &flagged).unwrap();
        assert_eq!(result.data_gaps.len(), 1);
        assert_eq!(result.bar_counts["EURUSD"], 6);
    }

    #[test]
    fn flat_series_produces_no_trades() {
        let result =
            run_backtest(vec![InstrumentSeries::new("EURUSD", prices(&[1.1; 40]))], &config())
                .unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.final_equity, 10_000.0);
        assert_eq!(result.equity_curve.len(), 40);
        assert!(result.equity_curve.iter().all(|p| p.equity == 10_000.0));
        assert_eq!(result.final_risk_state, RiskState::Trading);
    }

    #[test]
    fn open_position_is_closed_at_data_end() {
        // Golden cross at bar 6, then drift that hits neither stop nor target
        let mut closes = vec![1.1000, 1.0990, 1.0980, 1.0970, 1.0960, 1.0985, 1.1020];
        closes.extend(std::iter::repeat(1.1021).take(3));
        let result =
            run_backtest(vec![InstrumentSeries::new("EURUSD", prices(&closes))], &config())
                .unwrap();
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.direction, Direction::Long);
        assert_eq!(trade.exit_reason, ExitReason::DataEnd);
        assert!((trade.exit_price - 1.1021).abs() < 1e-12);
        let last = result.equity_curve.last().unwrap();
        assert_eq!(last.equity, result.final_equity);
        assert_eq!(last.marked_equity, result.final_equity);
    }

    #[test]
    fn same_timestamp_events_share_one_curve_point() {
        let result = run_backtest(
            vec![
                InstrumentSeries::new("GBPUSD", prices(&[1.25; 10])),
                InstrumentSeries::new("EURUSD", prices(&[1.1; 10])),
            ],
            &config(),
        )
        .unwrap();
        assert_eq!(result.event_count, 20);
        assert_eq!(result.equity_curve.len(), 10);
        assert_eq!(result.bar_counts.len(), 2);
    }

    /// EURUSD golden cross at bar 6, ten bars in total.
    fn eurusd_cross() -> Vec<f64> {
        let mut closes = vec![1.1000, 1.0990, 1.0980, 1.0970, 1.0960, 1.0985, 1.1020];
        closes.extend(std::iter::repeat(1.1021).take(3));
        closes
    }

    #[test]
    fn shorter_series_frees_its_slot_at_its_own_end() {
        // GBPUSD: steady decline, golden cross at bar 18, then a slow grind up
        let mut gbp: Vec<f64> = (0..17).map(|i| 1.2700 - 0.0010 * i as f64).collect();
        gbp.extend([1.2565, 1.2600]);
        gbp.extend((1..=11).map(|i| 1.2600 + 0.0001 * i as f64));
        assert_eq!(gbp.len(), 30);

        let result = run_backtest(
            vec![
                InstrumentSeries::new("EURUSD", prices(&eurusd_cross())),
                InstrumentSeries::new("GBPUSD", prices(&gbp)),
            ],
            &config(),
        )
        .unwrap();

        assert_eq!(result.signal_stats.blocked_by(crate::risk::BlockReason::MaxPositions), 0);
        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.entries[1].symbol, "GBPUSD");
        assert_eq!(result.entries[1].timestamp, result.equity_curve[18].timestamp);

        let eur = &result.trades[0];
        assert_eq!(eur.symbol, "EURUSD");
        assert_eq!(eur.exit_reason, ExitReason::DataEnd);
        assert_eq!(eur.exit_time, result.equity_curve[9].timestamp);
        assert_eq!(result.trades[1].symbol, "GBPUSD");
        assert_eq!(result.trades[1].exit_reason, ExitReason::DataEnd);
    }

    #[test]
    fn opposite_signal_closes_and_reverses() {
        // Golden cross at bar 6, death cross at bar 9
        let closes = [
            1.1000, 1.0990, 1.0980, 1.0970, 1.0960, 1.0985, 1.1020, 1.1030, 1.1040, 1.1005, 1.1000,
        ];
        let series = || vec![InstrumentSeries::new("EURUSD", prices(&closes))];

        let held = run_backtest(series(), &config()).unwrap();
        assert_eq!(held.trades.len(), 1);
        assert_eq!(held.trades[0].exit_reason, ExitReason::DataEnd);
        assert_eq!(held.signal_stats.while_in_position, 1);

        let mut c = config();
        c.exits.opposite_signal = true;
        let result = run_backtest(series(), &c).unwrap();
        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.entries[1].direction, Direction::Short);
        let first = &result.trades[0];
        assert_eq!(first.exit_reason, ExitReason::OppositeSignal);
        assert!((first.exit_price - 1.1005).abs() < 1e-12);
        assert_eq!(first.exit_time, result.entries[1].timestamp);
        assert_eq!(result.trades[1].exit_reason, ExitReason::DataEnd);
    }

    #[test]
    fn extended_target_books_at_the_close() {
        // Same cross, then a rally that never reaches the 3-ATR target
        let mut closes = eurusd_cross()[..7].to_vec();
        closes.extend([1.1030, 1.1045, 1.1060, 1.1062]);
        let mut c = config();
        c.exits = ExitManagement {
            dynamic: true,
            breakeven_trigger_r_multiple: 0.5,
            trailing_atr_multiple: 1.0,
            extended_tp_r_multiple: 1.0,
            atr_period: 3,
            opposite_signal: false,
        };
        let result = run_backtest(vec![InstrumentSeries::new("EURUSD", prices(&closes))], &c).unwrap();
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::ExtendedTarget);
        assert!(trade.exit_price > trade.entry_price);
        assert!(trade.exit_price < trade.target_price);
        assert!(trade.pnl > 0.0);
    }

    #[test]
    fn tier_scale_is_capped_by_max_risk() {
        let mut c = config();
        c.limits.risk_per_trade_fraction = 0.04;
        c.limits.daily_loss_cap_fraction = 0.1;
        c.limits.trailing_drawdown_cap_fraction = 0.2;
        c.max_risk_fraction = 0.05;
        c.tiers.enabled = true;
        c.tiers.rules = vec![crate::components::TierRule {
            session: None,
            trend: None,
            volatility: None,
            tier: crate::domain::RiskTier::A,
        }];
        let result =
            run_backtest(vec![InstrumentSeries::new("EURUSD", prices(&eurusd_cross()))], &c).unwrap();
        assert_eq!(result.entries.len(), 1);
        let entry = &result.entries[0];
        assert_eq!(entry.tier, crate::domain::RiskTier::A);
        assert!(entry.risk_fraction <= c.max_risk_fraction);
        assert!((entry.risk_fraction - 0.05).abs() < 1e-12);
    }
}
