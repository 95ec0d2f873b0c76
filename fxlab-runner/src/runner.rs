//! Backtest runner: wires together configuration, data loading, the engine
//! and metrics.
//!
//! Two entry points:
//! - `run_single_backtest()`: loads every configured instrument, then runs. Used by the CLI.
//! - `run_backtest_from_data()`: takes pre-loaded series. Used by the profile sweep.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use fxlab_core::engine::{run_backtest, BacktestError, EngineConfig, InstrumentSeries, RunResult};
use fxlab_core::risk::RiskState;

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::data_loader::{dataset_hash, load_candles, LoadError};
use crate::metrics::{PerformanceMetrics, TradeBreakdown};
use crate::synthetic::{generate_series, SyntheticSpec};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Load(#[from] LoadError),
    #[error(transparent)]
    Backtest(#[from] BacktestError),
    #[error("instrument '{symbol}' has no data_path (use --synthetic for generated data)")]
    MissingDataPath { symbol: String },
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Where instrument data comes from.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Relative `data_path` entries resolve against this directory.
    pub base_dir: Option<PathBuf>,
    /// Generate a series for any instrument whose file is absent.
    pub synthetic: Option<SyntheticSpec>,
}

/// Series for every configured instrument, ready for the engine.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub series: Vec<InstrumentSeries>,
    pub dataset_hash: String,
    /// Whether any instrument used generated data.
    pub has_synthetic: bool,
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub schema_version: u32,
    pub run_id: RunId,
    pub strategy: String,
    pub instruments: Vec<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub config: EngineConfig,
    pub metrics: PerformanceMetrics,
    pub breakdown: TradeBreakdown,
    pub run: RunResult,
}

impl BacktestResult {
    pub fn initial_equity(&self) -> f64 {
        self.run.initial_equity
    }

    pub fn final_equity(&self) -> f64 {
        self.run.final_equity
    }

    pub fn final_risk_state(&self) -> RiskState {
        self.run.final_risk_state
    }
}

fn resolve_path(path: &Path, base_dir: Option<&Path>) -> PathBuf {
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}

/// Load every configured instrument.
///
/// A `data_path` is read when the file exists or synthetic data is off.
/// Otherwise a synthetic series is generated and the result is tagged.
pub fn load_inputs(config: &BacktestConfig, opts: &LoadOptions) -> Result<LoadedData, RunError> {
    let mut series = Vec::with_capacity(config.instruments.len());
    let mut has_synthetic = false;

    for entry in &config.instruments {
        let meta = entry.meta()?;
        let path = entry
            .data_path
            .as_deref()
            .map(|p| resolve_path(p, opts.base_dir.as_deref()));

        let candles = match (path, &opts.synthetic) {
            (Some(path), None) => load_candles(&path)?,
            (Some(path), Some(_)) if path.exists() => load_candles(&path)?,
            (_, Some(spec)) => {
                warn!(symbol = %meta.symbol, "generating synthetic data, results will be tagged");
                has_synthetic = true;
                generate_series(&meta, spec)
            }
            (None, None) => {
                return Err(RunError::MissingDataPath { symbol: meta.symbol });
            }
        };
        info!(symbol = %meta.symbol, bars = candles.len(), "loaded series");
        series.push(InstrumentSeries::new(meta.symbol, candles));
    }

    Ok(LoadedData {
        dataset_hash: dataset_hash(&series),
        series,
        has_synthetic,
    })
}

/// Run a single backtest from a `BacktestConfig`, loading its data first.
pub fn run_single_backtest(
    config: &BacktestConfig,
    opts: &LoadOptions,
) -> Result<BacktestResult, RunError> {
    let loaded = load_inputs(config, opts)?;
    run_backtest_from_data(config, &loaded)
}

/// Run a backtest over pre-loaded series without touching the filesystem.
pub fn run_backtest_from_data(
    config: &BacktestConfig,
    loaded: &LoadedData,
) -> Result<BacktestResult, RunError> {
    let engine_config = config.to_engine_config()?;
    let run_id = config.run_id();
    info!(run_id = %run_id, profile = ?config.risk.profile, "starting backtest");

    let run = run_backtest(loaded.series.clone(), &engine_config)?;

    let metrics = PerformanceMetrics::compute(
        &run.equity_curve,
        &run.trades,
        run.initial_equity,
        &run.daily_stats,
    );
    let breakdown = TradeBreakdown::compute(&run.trades);

    let start = loaded.series.iter().filter_map(|s| s.candles.first()).map(|c| c.timestamp).min();
    let end = loaded.series.iter().filter_map(|s| s.candles.last()).map(|c| c.timestamp).max();
    let mut instruments: Vec<String> = loaded.series.iter().map(|s| s.symbol.clone()).collect();
    instruments.sort();

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        strategy: engine_config.strategy.name().to_string(),
        instruments,
        start,
        end,
        dataset_hash: loaded.dataset_hash.clone(),
        has_synthetic: loaded.has_synthetic,
        config: engine_config,
        metrics,
        breakdown,
        run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstrumentEntry;

    fn synthetic_config() -> BacktestConfig {
        let mut config = BacktestConfig::default();
        config.instruments = vec![InstrumentEntry::new("EURUSD"), InstrumentEntry::new("USDJPY")];
        config
    }

    fn synthetic_opts(bars: usize) -> LoadOptions {
        LoadOptions {
            base_dir: None,
            synthetic: Some(SyntheticSpec { bars, ..Default::default() }),
        }
    }

    #[test]
    fn missing_data_without_synthetic_fails() {
        let err = load_inputs(&synthetic_config(), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, RunError::MissingDataPath { ref symbol } if symbol == "EURUSD"));
    }

    #[test]
    fn missing_file_without_synthetic_is_load_error() {
        let mut config = synthetic_config();
        config.instruments[0].data_path = Some(PathBuf::from("no/such/file.csv"));
        let err = load_inputs(&config, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, RunError::Load(LoadError::Io { .. })));
    }

    #[test]
    fn synthetic_fallback_is_tagged() {
        let mut config = synthetic_config();
        config.instruments[0].data_path = Some(PathBuf::from("no/such/file.csv"));
        let loaded = load_inputs(&config, &synthetic_opts(100)).unwrap();
        assert!(loaded.has_synthetic);
        assert_eq!(loaded.series.len(), 2);
        assert_eq!(loaded.series[1].symbol, "USDJPY");
        assert_eq!(loaded.dataset_hash.len(), 64);
    }

    #[test]
    fn relative_paths_resolve_against_base_dir() {
        let base = Path::new("/data");
        assert_eq!(resolve_path(Path::new("eur.csv"), Some(base)), PathBuf::from("/data/eur.csv"));
        assert_eq!(resolve_path(Path::new("/abs/eur.csv"), Some(base)), PathBuf::from("/abs/eur.csv"));
        assert_eq!(resolve_path(Path::new("eur.csv"), None), PathBuf::from("eur.csv"));
    }

    #[test]
    fn single_backtest_on_synthetic_data() {
        let result = run_single_backtest(&synthetic_config(), &synthetic_opts(1_500)).unwrap();
        assert_eq!(result.schema_version, SCHEMA_VERSION);
        assert_eq!(result.instruments, vec!["EURUSD", "USDJPY"]);
        assert_eq!(result.strategy, "sma_crossover");
        assert!(result.has_synthetic);
        assert_eq!(result.metrics.trade_count, result.run.trades.len());
        assert!(result.start < result.end);
        let expected = result.initial_equity() + result.run.total_pnl();
        assert!((result.final_equity() - expected).abs() < 1e-6);
    }

    #[test]
    fn same_inputs_same_result() {
        let config = synthetic_config();
        let loaded = load_inputs(&config, &synthetic_opts(800)).unwrap();
        let a = run_backtest_from_data(&config, &loaded).unwrap();
        let b = run_backtest_from_data(&config, &loaded).unwrap();
        assert_eq!(a.run_id, b.run_id);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn engine_errors_propagate() {
        let mut config = synthetic_config();
        config.risk.risk_per_trade_fraction = Some(0.5);
        let loaded = load_inputs(&config, &synthetic_opts(50)).unwrap();
        let err = run_backtest_from_data(&config, &loaded).unwrap_err();
        assert!(matches!(err, RunError::Backtest(BacktestError::Configuration(_))));
    }
}
