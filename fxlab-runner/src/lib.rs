//! FxLab Runner: configuration, data loading, orchestration, metrics and export.
//!
//! This crate builds on `fxlab-core` to provide:
//! - TOML run configuration with named risk profiles and instrument presets
//! - CSV candle loading and a seeded synthetic series generator
//! - Single-run orchestration with metrics and trade breakdowns
//! - JSON/CSV/Markdown artifacts per run
//! - Parallel risk-profile sweep

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod sweep;
pub mod synthetic;

pub use config::{BacktestConfig, ConfigError, InstrumentEntry, RunId};
pub use data_loader::{dataset_hash, load_candles, LoadError};
pub use export::{generate_report, load_manifest, save_artifacts, RunManifest};
pub use metrics::{PerformanceMetrics, TradeBreakdown};
pub use runner::{
    load_inputs, run_backtest_from_data, run_single_backtest, BacktestResult, LoadOptions,
    LoadedData, RunError, SCHEMA_VERSION,
};
pub use sweep::{run_profile_sweep, sweep_summary, ProfileRun};
pub use synthetic::{generate_series, SyntheticSpec};
