//! Backtesting engine: configuration, exit resolution and the event loop.
//!
//! The engine consumes validated per-instrument candle series, merges them into
//! one chronological stream and drives every bar through:
//!
//! 1. Exit check (stop/target with gap rule and intrabar policy)
//! 2. Strategy update
//! 3. Filters, risk tier, risk gate, sizer
//! 4. Mark-to-market and equity accounting

pub mod config;
pub mod exits;
pub mod loop_runner;
pub mod state;

pub use config::{ConfigurationError, EngineConfig, InstrumentSeries, IntrabarPolicy};
pub use exits::{check_exit, update_dynamic_exit, ExitFill, ExitManagement};
pub use loop_runner::{run_backtest, BacktestError};
pub use state::{DailyStats, EquityPoint, RunResult, SignalStats};
