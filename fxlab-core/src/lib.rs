//! FxLab Core: domain types, candle validation, indicators, strategies, sizing,
//! risk engine and the event loop.
//!
//! This crate contains the heart of the FX backtester:
//! - Domain types (candles, instrument pip metadata, positions, trade log, equity)
//! - Candle-series validation and k-way merge of instrument streams
//! - Streaming indicators and the closed set of strategy variants
//! - Signal tags, trade filters and risk tiers
//! - Pip-aware position sizer
//! - Risk engine with daily and trailing-drawdown locks
//! - Deterministic single-threaded event loop
//!
//! No file or network I/O happens here; loading and reporting live in `fxlab-runner`.

pub mod components;
pub mod data;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod risk;
pub mod sizers;
