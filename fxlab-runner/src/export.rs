//! Reporting and export: JSON, CSV and Markdown artifacts.
//!
//! A run directory holds:
//! - `result.json`: the full `BacktestResult`
//! - `manifest.json`: a small, re-loadable summary with `schema_version`
//! - `trades.csv`, `equity.csv`, `daily.csv`
//! - `report.md`
//!
//! Unknown manifest schema versions are rejected on load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fxlab_core::domain::TradeLogEntry;
use fxlab_core::engine::{DailyStats, EquityPoint};

use crate::metrics::{GroupStats, PerformanceMetrics};
use crate::runner::{BacktestResult, SCHEMA_VERSION};

const ARTIFACT_FILES: [&str; 6] = [
    "result.json",
    "manifest.json",
    "trades.csv",
    "equity.csv",
    "daily.csv",
    "report.md",
];

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Summary of one run, written next to the full result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub run_id: String,
    pub strategy: String,
    pub instruments: Vec<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub initial_equity: f64,
    pub final_equity: f64,
    pub trade_count: usize,
    pub final_risk_state: String,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub metrics: PerformanceMetrics,
    pub files: Vec<String>,
}

impl RunManifest {
    pub fn from_result(result: &BacktestResult) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            run_id: result.run_id.clone(),
            strategy: result.strategy.clone(),
            instruments: result.instruments.clone(),
            start: result.start,
            end: result.end,
            initial_equity: result.initial_equity(),
            final_equity: result.final_equity(),
            trade_count: result.run.trade_count(),
            final_risk_state: result.final_risk_state().as_str().to_string(),
            dataset_hash: result.dataset_hash.clone(),
            has_synthetic: result.has_synthetic,
            metrics: result.metrics.clone(),
            files: ARTIFACT_FILES.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Deserialize a manifest, rejecting unknown schema versions.
pub fn import_manifest(json: &str) -> Result<RunManifest> {
    let manifest: RunManifest =
        serde_json::from_str(json).context("failed to deserialize run manifest")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the trade log in close order.
pub fn export_trades_csv(trades: &[TradeLogEntry]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "direction",
        "tier",
        "entry_time",
        "entry_price",
        "stop_price",
        "target_price",
        "exit_time",
        "exit_price",
        "exit_reason",
        "lots",
        "risk_amount",
        "pnl",
        "r_multiple",
        "equity_after",
    ])?;

    for t in trades {
        wtr.write_record([
            t.symbol.as_str(),
            t.direction.as_str(),
            t.tier.as_str(),
            &t.entry_time.to_rfc3339(),
            &format!("{:.6}", t.entry_price),
            &format!("{:.6}", t.stop_price),
            &format!("{:.6}", t.target_price),
            &t.exit_time.to_rfc3339(),
            &format!("{:.6}", t.exit_price),
            t.exit_reason.as_str(),
            &format!("{:.2}", t.lots),
            &format!("{:.2}", t.risk_amount),
            &format!("{:.2}", t.pnl),
            &format!("{:.3}", t.r_multiple()),
            &format!("{:.2}", t.equity_after),
        ])?;
    }
    finish(wtr)
}

/// Export the equity curve: realized and marked equity per event timestamp.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity", "marked_equity"])?;
    for p in equity_curve {
        wtr.write_record([
            &p.timestamp.to_rfc3339(),
            &format!("{:.2}", p.equity),
            &format!("{:.2}", p.marked_equity),
        ])?;
    }
    finish(wtr)
}

pub fn export_daily_csv(daily_stats: &[DailyStats]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "start_equity",
        "end_equity",
        "min_equity",
        "realized_pnl",
        "max_loss_pct",
        "entries",
        "closes",
        "end_state",
    ])?;
    for d in daily_stats {
        wtr.write_record([
            &d.date.to_string(),
            &format!("{:.2}", d.start_equity),
            &format!("{:.2}", d.end_equity),
            &format!("{:.2}", d.min_equity),
            &format!("{:.2}", d.realized_pnl),
            &format!("{:.6}", d.max_loss_pct()),
            &d.entries.to_string(),
            &d.closes.to_string(),
            &d.end_state.to_string(),
        ])?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Directory name for a run: the first 12 hex digits of its id.
pub fn run_dir_name(result: &BacktestResult) -> String {
    format!("run_{}", result.run_id.chars().take(12).collect::<String>())
}

/// Save the full artifact set under `output_dir/run_<id>/` and return that path.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = output_dir.join(run_dir_name(result));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let manifest = serde_json::to_string_pretty(&RunManifest::from_result(result))
        .context("failed to serialize run manifest")?;
    let artifacts = [
        ("result.json", export_json(result)?),
        ("manifest.json", manifest),
        ("trades.csv", export_trades_csv(&result.run.trades)?),
        ("equity.csv", export_equity_csv(&result.run.equity_curve)?),
        ("daily.csv", export_daily_csv(&result.run.daily_stats)?),
        ("report.md", generate_report(result)),
    ];
    for (name, content) in artifacts {
        let path = run_dir.join(name);
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(run_dir)
}

/// Load the manifest from an artifact directory.
pub fn load_manifest(dir: &Path) -> Result<RunManifest> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_manifest(&json)
}

// ─── Markdown reports ───────────────────────────────────────────────

fn push_group_table(md: &mut String, title: &str, key: &str, groups: &BTreeMap<String, GroupStats>) {
    if groups.is_empty() {
        return;
    }
    md.push_str(&format!("### {title}\n\n"));
    md.push_str(&format!("| {key} | Trades | Win Rate | P&L | Expectancy (R) |\n"));
    md.push_str("| --- | ---: | ---: | ---: | ---: |\n");
    for (name, g) in groups {
        md.push_str(&format!(
            "| {name} | {} | {:.1}% | {:.2} | {:.3} |\n",
            g.trades,
            g.win_rate() * 100.0,
            g.pnl,
            g.expectancy_r
        ));
    }
    md.push('\n');
}

/// Generate a Markdown report for a single backtest run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(4096);
    let run = &result.run;

    md.push_str("# Backtest Report\n\n");

    // Metadata
    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run | {} |\n", result.run_id));
    md.push_str(&format!("| Strategy | {} |\n", result.strategy));
    md.push_str(&format!("| Instruments | {} |\n", result.instruments.join(", ")));
    if let (Some(start), Some(end)) = (result.start, result.end) {
        md.push_str(&format!(
            "| Period | {} to {} |\n",
            start.format("%Y-%m-%d %H:%M"),
            end.format("%Y-%m-%d %H:%M")
        ));
    }
    md.push_str(&format!("| Events | {} |\n", run.event_count));
    md.push_str(&format!("| Initial Equity | {:.2} |\n", run.initial_equity));
    md.push_str(&format!("| Final Equity | {:.2} |\n", run.final_equity));
    md.push_str(&format!("| Final Risk State | {} |\n", run.final_risk_state));
    md.push_str(&format!("| Dataset Hash | {} |\n", result.dataset_hash));
    if result.has_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    // Performance Summary
    let m = &result.metrics;
    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return * 100.0));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", m.max_drawdown * 100.0));
    md.push_str(&format!("| Max Daily Loss | {:.2}% |\n", m.max_daily_loss * 100.0));
    md.push_str(&format!("| Trades | {} |\n", m.trade_count));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", m.win_rate * 100.0));
    md.push_str(&format!("| Avg Win | {:.2} |\n", m.avg_win));
    md.push_str(&format!("| Avg Loss | {:.2} |\n", m.avg_loss));
    md.push_str(&format!("| Profit Factor | {:.2} |\n", m.profit_factor));
    md.push_str(&format!("| Expectancy | {:.3}R |\n", m.expectancy_r));
    md.push_str(&format!("| Avg Reward:Risk | {:.2} |\n", m.avg_reward_risk));
    md.push_str(&format!("| Max Consecutive Losses | {} |\n", m.max_consecutive_losses));
    md.push_str(&format!("| Sharpe (daily) | {:.3} |\n", m.sharpe));
    md.push('\n');

    // Breakdowns
    md.push_str("## Breakdown\n\n");
    push_group_table(&mut md, "By Tier", "Tier", &result.breakdown.by_tier);
    push_group_table(&mut md, "By Symbol", "Symbol", &result.breakdown.by_symbol);
    push_group_table(&mut md, "By Exit Reason", "Exit", &result.breakdown.by_exit_reason);

    // Signals
    let s = &run.signal_stats;
    md.push_str("## Signals\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("| --- | ---: |\n");
    md.push_str(&format!("| Raw | {} |\n", s.raw_signals));
    md.push_str(&format!("| While In Position | {} |\n", s.while_in_position));
    for (reason, count) in &s.filtered {
        md.push_str(&format!("| Filtered ({}) | {count} |\n", reason.as_str()));
    }
    md.push_str(&format!("| Tier Blocked | {} |\n", s.tier_blocked));
    for (reason, count) in &s.risk_blocked {
        md.push_str(&format!("| Risk Blocked ({}) | {count} |\n", reason.as_str()));
    }
    md.push_str(&format!("| Sizing Skips | {} |\n", s.sizing_skips));
    md.push_str(&format!("| Entries | {} |\n", s.entries));
    md.push('\n');

    // Risk events
    if !run.risk_transitions.is_empty() || !run.mode_transitions.is_empty() {
        md.push_str("## Risk Events\n\n");
        for t in &run.risk_transitions {
            md.push_str(&format!(
                "- {} {} -> {} (daily loss {:.2}%, trailing dd {:.2}%)\n",
                t.timestamp.format("%Y-%m-%d %H:%M"),
                t.from,
                t.to,
                t.daily_loss_pct * 100.0,
                t.trailing_dd_pct * 100.0
            ));
        }
        for t in &run.mode_transitions {
            md.push_str(&format!(
                "- {} mode {} -> {} ({})\n",
                t.timestamp.format("%Y-%m-%d %H:%M"),
                t.from,
                t.to,
                t.reason
            ));
        }
        md.push('\n');
    }

    // Data Quality
    if !run.data_gaps.is_empty() {
        md.push_str("## Data Quality\n\n");
        for gap in &run.data_gaps {
            md.push_str(&format!(
                "- {}: {} missing bars between {} and {}\n",
                gap.symbol, gap.missing_bars, gap.after, gap.before
            ));
        }
        md.push('\n');
    }

    md
}
