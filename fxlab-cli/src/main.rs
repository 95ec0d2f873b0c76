//! FxLab CLI: run, sweep and data-check commands.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML config file and save its artifacts
//! - `sweep`: run the same config under each risk profile and compare
//! - `check-data`: validate every configured candle file without trading

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Duration;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fxlab_core::data::validate_series;
use fxlab_core::risk::RiskProfile;
use fxlab_runner::{
    load_inputs, run_backtest_from_data, run_profile_sweep, save_artifacts, sweep_summary,
    BacktestConfig, BacktestResult, LoadOptions, SyntheticSpec,
};

#[derive(Parser)]
#[command(name = "fxlab", about = "FxLab CLI: hourly FX backtester with prop-firm risk limits")]
struct Cli {
    /// Debug logging (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the candles come from.
#[derive(Args)]
struct DataArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    config: PathBuf,

    /// Generate synthetic series for instruments whose data file is missing.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Hourly bars per synthetic series.
    #[arg(long, default_value_t = 24 * 90)]
    bars: usize,

    /// Seed for synthetic series.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

impl DataArgs {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            base_dir: self.config.parent().map(Path::to_path_buf),
            synthetic: self.synthetic.then(|| SyntheticSpec {
                bars: self.bars,
                seed: self.seed,
                ..Default::default()
            }),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Override the config's risk profile (drops explicit risk overrides).
        #[arg(long)]
        profile: Option<String>,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the summary only.
        #[arg(long, default_value_t = false, conflicts_with = "output_dir")]
        no_save: bool,
    },
    /// Run the config once per risk profile over the same data.
    Sweep {
        #[command(flatten)]
        data: DataArgs,

        /// Comma-separated profile names. Defaults to every profile.
        #[arg(long, value_delimiter = ',')]
        profiles: Vec<String>,

        /// Run profiles one after another instead of in parallel.
        #[arg(long, default_value_t = false)]
        serial: bool,

        /// Save each profile's artifacts under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Validate the configured candle files.
    CheckData {
        #[command(flatten)]
        data: DataArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            data,
            profile,
            output_dir,
            no_save,
        } => run_cmd(&data, profile.as_deref(), &output_dir, no_save),
        Commands::Sweep {
            data,
            profiles,
            serial,
            output_dir,
        } => sweep_cmd(&data, &profiles, serial, output_dir.as_deref()),
        Commands::CheckData { data } => check_data_cmd(&data),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .init();
}

fn parse_profile(name: &str) -> Result<RiskProfile> {
    match RiskProfile::from_name(name) {
        Some(p) => Ok(p),
        None => bail!(
            "unknown profile '{name}'. Valid: {}",
            RiskProfile::ALL.map(|p| p.as_str()).join(", ")
        ),
    }
}

fn run_cmd(data: &DataArgs, profile: Option<&str>, output_dir: &Path, no_save: bool) -> Result<()> {
    let mut config = BacktestConfig::from_file(&data.config)?;
    if let Some(name) = profile {
        config.risk = config.risk.with_profile(parse_profile(name)?);
    }

    let loaded = load_inputs(&config, &data.load_options())?;
    let result = run_backtest_from_data(&config, &loaded)?;
    print_summary(&result);

    if !no_save {
        let run_dir = save_artifacts(&result, output_dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn sweep_cmd(
    data: &DataArgs,
    profile_names: &[String],
    serial: bool,
    output_dir: Option<&Path>,
) -> Result<()> {
    let profiles = if profile_names.is_empty() {
        RiskProfile::ALL.to_vec()
    } else {
        profile_names.iter().map(|n| parse_profile(n)).collect::<Result<Vec<_>>>()?
    };

    let config = BacktestConfig::from_file(&data.config)?;
    let loaded = load_inputs(&config, &data.load_options())?;
    let runs = run_profile_sweep(&config, &loaded, &profiles, !serial)?;

    println!();
    println!("=== Risk Profile Sweep ===");
    println!("{}", sweep_summary(&runs));
    if loaded.has_synthetic {
        println!("WARNING: Results based on SYNTHETIC data");
    }

    if let Some(dir) = output_dir {
        for run in &runs {
            let run_dir = save_artifacts(&run.result, dir)
                .with_context(|| format!("saving artifacts for profile {}", run.profile))?;
            info!(profile = %run.profile, dir = %run_dir.display(), "artifacts saved");
        }
        println!("Artifacts saved under: {}", dir.display());
    }
    Ok(())
}

fn check_data_cmd(data: &DataArgs) -> Result<()> {
    let config = BacktestConfig::from_file(&data.config)?;
    let interval = Duration::minutes(i64::from(config.data.interval_minutes));
    let loaded = load_inputs(&config, &data.load_options())?;

    let mut failures = 0;
    for series in &loaded.series {
        match validate_series(&series.symbol, &series.candles, interval, config.data.gap_policy) {
            Ok(report) => {
                println!(
                    "{:<8} OK    {:>7} bars  {} .. {}  gaps: {}",
                    report.symbol,
                    report.bars,
                    report.first.format("%Y-%m-%d %H:%M"),
                    report.last.format("%Y-%m-%d %H:%M"),
                    report.gaps.len()
                );
                for gap in &report.gaps {
                    println!("           gap of {} bar(s) after {}", gap.missing_bars, gap.after);
                }
            }
            Err(e) => {
                failures += 1;
                println!("{:<8} FAIL  {e}", series.symbol);
            }
        }
    }
    println!("Dataset hash: {}", loaded.dataset_hash);

    if failures > 0 {
        bail!("{failures} instrument(s) failed validation");
    }
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    let run = &result.run;
    println!();
    println!("=== Backtest Result ===");
    println!("Run:            {}", result.run_id);
    println!("Strategy:       {}", result.strategy);
    println!("Instruments:    {}", result.instruments.join(", "));
    if let (Some(start), Some(end)) = (result.start, result.end) {
        println!(
            "Period:         {} to {}",
            start.format("%Y-%m-%d %H:%M"),
            end.format("%Y-%m-%d %H:%M")
        );
    }
    println!("Events:         {}", run.event_count);
    println!("Signals:        {}", run.signal_stats.raw_signals);
    println!("Trades:         {}", m.trade_count);
    println!();
    println!("--- Performance ---");
    println!("Final Equity:   {:.2}", run.final_equity);
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Max Daily Loss: {:.2}%", m.max_daily_loss * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Expectancy:     {:.3}R", m.expectancy_r);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Max Consec Loss:{}", m.max_consecutive_losses);
    println!();
    println!("--- Risk ---");
    println!("Final State:    {}", run.final_risk_state);
    println!("Risk Blocks:    {}", run.signal_stats.total_risk_blocked());
    println!("Sizing Skips:   {}", run.signal_stats.sizing_skips);
    for t in &run.risk_transitions {
        println!(
            "  {} {} -> {}",
            t.timestamp.format("%Y-%m-%d %H:%M"),
            t.from,
            t.to
        );
    }
    if result.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    if !run.data_gaps.is_empty() {
        println!("WARNING: {} data gap(s) flagged", run.data_gaps.len());
    }
}
