//! Risk-profile sweep: the same data and strategy under each preset profile.
//!
//! Every run owns its engine state, so parallel and serial execution return
//! identical results in input order.

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use fxlab_core::risk::RiskProfile;

use crate::config::BacktestConfig;
use crate::runner::{run_backtest_from_data, BacktestResult, LoadedData, RunError};

/// One profile's run.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileRun {
    pub profile: RiskProfile,
    pub result: BacktestResult,
}

/// Run `config` once per profile over pre-loaded data.
///
/// Explicit `[risk]` overrides are dropped so each run uses the profile's own
/// limits. Results come back in `profiles` order.
pub fn run_profile_sweep(
    config: &BacktestConfig,
    loaded: &LoadedData,
    profiles: &[RiskProfile],
    parallel: bool,
) -> Result<Vec<ProfileRun>, RunError> {
    info!(profiles = profiles.len(), parallel, "starting profile sweep");

    let run_one = |&profile: &RiskProfile| -> Result<ProfileRun, RunError> {
        let mut cfg = config.clone();
        cfg.risk = cfg.risk.with_profile(profile);
        let result = run_backtest_from_data(&cfg, loaded)?;
        Ok(ProfileRun { profile, result })
    };

    if parallel {
        profiles.par_iter().map(run_one).collect()
    } else {
        profiles.iter().map(run_one).collect()
    }
}

/// Markdown comparison table of a sweep.
pub fn sweep_summary(runs: &[ProfileRun]) -> String {
    let mut md = String::with_capacity(1024);
    md.push_str("| Profile | Trades | Return | Max DD | Max Daily Loss | Win Rate | Expectancy | Final State |\n");
    md.push_str("| --- | ---: | ---: | ---: | ---: | ---: | ---: | --- |\n");
    for run in runs {
        let m = &run.result.metrics;
        md.push_str(&format!(
            "| {} | {} | {:.2}% | {:.2}% | {:.2}% | {:.1}% | {:.3}R | {} |\n",
            run.profile,
            m.trade_count,
            m.total_return * 100.0,
            m.max_drawdown * 100.0,
            m.max_daily_loss * 100.0,
            m.win_rate * 100.0,
            m.expectancy_r,
            run.result.final_risk_state(),
        ));
    }
    md
}
