//! Offline RTP estimate.
//!
//! Each trial draws one grid and pays its clusters once plus the three-scatter
//! luck bonus. Cascades, rainbow/clover/pot effects, free spins and persistent
//! gold are not modelled, so the figure is a calibration aid and sits below
//! what the full engine returns. Use [`crate::Session`] replays for exact
//! figures.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    cluster::find_clusters,
    config::EngineConfig,
    engine::{compute_grid, validate_bet},
    error::{EngineError, EngineResult},
    seed::{validate_client_seed, validate_server_seed},
    symbols::Symbol,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub server_seed: String,
    pub client_seed: String,
    pub trials: u64,
    pub target_rtp: f64,
    pub bet: f64,
}

/// One simulated grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub trial: u64,
    pub clusters: usize,
    pub cluster_win: f64,
    pub scatter_count: usize,
    pub luck_win: f64,
    pub win: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub trials: u64,
    pub total_bet: f64,
    pub total_win: f64,
    pub winning_trials: u64,
    pub empirical_rtp: f64,
    pub hit_rate_percent: f64,
}

pub fn simulate_rtp(config: &EngineConfig, params: &SimulationParams) -> EngineResult<SimulationReport> {
    simulate_rtp_with(config, params, |_| {})
}

/// Like [`simulate_rtp`], handing every trial to `on_trial` in order.
pub fn simulate_rtp_with<F>(
    config: &EngineConfig,
    params: &SimulationParams,
    mut on_trial: F,
) -> EngineResult<SimulationReport>
where
    F: FnMut(&TrialOutcome),
{
    validate_server_seed(&params.server_seed)?;
    validate_client_seed(&params.client_seed)?;
    validate_bet(params.bet)?;
    if params.trials == 0 {
        return Err(EngineError::Configuration("trials must be positive".into()));
    }

    let config = config.clone().with_target_rtp(params.target_rtp);
    let mut report = SimulationReport {
        trials: params.trials,
        ..SimulationReport::default()
    };
    for trial in 0..params.trials {
        let outcome = run_trial(&config, &params.server_seed, &params.client_seed, trial, params.bet);
        report.total_bet += params.bet;
        report.total_win += outcome.win;
        if outcome.win > 0.0 {
            report.winning_trials += 1;
        }
        on_trial(&outcome);
    }
    report.empirical_rtp = report.total_win / report.total_bet * 100.0;
    report.hit_rate_percent = report.winning_trials as f64 / report.trials as f64 * 100.0;

    info!(
        trials = report.trials,
        target_rtp = params.target_rtp,
        empirical_rtp = report.empirical_rtp,
        hit_rate = report.hit_rate_percent,
        "rtp simulation finished"
    );
    Ok(report)
}

/// Single-pass evaluation of the grid at `trial`.
pub fn run_trial(
    config: &EngineConfig,
    server_seed: &str,
    client_seed: &str,
    trial: u64,
    bet: f64,
) -> TrialOutcome {
    let (grid, mut rng) = compute_grid(server_seed, client_seed, trial, config);
    let clusters = find_clusters(&grid, config.min_cluster);
    let cluster_win: f64 = clusters
        .iter()
        .map(|c| c.size() as f64 * bet * config.cluster_pay_factor)
        .sum();

    let scatter_count = grid.count(Symbol::Scatter);
    let luck_win = if scatter_count == 3 {
        let picks = 2 + rng.int_below(3);
        picks as f64 * config.luck_credit_factor * bet
    } else {
        0.0
    };

    TrialOutcome {
        trial,
        clusters: clusters.len(),
        cluster_win,
        scatter_count,
        luck_win,
        win: cluster_win + luck_win,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::WeightTable;

    fn params(trials: u64) -> SimulationParams {
        SimulationParams {
            server_seed: "00".repeat(32),
            client_seed: "test".into(),
            trials,
            target_rtp: 96.34,
            bet: 1.0,
        }
    }

    #[test]
    fn idempotent_by_seed() {
        let config = EngineConfig::default();
        let a = simulate_rtp(&config, &params(2_000)).unwrap();
        let b = simulate_rtp(&config, &params(2_000)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.trials, 2_000);
        assert!((a.total_bet - 2_000.0).abs() < 1e-9);
        assert!(a.empirical_rtp >= 0.0);
        assert!((0.0..=100.0).contains(&a.hit_rate_percent));
    }

    #[test]
    fn callback_sees_every_trial() {
        let config = EngineConfig::default();
        let mut seen = Vec::new();
        let report = simulate_rtp_with(&config, &params(50), |t| seen.push(t.clone())).unwrap();
        assert_eq!(seen.len(), 50);
        assert!(seen.iter().enumerate().all(|(i, t)| t.trial == i as u64));
        let total: f64 = seen.iter().map(|t| t.win).sum();
        assert!((total - report.total_win).abs() < 1e-9);
        let wins = seen.iter().filter(|t| t.win > 0.0).count() as u64;
        assert_eq!(wins, report.winning_trials);
    }

    #[test]
    fn full_board_of_one_symbol_pays_every_trial() {
        let config = EngineConfig::with_fixed_weights(WeightTable::only(Symbol::C));
        let report = simulate_rtp(&config, &params(10)).unwrap();
        // one 30-cell cluster: 30 * 0.2 = 6 bets per trial
        assert!((report.empirical_rtp - 600.0).abs() < 1e-6);
        assert_eq!(report.hit_rate_percent, 100.0);
    }

    #[test]
    fn no_paying_symbols_means_zero_rtp() {
        let config = EngineConfig::with_fixed_weights(WeightTable::only(Symbol::Pot));
        let report = simulate_rtp(&config, &params(10)).unwrap();
        assert_eq!(report.empirical_rtp, 0.0);
        assert_eq!(report.hit_rate_percent, 0.0);
    }

    #[test]
    fn rejects_bad_params() {
        let config = EngineConfig::default();
        let mut p = params(0);
        assert!(simulate_rtp(&config, &p).is_err());
        p.trials = 5;
        p.server_seed = "short".into();
        assert!(matches!(
            simulate_rtp(&config, &p),
            Err(EngineError::InvalidSeedMaterial(_))
        ));
    }
}
