use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    cascade::{apply_scatter_trigger, CascadeResolver, CascadeStep, ScatterTrigger, SpinState},
    config::EngineConfig,
    error::{EngineError, EngineResult},
    grid::{Grid, Position},
    rng::SpinRng,
    seed::{derive_seed_bytes, verify_commitment, SeedMaterial},
    symbols::Symbol,
};

/// Money credited outside cluster wins, per source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BonusCredits {
    pub luck: f64,
    pub rainbow: f64,
    pub pot: f64,
}

impl BonusCredits {
    pub fn total(&self) -> f64 {
        self.luck + self.rainbow + self.pot
    }
}

/// Everything that happened in one resolved spin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    pub spin_index: u64,
    /// Hex seed the grid was drawn from.
    pub seed: String,
    pub bet: f64,
    pub cost: f64,
    pub free_spin: bool,
    pub initial_grid: Grid,
    pub final_grid: Grid,
    pub scatter_count: usize,
    pub trigger: Option<ScatterTrigger>,
    pub cascades: Vec<CascadeStep>,
    /// Gold marked when the cascade settled with gold persistent.
    pub settle_gold: Vec<Position>,
    pub capped: bool,
    pub cluster_win: f64,
    pub bonus: BonusCredits,
    /// Cluster wins plus every bonus credit.
    pub total_win: f64,
    pub free_spins_remaining: u32,
    pub balance_after: f64,
}

impl RoundResult {
    pub fn cascade_count(&self) -> usize {
        self.cascades.len()
    }
}

pub fn validate_bet(bet: f64) -> EngineResult<()> {
    if !bet.is_finite() || bet <= 0.0 {
        return Err(EngineError::InvalidBet(bet));
    }
    Ok(())
}

/// Seeds the spin's PRNG and draws the initial grid. The returned PRNG has
/// consumed exactly one draw per cell.
pub fn compute_grid(
    server_seed: &str,
    client_seed: &str,
    spin_index: u64,
    config: &EngineConfig,
) -> (Grid, SpinRng) {
    let digest = derive_seed_bytes(server_seed, client_seed, spin_index);
    let mut rng = SpinRng::from_digest(&digest);
    let grid = Grid::generate(&mut rng, &config.weight_table());
    (grid, rng)
}

/// Checks the commitment and that `expected` is the grid those seeds produce.
pub fn verify_grid(
    server_seed: &str,
    commitment_hash: &str,
    client_seed: &str,
    spin_index: u64,
    config: &EngineConfig,
    expected: &Grid,
) -> bool {
    if !verify_commitment(server_seed, commitment_hash) {
        return false;
    }
    let (grid, _) = compute_grid(server_seed, client_seed, spin_index, config);
    grid == *expected
}

/// Charges, advances the spin counter and resolves one spin.
///
/// A pending free spin is consumed first and costs nothing. On
/// `InsufficientBalance` nothing is mutated.
pub fn play_round(
    config: &EngineConfig,
    seeds: &mut SeedMaterial,
    state: &mut SpinState,
    bet: f64,
) -> EngineResult<RoundResult> {
    validate_bet(bet)?;
    let free_spin = state.free_spins_left > 0;
    let cost = if free_spin { 0.0 } else { bet };
    if state.balance < cost {
        return Err(EngineError::InsufficientBalance {
            balance: state.balance,
            cost,
        });
    }
    if free_spin {
        state.free_spins_left -= 1;
    }
    let spin_index = seeds.advance();
    Ok(resolve_at(config, seeds, spin_index, state, bet, cost))
}

/// Resolves the spin at `spin_index` without touching the seed counter.
///
/// `cost` is deducted up front; bonuses are credited as they happen and the
/// cluster win when the cascade settles.
pub fn resolve_at(
    config: &EngineConfig,
    seeds: &SeedMaterial,
    spin_index: u64,
    state: &mut SpinState,
    bet: f64,
    cost: f64,
) -> RoundResult {
    state.balance -= cost;

    let seed = seeds.seed_for(spin_index);
    let table = config.weight_table();
    let mut rng = SpinRng::from_digest(&seeds.seed_bytes_for(spin_index));
    let mut grid = Grid::generate(&mut rng, &table);
    let initial_grid = grid.clone();

    let scatter_count = grid.count(Symbol::Scatter);
    let trigger = apply_scatter_trigger(&grid, state, &mut rng, config, bet);
    let luck = match &trigger {
        Some(ScatterTrigger::Luck { credit, .. }) => *credit,
        _ => 0.0,
    };
    if let Some(trigger) = &trigger {
        debug!(spin_index, scatter_count, ?trigger, "scatter trigger");
    }

    let outcome = CascadeResolver::new(config, &table, &mut rng, bet).resolve(&mut grid, state);
    state.balance += outcome.cluster_win;

    let bonus = BonusCredits {
        luck,
        rainbow: outcome.rainbow_credit,
        pot: outcome.pot_credit,
    };
    let total_win = outcome.cluster_win + bonus.total();
    info!(
        spin_index,
        bet,
        cost,
        cascades = outcome.steps.len(),
        total_win,
        balance = state.balance,
        "spin settled"
    );

    RoundResult {
        spin_index,
        seed,
        bet,
        cost,
        free_spin: cost == 0.0,
        initial_grid,
        final_grid: grid,
        scatter_count,
        trigger,
        cascades: outcome.steps,
        settle_gold: outcome.settle_gold,
        capped: outcome.capped,
        cluster_win: outcome.cluster_win,
        bonus,
        total_win,
        free_spins_remaining: state.free_spins_left,
        balance_after: state.balance,
    }
}

/// Convenience: resolve one spin straight from seeds with a fresh state.
pub fn spin_with_seeds(
    server_seed: &str,
    client_seed: &str,
    spin_index: u64,
    config: &EngineConfig,
    bet: f64,
) -> EngineResult<RoundResult> {
    validate_bet(bet)?;
    let seeds = SeedMaterial::new(server_seed, client_seed)?;
    let mut state = SpinState::with_balance(bet);
    Ok(resolve_at(config, &seeds, spin_index, &mut state, bet, bet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::WeightTable;

    const EPS: f64 = 1e-9;

    fn seeds() -> SeedMaterial {
        SeedMaterial::new("00".repeat(32), "test").unwrap()
    }

    #[test]
    fn test_spin_deterministic() {
        let config = EngineConfig::default();
        let out1 = spin_with_seeds(&"00".repeat(32), "test", 0, &config, 1.0).unwrap();
        let out2 = spin_with_seeds(&"00".repeat(32), "test", 0, &config, 1.0).unwrap();
        assert_eq!(out1, out2);
        assert_eq!(out1.initial_grid, compute_grid(&"00".repeat(32), "test", 0, &config).0);
    }

    #[test]
    fn conservation_of_win() {
        let config = EngineConfig::default();
        let mut seeds = seeds();
        let mut state = SpinState::with_balance(1_000.0);
        for _ in 0..200 {
            let before = state.balance;
            let round = play_round(&config, &mut seeds, &mut state, 1.0).unwrap();
            let cluster: f64 = round.cascades.iter().map(|s| s.win).sum();
            assert!((round.cluster_win - cluster).abs() < EPS);
            assert!((round.total_win - round.cluster_win - round.bonus.total()).abs() < EPS);
            assert!((state.balance - (before - round.cost + round.total_win)).abs() < 1e-6);
            assert_eq!(state.global_multiplier, 1.0);
        }
        assert_eq!(seeds.spin_index(), 200);
    }

    #[test]
    fn insufficient_balance_changes_nothing() {
        let config = EngineConfig::default();
        let mut seeds = seeds();
        let mut state = SpinState::with_balance(0.5);
        let err = play_round(&config, &mut seeds, &mut state, 1.0).unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientBalance {
                balance: 0.5,
                cost: 1.0
            }
        );
        assert_eq!(state, SpinState::with_balance(0.5));
        assert_eq!(seeds.spin_index(), 0);
    }

    #[test]
    fn rejects_bad_bets() {
        let config = EngineConfig::default();
        let mut seeds = seeds();
        let mut state = SpinState::with_balance(10.0);
        for bet in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                play_round(&config, &mut seeds, &mut state, bet),
                Err(EngineError::InvalidBet(_))
            ));
        }
        assert_eq!(seeds.spin_index(), 0);
    }

    #[test]
    fn pending_free_spin_is_consumed_at_no_cost() {
        let config = EngineConfig::with_fixed_weights(WeightTable::only(Symbol::Gold));
        let mut seeds = seeds();
        let mut state = SpinState {
            free_spins_left: 2,
            ..SpinState::with_balance(0.0)
        };
        let round = play_round(&config, &mut seeds, &mut state, 5.0).unwrap();
        assert!(round.free_spin);
        assert_eq!(round.cost, 0.0);
        assert_eq!(round.free_spins_remaining, 1);
        assert_eq!(state.balance, 0.0);
    }

    #[test]
    fn persistent_gold_survives_later_spins() {
        // scatter-heavy board so luck and free spin triggers both come up
        let table = WeightTable::new([10, 10, 10, 10, 20, 30, 0, 0, 0]).unwrap();
        let config = EngineConfig::with_fixed_weights(table);
        let mut seeds = seeds();
        let mut state = SpinState {
            gold_persistent: true,
            ..SpinState::with_balance(10_000.0)
        };
        let (mut luck, mut free) = (false, false);
        for _ in 0..400 {
            let round = play_round(&config, &mut seeds, &mut state, 1.0).unwrap();
            assert!(state.gold_persistent);
            match round.trigger {
                Some(ScatterTrigger::Luck { .. }) => luck = true,
                Some(ScatterTrigger::FreeSpins { .. }) => free = true,
                _ => {}
            }
            let expected = if round.capped { 0 } else { 2 };
            assert_eq!(round.settle_gold.len(), expected);
            for pos in &round.settle_gold {
                assert_eq!(round.final_grid.get(*pos), Some(Symbol::Gold));
            }
        }
        assert!(luck && free);
    }

    #[test]
    fn verify_grid_checks_commitment_and_board() {
        let config = EngineConfig::default();
        let server = "ab".repeat(32);
        let commitment = crate::seed::derive_hash_hex(server.as_bytes());
        let (grid, _) = compute_grid(&server, "client", 3, &config);
        assert!(verify_grid(&server, &commitment, "client", 3, &config, &grid));
        assert!(!verify_grid(&server, &commitment, "client", 4, &config, &grid));
        assert!(!verify_grid(&server, "deadbeef", "client", 3, &config, &grid));
    }
}
