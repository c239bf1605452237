//! Cascade resolution: the remove / refill / re-evaluate loop and the special
//! symbol effects that run between passes.
//!
//! ```text
//! Idle -> EvaluatingClusters --(none)--> Idle
//!              |  ^
//!        (found)  |
//!              v  |
//!         Removing -> Refilling -> ApplyingSpecials
//! ```
//!
//! The loop stops on the first pass without clusters or after
//! `EngineConfig::max_cascades` passes, whichever comes first.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::cluster::{find_clusters, union_cells, Cluster};
use crate::config::EngineConfig;
use crate::grid::{Grid, Position};
use crate::rng::SpinRng;
use crate::symbols::Symbol;
use crate::weights::WeightTable;

/// Mutable per-session values the resolver reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinState {
    pub balance: f64,
    /// 1 unless a clover is waiting to boost the next cluster win.
    pub global_multiplier: f64,
    pub free_spins_left: u32,
    /// Set by four scatters and never cleared.
    pub gold_persistent: bool,
    pub auto_spins_left: u32,
}

impl Default for SpinState {
    fn default() -> Self {
        Self {
            balance: 0.0,
            global_multiplier: 1.0,
            free_spins_left: 0,
            gold_persistent: false,
            auto_spins_left: 0,
        }
    }
}

impl SpinState {
    pub fn with_balance(balance: f64) -> Self {
        Self {
            balance,
            ..Self::default()
        }
    }
}

/// Outcome of counting scatters on a freshly generated grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScatterTrigger {
    FreeSpins { awarded: u32 },
    /// Four scatters: gold seeding becomes permanent for the session.
    Glitter,
    Luck { cells: Vec<Position>, credit: f64 },
}

/// Applies the grid-level scatter table. Only one branch fires.
///
/// The luck bonus picks distinct cells, one draw each, and its credit goes
/// straight to the balance.
pub fn apply_scatter_trigger(
    grid: &Grid,
    state: &mut SpinState,
    rng: &mut SpinRng,
    config: &EngineConfig,
    bet: f64,
) -> Option<ScatterTrigger> {
    match grid.count(Symbol::Scatter) {
        n if n >= 5 => {
            state.free_spins_left = config.free_spins_award;
            Some(ScatterTrigger::FreeSpins {
                awarded: config.free_spins_award,
            })
        }
        4 => {
            state.gold_persistent = true;
            Some(ScatterTrigger::Glitter)
        }
        3 => {
            let picks = 2 + rng.int_below(3);
            let mut pool: Vec<Position> = Grid::positions().collect();
            let cells: Vec<Position> = (0..picks)
                .map(|_| pool.remove(rng.int_below(pool.len())))
                .collect();
            let credit = cells.len() as f64 * config.luck_credit_factor * bet;
            state.balance += credit;
            Some(ScatterTrigger::Luck { cells, credit })
        }
        _ => None,
    }
}

/// A gold cell opened by a rainbow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldReveal {
    pub position: Position,
    pub coins: u32,
    pub credit: f64,
}

/// One pass of the cascade loop that found clusters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeStep {
    pub index: u32,
    pub clusters: Vec<Cluster>,
    /// Multiplier the cluster win was computed with.
    pub multiplier: f64,
    pub win: f64,
    pub removed: usize,
    pub gold_reveals: Vec<GoldReveal>,
    pub rainbow_credit: f64,
    pub clover: bool,
    pub pot_credit: f64,
    pub gold_marked: Vec<Position>,
    /// Board after the pass, ready for the next evaluation.
    pub grid: Grid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CascadeOutcome {
    pub steps: Vec<CascadeStep>,
    /// Sum of cluster wins; not yet credited.
    pub cluster_win: f64,
    /// Already credited during the loop.
    pub rainbow_credit: f64,
    /// Already credited during the loop.
    pub pot_credit: f64,
    /// Gold marked on the final pass when gold is persistent.
    pub settle_gold: Vec<Position>,
    /// The loop stopped at the cap rather than on an empty pass.
    pub capped: bool,
}

/// Drives one spin's cascade loop. Owns nothing: the PRNG is borrowed for
/// the whole loop so refills continue the spin's draw stream.
pub struct CascadeResolver<'a> {
    config: &'a EngineConfig,
    table: &'a WeightTable,
    rng: &'a mut SpinRng,
    bet: f64,
}

impl<'a> CascadeResolver<'a> {
    pub fn new(
        config: &'a EngineConfig,
        table: &'a WeightTable,
        rng: &'a mut SpinRng,
        bet: f64,
    ) -> Self {
        Self {
            config,
            table,
            rng,
            bet,
        }
    }

    pub fn resolve(&mut self, grid: &mut Grid, state: &mut SpinState) -> CascadeOutcome {
        let mut outcome = CascadeOutcome::default();

        for index in 0..self.config.max_cascades {
            let clusters = find_clusters(grid, self.config.min_cluster);
            if clusters.is_empty() {
                if state.gold_persistent {
                    outcome.settle_gold = self.mark_gold(grid, 2);
                }
                break;
            }

            let multiplier = state.global_multiplier;
            let win: f64 = clusters
                .iter()
                .map(|c| c.size() as f64 * self.bet * self.config.cluster_pay_factor * multiplier)
                .sum();
            if multiplier != 1.0 {
                // a clover boost covers exactly one win
                state.global_multiplier = 1.0;
            }
            outcome.cluster_win += win;

            let removed = grid.clear(&union_cells(&clusters));
            grid.refill(self.rng, self.table);

            let (gold_reveals, rainbow_credit) = self.apply_rainbow(grid, state);
            let clover = grid.contains(Symbol::Clover);
            if clover {
                state.global_multiplier = self.config.clover_multiplier;
            }
            let pot_credit = self.apply_pot(grid, state);
            let gold_marked = self.mark_gold(grid, 1);

            outcome.rainbow_credit += rainbow_credit;
            outcome.pot_credit += pot_credit;

            debug!(
                step = index,
                clusters = clusters.len(),
                removed,
                win,
                multiplier,
                rainbow_credit,
                pot_credit,
                clover,
                "cascade step"
            );

            outcome.steps.push(CascadeStep {
                index,
                clusters,
                multiplier,
                win,
                removed,
                gold_reveals,
                rainbow_credit,
                clover,
                pot_credit,
                gold_marked,
                grid: grid.clone(),
            });

            if index + 1 == self.config.max_cascades {
                outcome.capped = true;
                debug!(cap = self.config.max_cascades, "cascade cap reached");
            }
        }

        // a boost left unused when the loop settles does not carry over
        state.global_multiplier = 1.0;
        outcome
    }

    /// Rainbows open up to 1..=3 random gold cells for 1..=5 bets each, then
    /// leave the board through a normal refill.
    fn apply_rainbow(&mut self, grid: &mut Grid, state: &mut SpinState) -> (Vec<GoldReveal>, f64) {
        let rainbows = grid.positions_of(Symbol::Rainbow);
        if rainbows.is_empty() {
            return (Vec::new(), 0.0);
        }

        let draw_count = 1 + self.rng.int_below(3);
        let mut gold = grid.positions_of(Symbol::Gold);
        let reveals = draw_count.min(gold.len());
        let mut opened = Vec::with_capacity(reveals);
        let mut total = 0.0;
        for _ in 0..reveals {
            let position = gold.remove(self.rng.int_below(gold.len()));
            let coins = self.rng.int_below(5) as u32 + 1;
            let credit = f64::from(coins) * self.bet;
            state.balance += credit;
            total += credit;
            opened.push(GoldReveal {
                position,
                coins,
                credit,
            });
        }
        trace!(rainbows = rainbows.len(), reveals, total, "rainbow");

        grid.clear(&rainbows);
        grid.refill(self.rng, self.table);
        (opened, total)
    }

    fn apply_pot(&mut self, grid: &Grid, state: &mut SpinState) -> f64 {
        if !grid.contains(Symbol::Pot) {
            return 0.0;
        }
        let credit = grid.paying_cells() as f64
            * self.config.pot_credit_factor
            * self.bet
            * state.global_multiplier;
        state.balance += credit;
        credit
    }

    fn mark_gold(&mut self, grid: &mut Grid, count: usize) -> Vec<Position> {
        (0..count)
            .map(|_| {
                let pos = Position::random(self.rng);
                grid.set(pos, Some(Symbol::Gold));
                pos
            })
            .collect()
    }
}
