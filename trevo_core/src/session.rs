use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    cascade::SpinState,
    config::EngineConfig,
    engine::{play_round, validate_bet, RoundResult},
    error::{EngineError, EngineResult},
    grid::Grid,
    seed::{SeedMaterial, SeedReveal},
    simulator::{simulate_rtp, SimulationParams, SimulationReport},
};

/// Published at session start, before any spin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCommitment {
    pub server_seed_hash: String,
    pub client_seed: String,
}

/// A `spin` call: the requested round plus any free or auto spins chained
/// onto it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinOutcome {
    pub rounds: Vec<RoundResult>,
    pub total_win: f64,
    pub final_grid: Grid,
    pub free_spins_remaining: u32,
    pub cascade_count: usize,
    pub balance: f64,
}

/// One player's game: seeds, counter, spin state and config, isolated from
/// every other session.
#[derive(Debug, Clone)]
pub struct Session {
    config: EngineConfig,
    seeds: SeedMaterial,
    state: SpinState,
}

impl Session {
    /// Commits to a fresh server seed.
    pub fn start(config: EngineConfig, client_seed_hint: Option<&str>) -> EngineResult<Self> {
        config.validate()?;
        let seeds = SeedMaterial::generate(client_seed_hint)?;
        info!(server_seed_hash = %seeds.server_seed_hash_hex(), "session started");
        Ok(Self {
            config,
            seeds,
            state: SpinState::default(),
        })
    }

    /// Session over known seeds, for replays and verification.
    pub fn with_seeds(
        config: EngineConfig,
        server_seed: impl Into<String>,
        client_seed: impl Into<String>,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            seeds: SeedMaterial::new(server_seed, client_seed)?,
            state: SpinState::default(),
        })
    }

    pub fn commitment(&self) -> SessionCommitment {
        SessionCommitment {
            server_seed_hash: self.seeds.server_seed_hash_hex(),
            client_seed: self.seeds.client_seed().to_string(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &SpinState {
        &self.state
    }

    pub fn spin_index(&self) -> u64 {
        self.seeds.spin_index()
    }

    pub fn balance(&self) -> f64 {
        self.state.balance
    }

    pub fn set_balance(&mut self, balance: f64) {
        self.state.balance = balance;
    }

    pub fn set_client_seed(&mut self, seed: impl Into<String>) -> EngineResult<()> {
        self.seeds.set_client_seed(seed)
    }

    pub fn set_auto_spins(&mut self, count: u32) {
        self.state.auto_spins_left = count;
    }

    /// Exactly one spin, no continuation.
    pub fn spin_round(&mut self, bet: f64) -> EngineResult<RoundResult> {
        play_round(&self.config, &mut self.seeds, &mut self.state, bet)
    }

    /// Plays one spin, then any free spins, then any auto spins.
    ///
    /// Only the first round can fail. An auto spin the balance cannot cover
    /// cancels the remaining auto spins. At most `max_chained_rounds` rounds
    /// are chained; free spins left over stay pending for the next call.
    pub fn spin(&mut self, bet: f64) -> EngineResult<SpinOutcome> {
        validate_bet(bet)?;
        let mut rounds = vec![self.spin_round(bet)?];

        let mut chained = 0;
        while chained < self.config.max_chained_rounds {
            if self.state.free_spins_left == 0 {
                if self.state.auto_spins_left == 0 {
                    break;
                }
                self.state.auto_spins_left -= 1;
            }
            match self.spin_round(bet) {
                Ok(round) => rounds.push(round),
                Err(EngineError::InsufficientBalance { balance, cost }) => {
                    warn!(balance, cost, "auto spin stopped: insufficient balance");
                    self.state.auto_spins_left = 0;
                    break;
                }
                Err(e) => return Err(e),
            }
            chained += 1;
        }

        Ok(self.summarize(rounds))
    }

    fn summarize(&self, rounds: Vec<RoundResult>) -> SpinOutcome {
        let total_win = rounds.iter().map(|r| r.total_win).sum();
        let cascade_count = rounds.iter().map(RoundResult::cascade_count).sum();
        let final_grid = rounds
            .last()
            .map(|r| r.final_grid.clone())
            .unwrap_or_default();
        SpinOutcome {
            rounds,
            total_win,
            final_grid,
            free_spins_remaining: self.state.free_spins_left,
            cascade_count,
            balance: self.state.balance,
        }
    }

    /// RTP estimate over this session's seeds. See [`crate::simulator`] for
    /// what the estimate leaves out.
    pub fn simulate_rtp(&self, trials: u64, target_rtp: f64, bet: f64) -> EngineResult<SimulationReport> {
        let params = SimulationParams {
            server_seed: self.seeds.server_seed().to_string(),
            client_seed: self.seeds.client_seed().to_string(),
            trials,
            target_rtp,
            bet,
        };
        simulate_rtp(&self.config, &params)
    }

    /// Reveals the current server seed and commits to a new one. The spin
    /// counter restarts at 0.
    pub fn rotate_server_seed(&mut self) -> (SeedReveal, SessionCommitment) {
        let revealed = self.seeds.rotate();
        info!(last_spin_index = revealed.last_spin_index, "server seed rotated");
        (revealed, self.commitment())
    }

    /// Ends the session and reveals its server seed.
    pub fn end(self) -> SeedReveal {
        let revealed = self.seeds.reveal();
        info!(last_spin_index = revealed.last_spin_index, "session ended");
        revealed
    }
}
