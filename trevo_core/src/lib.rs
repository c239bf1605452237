//! Deterministic cascading-cluster slot engine.
//!
//! A spin is a pure function of `(server_seed, client_seed, spin_index, bet,
//! target_rtp)` and a little session state:
//!
//! ```text
//! seed::derive_seed -> rng::SpinRng -> grid::Grid::generate (weights::WeightTable)
//!                                  -> cascade::CascadeResolver (cluster::find_clusters, refills)
//!                                  -> engine::RoundResult
//! ```
//!
//! [`Session`] wraps that pipeline with seed commitment, balance and the
//! free/auto spin continuation. [`simulator`] estimates RTP offline.

pub mod cascade;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod rng;
pub mod seed;
pub mod session;
pub mod simulator;
pub mod symbols;
pub mod weights;

pub use crate::cascade::{CascadeOutcome, CascadeResolver, CascadeStep, GoldReveal, ScatterTrigger, SpinState};
pub use crate::cluster::{find_clusters, Cluster, MIN_CLUSTER};
pub use crate::config::EngineConfig;
pub use crate::engine::{compute_grid, play_round, resolve_at, spin_with_seeds, verify_grid, BonusCredits, RoundResult};
pub use crate::error::{EngineError, EngineResult};
pub use crate::grid::{Grid, Position, COLS, ROWS};
pub use crate::rng::SpinRng;
pub use crate::seed::{derive_hash_hex, derive_seed, verify_commitment, SeedMaterial, SeedReveal};
pub use crate::session::{Session, SessionCommitment, SpinOutcome};
pub use crate::simulator::{simulate_rtp, simulate_rtp_with, SimulationParams, SimulationReport, TrialOutcome};
pub use crate::symbols::Symbol;
pub use crate::weights::WeightTable;
