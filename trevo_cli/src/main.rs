use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use trevo_core::{
    compute_grid, derive_hash_hex, seed, simulate_rtp_with, verify_commitment, EngineConfig, Grid, Session,
    SimulationParams,
};

#[derive(Parser)]
#[command(name = "trevo-cli", about = "Play, simulate and verify trevo spins locally")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Engine config JSON; built-in defaults when absent
    #[arg(long, global = true, env = "TREVO_ENGINE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a server seed and print its commitment
    NewSeed,
    /// Play a local session and print every round
    Play {
        #[arg(long, env = "TREVO_SERVER_SEED")]
        server_seed: Option<String>,
        #[arg(long, env = "TREVO_CLIENT_SEED")]
        client_seed: Option<String>,
        #[arg(long, default_value_t = 10)]
        spins: u32,
        #[arg(long, default_value_t = 1.0)]
        bet: f64,
        #[arg(long, default_value_t = 100.0)]
        balance: f64,
        #[arg(long)]
        target_rtp: Option<f64>,
        /// Print rounds as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Estimate RTP over many seeded grids
    Simulate {
        #[arg(long, default_value_t = 100_000)]
        trials: u64,
        #[arg(long)]
        target_rtp: Option<f64>,
        #[arg(long, default_value_t = 1.0)]
        bet: f64,
        #[arg(long, env = "TREVO_SERVER_SEED")]
        server_seed: Option<String>,
        #[arg(long, env = "TREVO_CLIENT_SEED")]
        client_seed: Option<String>,
        /// Write one row per trial to this CSV path
        #[arg(long = "csv")]
        csv_path: Option<PathBuf>,
    },
    /// Recompute the initial grid of a spin from revealed seeds
    Verify {
        #[arg(long, env = "TREVO_SERVER_SEED")]
        server_seed: String,
        #[arg(long, env = "TREVO_CLIENT_SEED")]
        client_seed: String,
        #[arg(long)]
        spin_index: u64,
        /// Hash published before play
        #[arg(long)]
        commitment: Option<String>,
        #[arg(long)]
        target_rtp: Option<f64>,
        /// Expected grid as JSON rows of symbol keys
        #[arg(long)]
        grid: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>, target_rtp: Option<f64>) -> anyhow::Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(rtp) = target_rtp {
        config = config.with_target_rtp(rtp);
    }
    Ok(config)
}

fn parse_grid(json: &str) -> anyhow::Result<Grid> {
    let rows: Vec<Vec<String>> = serde_json::from_str(json).context("grid must be JSON rows of symbol keys")?;
    match Grid::from_keys(&rows) {
        Some(grid) => Ok(grid),
        None => bail!("grid must be 5 rows of 6 known symbol keys"),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::NewSeed => {
            let server_seed = seed::generate_server_seed();
            println!("server_seed={server_seed}");
            println!("server_seed_hash={}", derive_hash_hex(server_seed.as_bytes()));
        }
        Commands::Play {
            server_seed,
            client_seed,
            spins,
            bet,
            balance,
            target_rtp,
            json,
        } => {
            let config = load_config(cli.config.as_ref(), target_rtp)?;
            let mut session = match server_seed {
                Some(server_seed) => Session::with_seeds(
                    config,
                    server_seed,
                    client_seed.unwrap_or_else(seed::generate_client_seed),
                )?,
                None => Session::start(config, client_seed.as_deref())?,
            };
            session.set_balance(balance);
            let commitment = session.commitment();
            println!(
                "server_seed_hash={} client_seed={}",
                commitment.server_seed_hash, commitment.client_seed
            );

            for _ in 0..spins {
                let outcome = match session.spin(bet) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        println!("stopped: {e}");
                        break;
                    }
                };
                for round in &outcome.rounds {
                    if json {
                        println!("{}", serde_json::to_string(round)?);
                    } else {
                        println!(
                            "#{:>5} {} cascades={} win={:.2} balance={:.2}{}",
                            round.spin_index,
                            if round.free_spin { "free" } else { "paid" },
                            round.cascade_count(),
                            round.total_win,
                            round.balance_after,
                            match &round.trigger {
                                Some(trigger) => format!(" trigger={trigger:?}"),
                                None => String::new(),
                            }
                        );
                    }
                }
            }

            let final_balance = session.balance();
            let revealed = session.end();
            println!(
                "balance={final_balance:.2} server_seed={} last_spin_index={}",
                revealed.server_seed, revealed.last_spin_index
            );
        }
        Commands::Simulate {
            trials,
            target_rtp,
            bet,
            server_seed,
            client_seed,
            csv_path,
        } => {
            let config = load_config(cli.config.as_ref(), None)?;
            let params = SimulationParams {
                server_seed: server_seed.unwrap_or_else(seed::generate_server_seed),
                client_seed: client_seed.unwrap_or_else(seed::generate_client_seed),
                trials,
                target_rtp: target_rtp.unwrap_or(config.target_rtp),
                bet,
            };
            info!(trials, target_rtp = params.target_rtp, "simulating");

            let mut writer = match &csv_path {
                Some(path) => Some(csv::Writer::from_path(path)?),
                None => None,
            };
            let mut write_err = None;
            let report = simulate_rtp_with(&config, &params, |trial| {
                if write_err.is_some() {
                    return;
                }
                if let Some(w) = writer.as_mut() {
                    if let Err(e) = w.serialize(trial) {
                        write_err = Some(e);
                    }
                }
            })?;
            if let Some(e) = write_err {
                return Err(e.into());
            }
            if let (Some(mut w), Some(path)) = (writer, csv_path) {
                w.flush()?;
                println!("Exported {} rows to {}", report.trials, path.display());
            }

            println!(
                "trials={} target_rtp={:.2} empirical_rtp={:.2} hit_rate={:.2}% server_seed={}",
                report.trials,
                params.target_rtp,
                report.empirical_rtp,
                report.hit_rate_percent,
                params.server_seed
            );
        }
        Commands::Verify {
            server_seed,
            client_seed,
            spin_index,
            commitment,
            target_rtp,
            grid,
        } => {
            seed::validate_server_seed(&server_seed)?;
            seed::validate_client_seed(&client_seed)?;
            let config = load_config(cli.config.as_ref(), target_rtp)?;
            let (computed, _) = compute_grid(&server_seed, &client_seed, spin_index, &config);
            println!("{computed}");

            let mut ok = true;
            if let Some(hash) = commitment {
                let matches = verify_commitment(&server_seed, &hash);
                println!("commitment {}", if matches { "matches" } else { "MISMATCH" });
                ok &= matches;
            }
            if let Some(json) = grid {
                let matches = parse_grid(&json)? == computed;
                println!("grid {}", if matches { "matches" } else { "MISMATCH" });
                ok &= matches;
            }
            if !ok {
                bail!("verification failed");
            }
        }
    }

    Ok(())
}
