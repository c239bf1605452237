use trevo_core::{verify_grid, EngineConfig, Session};

fn main() -> Result<(), trevo_core::EngineError> {
    // Example end-to-end session: commit, play, reveal, verify
    let mut session = Session::start(EngineConfig::default(), Some("example-client-seed"))?;
    session.set_balance(100.0);
    let commitment = session.commitment();
    println!("server_seed_hash={}", commitment.server_seed_hash);

    let outcome = session.spin(1.0)?;
    for round in &outcome.rounds {
        println!(
            "spin={} cascades={} win={:.2} balance={:.2}\n{}",
            round.spin_index,
            round.cascade_count(),
            round.total_win,
            round.balance_after,
            round.final_grid
        );
    }

    let config = session.config().clone();
    let first = &outcome.rounds[0];
    let revealed = session.end();
    let ok = verify_grid(
        &revealed.server_seed,
        &commitment.server_seed_hash,
        &revealed.client_seed,
        first.spin_index,
        &config,
        &first.initial_grid,
    );
    println!("server_seed={} verified={ok}", revealed.server_seed);
    Ok(())
}
