use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trevo_core::EngineConfig;

mod app;

use app::{router, AppState, SessionLimits};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Settings read from the environment at startup.
struct ServerConfig {
    bind: String,
    api_key: String,
    starting_balance: f64,
    limits: SessionLimits,
    engine: EngineConfig,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl ServerConfig {
    fn from_env() -> anyhow::Result<Self> {
        let mut engine = match std::env::var("ENGINE_CONFIG") {
            Ok(path) => EngineConfig::from_json_file(&path).with_context(|| format!("loading {path}"))?,
            Err(_) => EngineConfig::default(),
        };
        if let Ok(rtp) = std::env::var("TARGET_RTP") {
            engine.target_rtp = rtp.parse().context("TARGET_RTP must be a number")?;
        }
        engine.validate()?;

        let starting_balance: f64 = env_or("STARTING_BALANCE", "100")
            .parse()
            .context("STARTING_BALANCE must be a number")?;

        let defaults = SessionLimits::default();
        let idle_secs: u64 = env_or("SESSION_IDLE_SECS", &defaults.idle_timeout.as_secs().to_string())
            .parse()
            .context("SESSION_IDLE_SECS must be a whole number of seconds")?;
        let max_sessions: usize = env_or("MAX_SESSIONS", &defaults.max_sessions.to_string())
            .parse()
            .context("MAX_SESSIONS must be a whole number")?;

        Ok(Self {
            bind: env_or("BIND", "127.0.0.1:8080"),
            api_key: env_or("API_KEY", "dev-key"),
            starting_balance,
            limits: SessionLimits {
                idle_timeout: Duration::from_secs(idle_secs),
                max_sessions,
            },
            engine,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    info!(
        target_rtp = config.engine.target_rtp,
        starting_balance = config.starting_balance,
        "engine configured"
    );
    let state = Arc::new(AppState::new(
        config.engine,
        config.api_key,
        config.starting_balance,
        config.limits,
    ));

    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tick.tick().await;
            sweeper.evict_idle().await;
        }
    });

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("listening on {}", config.bind);
    axum::serve(listener, app).await?;
    Ok(())
}
