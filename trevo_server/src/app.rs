use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{
    extract::{Path, State},
    routing::{post, put},
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use rand::{rngs::OsRng, RngCore};
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use trevo_core::{
    compute_grid, derive_hash_hex, seed, simulate_rtp, verify_commitment, EngineConfig, EngineError, Grid,
    RoundResult, ScatterTrigger, Session, SimulationParams, SpinOutcome,
};
use trevo_shared::{
    AdminSetParamsRequest, ApiError, ClientSeedResponse, EndSessionResponse, ErrorBody, RoundDto,
    SetClientSeedRequest, SimulateRequest, SimulateResponse, SpinRequest, SpinResponse, StartSessionRequest,
    StartSessionResponse, VerifyRequest, VerifyResponse,
};

/// Upper bound for one `/simulate` call.
pub const MAX_SIMULATION_TRIALS: u64 = 1_000_000;

/// How long an untouched session is kept and how many may be open at once.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub idle_timeout: Duration,
    pub max_sessions: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30 * 60),
            max_sessions: 10_000,
        }
    }
}

struct SessionEntry {
    session: Session,
    /// Response of the last spin call, replayed for a retried `spin_index`.
    last_response: Option<SpinResponse>,
    last_active: Instant,
}

pub struct AppState {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionEntry>>>>,
    /// Config new sessions start from; admin updates change its target RTP.
    engine: RwLock<EngineConfig>,
    api_key: String,
    starting_balance: f64,
    limits: SessionLimits,
}

impl AppState {
    pub fn new(engine: EngineConfig, api_key: String, starting_balance: f64, limits: SessionLimits) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            engine: RwLock::new(engine),
            api_key,
            starting_balance,
            limits,
        }
    }

    /// Drops sessions untouched for longer than the idle timeout. A session
    /// locked by an in-flight request is in use and always kept.
    pub async fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let timeout = self.limits.idle_timeout;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| match entry.try_lock() {
            Ok(entry) => now.saturating_duration_since(entry.last_active) < timeout,
            Err(_) => true,
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, open = sessions.len(), "idle sessions evicted");
        }
        evicted
    }

    async fn session(&self, id: &str) -> Result<Arc<Mutex<SessionEntry>>, AppError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(AppError(ApiError::NotFound))
    }
}

/// `ApiError` rendered as a status code plus `ErrorBody`.
pub struct AppError(pub ApiError);

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        Self(e)
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        Self(match e {
            EngineError::InsufficientBalance { balance, cost } => ApiError::InsufficientBalance { balance, cost },
            EngineError::InvalidSeedMaterial(_) | EngineError::InvalidBet(_) | EngineError::Configuration(_) => {
                ApiError::Invalid(e.to_string())
            }
        })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn new_session_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn round_dto(round: &RoundResult) -> RoundDto {
    let free_spins_awarded = match &round.trigger {
        Some(ScatterTrigger::FreeSpins { awarded }) => *awarded,
        _ => 0,
    };
    RoundDto {
        spin_index: round.spin_index,
        free_spin: round.free_spin,
        cost: round.cost,
        initial_grid: round.initial_grid.keys(),
        final_grid: round.final_grid.keys(),
        scatter_count: round.scatter_count,
        cascade_count: round.cascade_count(),
        capped: round.capped,
        cluster_win: round.cluster_win,
        luck_credit: round.bonus.luck,
        rainbow_credit: round.bonus.rainbow,
        pot_credit: round.bonus.pot,
        total_win: round.total_win,
        free_spins_awarded,
        gold_triggered: matches!(round.trigger, Some(ScatterTrigger::Glitter)),
        balance_after: round.balance_after,
    }
}

fn spin_response(session_id: &str, session: &Session, outcome: &SpinOutcome) -> SpinResponse {
    let first_spin_index = outcome.rounds.first().map_or(0, |r| r.spin_index);
    SpinResponse {
        session_id: session_id.to_string(),
        server_seed_hash: session.commitment().server_seed_hash,
        first_spin_index,
        last_spin_index: session.spin_index(),
        rounds: outcome.rounds.iter().map(round_dto).collect(),
        total_win: outcome.total_win,
        final_grid: outcome.final_grid.keys(),
        free_spins_remaining: outcome.free_spins_remaining,
        cascade_count: outcome.cascade_count,
        balance: outcome.balance,
    }
}

async fn route_start_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>, AppError> {
    let balance = req.balance.unwrap_or(state.starting_balance);
    if !balance.is_finite() || balance < 0.0 {
        return Err(ApiError::Invalid("balance must be a non-negative number".into()).into());
    }
    let config = state.engine.read().await.clone();
    let mut session = Session::start(config, req.client_seed.as_deref())?;
    session.set_balance(balance);

    let commitment = session.commitment();
    let session_id = new_session_id();
    let response = StartSessionResponse {
        session_id: session_id.clone(),
        server_seed_hash: commitment.server_seed_hash,
        client_seed: commitment.client_seed,
        balance,
        target_rtp: session.config().target_rtp,
    };

    state.evict_idle().await;
    let mut sessions = state.sessions.write().await;
    if sessions.len() >= state.limits.max_sessions {
        warn!(open = sessions.len(), "session limit reached");
        return Err(ApiError::Unavailable("too many open sessions".into()).into());
    }
    sessions.insert(
        session_id.clone(),
        Arc::new(Mutex::new(SessionEntry {
            session,
            last_response: None,
            last_active: Instant::now(),
        })),
    );
    drop(sessions);
    info!(%session_id, balance, "session opened");
    Ok(Json(response))
}

async fn route_spin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SpinRequest>,
) -> Result<Json<SpinResponse>, AppError> {
    let entry = state.session(&id).await?;
    let mut entry = entry.lock().await;
    entry.last_active = Instant::now();

    if let Some(requested) = req.spin_index {
        if let Some(cached) = &entry.last_response {
            if cached.first_spin_index == requested {
                info!(session_id = %id, spin_index = requested, "replaying cached spin");
                return Ok(Json(cached.clone()));
            }
        }
        let next = entry.session.spin_index() + 1;
        if requested != next {
            return Err(ApiError::Conflict(format!("expected spin_index {next}, got {requested}")).into());
        }
    }

    if let Some(auto) = req.auto_spins {
        entry.session.set_auto_spins(auto);
    }
    let outcome = match entry.session.spin(req.bet) {
        Ok(outcome) => outcome,
        Err(e) => {
            entry.session.set_auto_spins(0);
            warn!(session_id = %id, error = %e, "spin rejected");
            return Err(e.into());
        }
    };
    let response = spin_response(&id, &entry.session, &outcome);
    entry.last_response = Some(response.clone());
    Ok(Json(response))
}

async fn route_set_client_seed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetClientSeedRequest>,
) -> Result<Json<ClientSeedResponse>, AppError> {
    let entry = state.session(&id).await?;
    let mut entry = entry.lock().await;
    entry.last_active = Instant::now();
    entry.session.set_client_seed(req.client_seed)?;
    let commitment = entry.session.commitment();
    Ok(Json(ClientSeedResponse {
        server_seed_hash: commitment.server_seed_hash,
        client_seed: commitment.client_seed,
        spin_index: entry.session.spin_index(),
    }))
}

async fn route_end_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EndSessionResponse>, AppError> {
    let entry = state
        .sessions
        .write()
        .await
        .remove(&id)
        .ok_or(AppError(ApiError::NotFound))?;
    // waits for a spin still holding the session
    let entry = entry.lock().await;
    let final_balance = entry.session.balance();
    let revealed = entry.session.clone().end();
    Ok(Json(EndSessionResponse {
        session_id: id,
        server_seed: revealed.server_seed,
        server_seed_hash: revealed.server_seed_hash,
        client_seed: revealed.client_seed,
        last_spin_index: revealed.last_spin_index,
        final_balance,
        ended_at: chrono::Utc::now(),
    }))
}

async fn route_simulate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SimulateRequest>,
) -> Result<Json<SimulateResponse>, AppError> {
    if req.trials > MAX_SIMULATION_TRIALS {
        return Err(ApiError::Invalid(format!("at most {MAX_SIMULATION_TRIALS} trials")).into());
    }
    let config = state.engine.read().await.clone();
    let params = SimulationParams {
        server_seed: req.server_seed.unwrap_or_else(seed::generate_server_seed),
        client_seed: req.client_seed.unwrap_or_else(seed::generate_client_seed),
        trials: req.trials,
        target_rtp: req.target_rtp.unwrap_or(config.target_rtp),
        bet: req.bet.unwrap_or(1.0),
    };
    let target_rtp = params.target_rtp;
    let report = tokio::task::spawn_blocking(move || simulate_rtp(&config, &params))
        .await
        .map_err(|e| {
            error!(error = %e, "simulation task failed");
            AppError(ApiError::Internal)
        })??;
    Ok(Json(SimulateResponse {
        trials: report.trials,
        target_rtp,
        total_bet: report.total_bet,
        total_win: report.total_win,
        empirical_rtp: report.empirical_rtp,
        hit_rate_percent: report.hit_rate_percent,
    }))
}

async fn route_verify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, AppError> {
    seed::validate_server_seed(&req.server_seed)?;
    seed::validate_client_seed(&req.client_seed)?;
    let expected =
        Grid::from_keys(&req.grid).ok_or_else(|| ApiError::Invalid("grid must be 5x6 symbol keys".into()))?;

    let mut config = state.engine.read().await.clone();
    if let Some(rtp) = req.target_rtp {
        config = config.with_target_rtp(rtp);
    }
    let commitment_matches = verify_commitment(&req.server_seed, &req.server_seed_hash);
    let (grid, _) = compute_grid(&req.server_seed, &req.client_seed, req.spin_index, &config);
    Ok(Json(VerifyResponse {
        valid: commitment_matches && grid == expected,
        commitment_matches,
        server_seed_hash: derive_hash_hex(req.server_seed.as_bytes()),
        grid: grid.keys(),
    }))
}

async fn route_admin_set_params(
    State(state): State<Arc<AppState>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Json(req): Json<AdminSetParamsRequest>,
) -> Result<StatusCode, AppError> {
    match auth {
        Some(TypedHeader(Authorization(bearer))) if bearer.token() == state.api_key => {}
        _ => return Err(ApiError::Unauthorized.into()),
    }
    if !req.target_rtp.is_finite() {
        return Err(ApiError::Invalid("target_rtp must be finite".into()).into());
    }
    state.engine.write().await.target_rtp = req.target_rtp;
    info!(target_rtp = req.target_rtp, "target rtp updated for new sessions");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/sessions", post(route_start_session))
        .route("/sessions/:id/spin", post(route_spin))
        .route("/sessions/:id/client-seed", put(route_set_client_seed))
        .route("/sessions/:id/end", post(route_end_session))
        .route("/simulate", post(route_simulate))
        .route("/verify", post(route_verify))
        .route("/admin/set-params", post(route_admin_set_params))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn state(limits: SessionLimits) -> Arc<AppState> {
        Arc::new(AppState::new(
            EngineConfig::default(),
            "test-key".into(),
            100.0,
            limits,
        ))
    }

    fn app() -> Router {
        router(state(SessionLimits::default()))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn open(app: &Router, body: Value) -> StartSessionResponse {
        let (status, value) = call(app, "POST", "/sessions", body).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn session_lifecycle_reveals_committed_seed() {
        let app = app();
        let started = open(&app, json!({ "client_seed": "player" })).await;
        assert_eq!(started.client_seed, "player");
        assert_eq!(started.balance, 100.0);

        let uri = format!("/sessions/{}/spin", started.session_id);
        let (status, value) = call(&app, "POST", &uri, json!({ "bet": 1.0 })).await;
        assert_eq!(status, StatusCode::OK);
        let spin: SpinResponse = serde_json::from_value(value).unwrap();
        assert_eq!(spin.first_spin_index, 1);
        assert_eq!(spin.server_seed_hash, started.server_seed_hash);

        let uri = format!("/sessions/{}/end", started.session_id);
        let (status, value) = call(&app, "POST", &uri, Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        let ended: EndSessionResponse = serde_json::from_value(value).unwrap();
        assert!(verify_commitment(&ended.server_seed, &started.server_seed_hash));
        assert_eq!(ended.last_spin_index, spin.last_spin_index);
        assert_eq!(ended.final_balance, spin.balance);

        let (status, value) = call(&app, "POST", "/verify", json!({
            "server_seed": ended.server_seed,
            "server_seed_hash": started.server_seed_hash,
            "client_seed": "player",
            "spin_index": 1,
            "grid": spin.rounds[0].initial_grid,
        }))
        .await;
        assert_eq!(status, StatusCode::OK);
        let verified: VerifyResponse = serde_json::from_value(value).unwrap();
        assert!(verified.valid);

        let (status, _) = call(&app, "POST", &uri, Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn retried_spin_index_is_not_charged_twice() {
        let app = app();
        let started = open(&app, json!({})).await;
        let uri = format!("/sessions/{}/spin", started.session_id);

        let (_, first) = call(&app, "POST", &uri, json!({ "bet": 2.0, "spin_index": 1 })).await;
        let (status, again) = call(&app, "POST", &uri, json!({ "bet": 2.0, "spin_index": 1 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first, again);

        let (status, _) = call(&app, "POST", &uri, json!({ "bet": 2.0, "spin_index": 7 })).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let first: SpinResponse = serde_json::from_value(first).unwrap();
        let next = first.last_spin_index + 1;
        let (status, value) = call(&app, "POST", &uri, json!({ "bet": 2.0, "spin_index": next })).await;
        assert_eq!(status, StatusCode::OK);
        let second: SpinResponse = serde_json::from_value(value).unwrap();
        assert_eq!(second.first_spin_index, next);
    }

    #[tokio::test]
    async fn spin_errors_map_to_status_codes() {
        let app = app();
        let started = open(&app, json!({ "balance": 0.5 })).await;
        let uri = format!("/sessions/{}/spin", started.session_id);

        let (status, value) = call(&app, "POST", &uri, json!({ "bet": 1.0 })).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert!(value["error"].as_str().unwrap().contains("insufficient balance"));

        let (status, _) = call(&app, "POST", &uri, json!({ "bet": -1.0 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, "POST", "/sessions/missing/spin", json!({ "bet": 1.0 })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn client_seed_update_is_validated() {
        let app = app();
        let started = open(&app, json!({})).await;
        let uri = format!("/sessions/{}/client-seed", started.session_id);

        let (status, value) = call(&app, "PUT", &uri, json!({ "client_seed": "fresh" })).await;
        assert_eq!(status, StatusCode::OK);
        let updated: ClientSeedResponse = serde_json::from_value(value).unwrap();
        assert_eq!(updated.client_seed, "fresh");
        assert_eq!(updated.server_seed_hash, started.server_seed_hash);

        let (status, _) = call(&app, "PUT", &uri, json!({ "client_seed": "a|b" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn simulate_is_reproducible_with_fixed_seeds() {
        let app = app();
        let body = json!({
            "trials": 200,
            "server_seed": "00".repeat(32),
            "client_seed": "test",
        });
        let (status, a) = call(&app, "POST", "/simulate", body.clone()).await;
        assert_eq!(status, StatusCode::OK);
        let (_, b) = call(&app, "POST", "/simulate", body).await;
        assert_eq!(a, b);
        assert_eq!(a["trials"], 200);

        let (status, _) = call(&app, "POST", "/simulate", json!({ "trials": 0 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn admin_requires_bearer_key() {
        let app = app();
        let (status, _) = call(&app, "POST", "/admin/set-params", json!({ "target_rtp": 92.0 })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let req = Request::builder()
            .method("POST")
            .uri("/admin/set-params")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, "Bearer test-key")
            .body(Body::from(json!({ "target_rtp": 92.0 }).to_string()))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let started = open(&app, json!({})).await;
        assert_eq!(started.target_rtp, 92.0);
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted() {
        let state = state(SessionLimits {
            idle_timeout: Duration::from_millis(50),
            max_sessions: 100,
        });
        let app = router(state.clone());
        let idle = open(&app, json!({})).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        // opening another session sweeps the idle one
        let fresh = open(&app, json!({})).await;
        assert_eq!(state.sessions.read().await.len(), 1);

        let uri = format!("/sessions/{}/spin", idle.session_id);
        let (status, _) = call(&app, "POST", &uri, json!({ "bet": 1.0 })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let uri = format!("/sessions/{}/spin", fresh.session_id);
        let (status, _) = call(&app, "POST", &uri, json!({ "bet": 1.0 })).await;
        assert_eq!(status, StatusCode::OK);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(state.evict_idle().await, 1);
        assert_eq!(state.sessions.read().await.len(), 0);
    }

    #[tokio::test]
    async fn session_cap_answers_unavailable() {
        let app = router(state(SessionLimits {
            idle_timeout: Duration::from_secs(60),
            max_sessions: 1,
        }));
        open(&app, json!({})).await;
        let (status, value) = call(&app, "POST", "/sessions", json!({})).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(value["error"].as_str().unwrap().contains("too many open sessions"));
    }
}
