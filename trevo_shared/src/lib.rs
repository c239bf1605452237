use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Grids travel as symbol keys, row by row (`"A"`, `"S"`, `"CLO"`, ...).
pub type GridKeys = Vec<Vec<String>>;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StartSessionRequest {
    #[serde(default)]
    pub client_seed: Option<String>,
    /// Starting balance; the server default applies when absent.
    #[serde(default)]
    pub balance: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub balance: f64,
    pub target_rtp: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpinRequest {
    pub bet: f64,
    /// Index the first round of this call must use. Replaying the index of
    /// the previous call returns its response again without charging.
    #[serde(default)]
    pub spin_index: Option<u64>,
    #[serde(default)]
    pub auto_spins: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RoundDto {
    pub spin_index: u64,
    pub free_spin: bool,
    pub cost: f64,
    pub initial_grid: GridKeys,
    pub final_grid: GridKeys,
    pub scatter_count: usize,
    pub cascade_count: usize,
    pub capped: bool,
    pub cluster_win: f64,
    pub luck_credit: f64,
    pub rainbow_credit: f64,
    pub pot_credit: f64,
    pub total_win: f64,
    pub free_spins_awarded: u32,
    pub gold_triggered: bool,
    pub balance_after: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SpinResponse {
    pub session_id: String,
    pub server_seed_hash: String,
    pub first_spin_index: u64,
    pub last_spin_index: u64,
    pub rounds: Vec<RoundDto>,
    pub total_win: f64,
    pub final_grid: GridKeys,
    pub free_spins_remaining: u32,
    pub cascade_count: usize,
    pub balance: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SetClientSeedRequest {
    pub client_seed: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClientSeedResponse {
    pub server_seed_hash: String,
    pub client_seed: String,
    pub spin_index: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EndSessionResponse {
    pub session_id: String,
    pub server_seed: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub last_spin_index: u64,
    pub final_balance: f64,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SimulateRequest {
    pub trials: u64,
    #[serde(default)]
    pub target_rtp: Option<f64>,
    #[serde(default)]
    pub bet: Option<f64>,
    /// Random seeds are used when absent.
    #[serde(default)]
    pub server_seed: Option<String>,
    #[serde(default)]
    pub client_seed: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SimulateResponse {
    pub trials: u64,
    pub target_rtp: f64,
    pub total_bet: f64,
    pub total_win: f64,
    pub empirical_rtp: f64,
    pub hit_rate_percent: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifyRequest {
    pub server_seed: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub spin_index: u64,
    #[serde(default)]
    pub target_rtp: Option<f64>,
    pub grid: GridKeys,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifyResponse {
    pub valid: bool,
    pub commitment_matches: bool,
    pub server_seed_hash: String,
    /// The initial grid those seeds produce.
    pub grid: GridKeys,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminSetParamsRequest {
    pub target_rtp: f64,
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("session not found")]
    NotFound,
    #[error("insufficient balance: {balance} < {cost}")]
    InsufficientBalance { balance: f64, cost: f64 },
    #[error("unauthorized")]
    Unauthorized,
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("internal server error")]
    Internal,
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_default_to_none() {
        let req: SpinRequest = serde_json::from_str(r#"{"bet": 1.5}"#).unwrap();
        assert_eq!(req.bet, 1.5);
        assert!(req.spin_index.is_none());
        assert!(req.auto_spins.is_none());

        let req: StartSessionRequest = serde_json::from_str("{}").unwrap();
        assert!(req.client_seed.is_none());
        assert!(req.balance.is_none());
    }

    #[test]
    fn error_messages() {
        assert_eq!(ApiError::NotFound.to_string(), "session not found");
        assert_eq!(
            ApiError::Unavailable("too many open sessions".into()).to_string(),
            "service unavailable: too many open sessions"
        );
        assert_eq!(
            ApiError::Invalid("bet".into()).to_string(),
            "invalid request: bet"
        );
    }
}
