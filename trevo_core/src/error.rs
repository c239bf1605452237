/// Failures surfaced to the caller of the engine.
///
/// All of these are local and recoverable. A rejected spin leaves the session
/// untouched.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("insufficient balance: spin costs {cost}, balance is {balance}")]
    InsufficientBalance { balance: f64, cost: f64 },
    #[error("invalid seed material: {0}")]
    InvalidSeedMaterial(String),
    #[error("invalid bet: {0}")]
    InvalidBet(f64),
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
