use thiserror::Error;

/// Outcomes of engine operations that are not successes. These are expected
/// results, not crashes; transports map each one to a fixed response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("User already exists")]
    UserAlreadyExists,

    #[error("User does not exist")]
    UserDoesNotExist,

    #[error("Username or password was incorrect")]
    InvalidCredentials,

    #[error("Token not found")]
    TokenNotFound,

    #[error("User on chat cooldown")]
    UserOnCooldown,

    #[error("{0}")]
    MalformedInput(String),

    #[error("Message does not exist")]
    MessageDoesNotExist,

    #[error("Forbidden")]
    Forbidden,

    /// Storage failed or timed out during `op`. Details are logged where the
    /// failure happened.
    #[error("Persistence unavailable during {op}")]
    PersistenceUnavailable { op: &'static str },
}

impl EngineError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
