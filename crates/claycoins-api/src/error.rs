use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::debug;

use claycoins_engine::EngineError;

/// HTTP face of [`EngineError`]: one fixed status and a short text body per
/// outcome.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected JSON body: {}", rejection.body_text());
        Self(EngineError::malformed("Malformed json input"))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            EngineError::UserAlreadyExists => StatusCode::CONFLICT,
            EngineError::UserDoesNotExist => StatusCode::NOT_FOUND,
            EngineError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            EngineError::TokenNotFound => StatusCode::NOT_FOUND,
            EngineError::UserOnCooldown => StatusCode::FORBIDDEN,
            EngineError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            EngineError::MessageDoesNotExist => StatusCode::NOT_FOUND,
            EngineError::Forbidden => StatusCode::FORBIDDEN,
            EngineError::PersistenceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self.0 {
            // Storage details were logged where they happened
            EngineError::PersistenceUnavailable { .. } => "Service unavailable".to_string(),
            other => other.to_string(),
        };
        (self.status(), body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Parse a numeric path segment, answering 400 with `msg` otherwise.
pub fn parse_path_int(raw: &str, msg: &str) -> ApiResult<i64> {
    raw.parse().map_err(|_| ApiError(EngineError::malformed(msg)))
}
