use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use claycoins_engine::EngineError;
use claycoins_types::api::{AuthRequest, TokenQuery};
use claycoins_types::models::UserData;

use crate::AppState;
use crate::error::{ApiError, ApiResult, parse_path_int};

const BAD_ID_PATH: &str = "Path parameter id must be an integer";

/// POST /users: sign up, answers 201 with the new token.
pub async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<AuthRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    let token = state
        .engine
        .auth
        .create_account(&req.username, &req.password)
        .await?;
    Ok((StatusCode::CREATED, Json(token)))
}

/// PATCH /users: log in, answers with the user's token.
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<AuthRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    let token = state.engine.auth.login(&req.username, &req.password).await?;
    info!("Token retrieved for user {}", req.username.trim());
    Ok(Json(token))
}

/// GET /users/id?token=...: plain-text user id for a token.
pub async fn get_user_id(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<String> {
    let token = query
        .token
        .ok_or_else(|| ApiError(EngineError::malformed("Parameter \"token\" not found")))?;
    let who = state.engine.auth.resolve(&token).await?;
    Ok(who.user_id.to_string())
}

/// GET /users/{username}/exists: 409 if taken, 200 if free.
pub async fn username_exists(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let exists = state.engine.auth.username_exists(&username).await?;
    Ok(if exists {
        (StatusCode::CONFLICT, "Username already exists")
    } else {
        (StatusCode::OK, "Username does not exist")
    })
}

/// GET /users/{id}/username
pub async fn get_username(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<String> {
    let id = parse_path_int(&id, BAD_ID_PATH)?;
    Ok(state.engine.auth.user(id).await?.username)
}

/// GET /users/{id}/currencies: stored balances, without settling accrual.
pub async fn get_currencies(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_path_int(&id, BAD_ID_PATH)?;
    Ok(Json(state.engine.economy.get_currencies(id).await?))
}

/// GET /users/{id}: full profile. Settles claycoin accrual first.
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_path_int(&id, BAD_ID_PATH)?;
    let user_currencies = state.engine.economy.accrue(id).await?;
    let user = state.engine.auth.user(id).await?;

    Ok(Json(UserData {
        username: user.username,
        id,
        user_currencies,
        admin: user.is_admin,
    }))
}
