use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use claycoins_engine::EngineError;
use claycoins_engine::chat::RECENT_MESSAGES;
use claycoins_types::api::{MessageContainer, TokenQuery};

use crate::AppState;
use crate::error::{ApiError, ApiResult, parse_path_int};

/// GET /chat: the latest messages, oldest first.
pub async fn recent_messages(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.chat.recent(RECENT_MESSAGES).await?))
}

/// GET /chat/{offset}/{limit}
pub async fn message_range(
    State(state): State<AppState>,
    Path((offset, limit)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    const BAD_RANGE: &str = "Offset or limit are not integers";
    let offset = parse_path_int(&offset, BAD_RANGE)?;
    let limit = parse_path_int(&limit, BAD_RANGE)?;
    Ok(Json(state.engine.chat.range(offset, limit).await?))
}

/// POST /chat: same as a WebSocket post, answered over HTTP.
pub async fn post_message(
    State(state): State<AppState>,
    body: Result<Json<MessageContainer>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    let message = state
        .engine
        .chat
        .post_message(req.token.as_str(), &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// DELETE /admin/messages/{message_id}?token=...: admin only.
pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<StatusCode> {
    let message_id = parse_path_int(&message_id, "Path parameter id must be an integer")?;
    let token = query
        .token
        .ok_or_else(|| ApiError(EngineError::malformed("Parameter \"token\" not found")))?;
    state.engine.chat.remove_message(&token, message_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
