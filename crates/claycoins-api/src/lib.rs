pub mod chat;
pub mod error;
pub mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};

use claycoins_engine::Engine;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub engine: Engine,
}

/// All HTTP routes. Transport layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/users", post(users::create_user).patch(users::login))
        .route("/users/id", get(users::get_user_id))
        .route("/users/{user}", get(users::get_user))
        .route("/users/{user}/exists", get(users::username_exists))
        .route("/users/{user}/username", get(users::get_username))
        .route("/users/{user}/currencies", get(users::get_currencies))
        .route("/chat", get(chat::recent_messages).post(chat::post_message))
        .route("/chat/{offset}/{limit}", get(chat::message_range))
        .route("/admin/messages/{message_id}", delete(chat::delete_message))
        .with_state(state)
}

async fn hello() -> &'static str {
    "Hello"
}
