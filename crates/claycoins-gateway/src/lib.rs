pub mod connection;
pub mod session;

use std::time::Duration;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use claycoins_engine::Engine;

/// Per-connection socket settings.
#[derive(Debug, Clone, Copy)]
pub struct GatewayConfig {
    /// Time between server Pings. A Ping still unanswered when the next one
    /// is due closes the session.
    pub heartbeat_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(15),
        }
    }
}

#[derive(Clone)]
struct GatewayState {
    engine: Engine,
    config: GatewayConfig,
}

/// The chat socket endpoint.
pub fn router(engine: Engine, config: GatewayConfig) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(GatewayState { engine, config })
}

async fn ws_upgrade(State(state): State<GatewayState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, state.engine, state.config))
}
