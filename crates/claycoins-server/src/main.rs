mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use claycoins_api::AppStateInner;
use claycoins_engine::{Engine, EngineError, SystemClock};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "claycoins=debug,claycoins_engine=debug,claycoins_gateway=debug,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database and engine
    let db = claycoins_db::Database::open(&config.db_path)?;
    let engine = Engine::new(db, Arc::new(SystemClock), &config.engine);

    for name in &config.admins {
        match engine.auth.set_admin(name, true).await {
            Ok(()) => {}
            Err(EngineError::UserDoesNotExist) => {
                warn!("CLAYCOINS_ADMINS names unknown user {}, skipping", name)
            }
            Err(e) => return Err(e.into()),
        }
    }

    let app = Router::new()
        .merge(claycoins_api::router(Arc::new(AppStateInner {
            engine: engine.clone(),
        })))
        .merge(claycoins_gateway::router(engine, config.gateway))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Claycoins server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
