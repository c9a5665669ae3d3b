//! Economy and chat coordination engine.
//!
//! Owns the rules of the system: token issuance, lazy claycoin accrual,
//! shiner progression, per-user chat cooldown, and fan-out of accepted chat
//! messages to live sessions. Transports (HTTP, WebSocket) sit on top and
//! only translate between wire frames and these calls.

pub mod auth;
pub mod chat;
pub mod clock;
pub mod economy;
pub mod error;
pub mod hub;
pub mod locks;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use claycoins_db::Database;

pub use auth::TokenAuthority;
pub use chat::ChatCoordinator;
pub use clock::{Clock, ManualClock, SystemClock};
pub use economy::EconomyEngine;
pub use error::{EngineError, EngineResult};
pub use hub::{BroadcastHub, Subscription};

/// Tunables that are not part of the economy rules themselves.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on any single storage call.
    pub db_timeout: Duration,
    /// Per-subscriber outbound queue length before the subscriber is dropped.
    pub subscriber_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_timeout: Duration::from_secs(5),
            subscriber_buffer: 256,
        }
    }
}

/// All engine components, wired together. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    pub auth: Arc<TokenAuthority>,
    pub economy: Arc<EconomyEngine>,
    pub chat: Arc<ChatCoordinator>,
    pub hub: BroadcastHub,
}

impl Engine {
    pub fn new(db: Database, clock: Arc<dyn Clock>, config: &EngineConfig) -> Self {
        let store = store::Store::new(Arc::new(db), config.db_timeout);
        let hub = BroadcastHub::new(config.subscriber_buffer);
        let auth = Arc::new(TokenAuthority::new(store.clone(), clock.clone()));
        let economy = Arc::new(EconomyEngine::new(store.clone(), clock));
        let chat = Arc::new(ChatCoordinator::new(
            store,
            auth.clone(),
            economy.clone(),
            hub.clone(),
        ));

        Self {
            auth,
            economy,
            chat,
            hub,
        }
    }

    /// Engine over a fresh in-memory database, driven by `clock`.
    pub fn in_memory(clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        Ok(Self::new(Database::open_in_memory()?, clock, &EngineConfig::default()))
    }
}
