use std::sync::Arc;
use std::time::Duration;

use claycoins_db::Database;
use tracing::error;

use crate::error::{EngineError, EngineResult};

/// Bridge from async engine code to the blocking SQLite layer. Every call
/// runs on the blocking pool and is bounded by `timeout`.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
    timeout: Duration,
}

impl Store {
    pub fn new(db: Arc<Database>, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    pub async fn run<T, F>(&self, op: &'static str, f: F) -> EngineResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let task = tokio::task::spawn_blocking(move || f(&db));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => {
                error!("DB {} error: {:#}", op, e);
                Err(EngineError::PersistenceUnavailable { op })
            }
            Ok(Err(e)) => {
                error!("spawn_blocking join error in {}: {}", op, e);
                Err(EngineError::PersistenceUnavailable { op })
            }
            Err(_) => {
                error!("DB {} timed out after {:?}", op, self.timeout);
                Err(EngineError::PersistenceUnavailable { op })
            }
        }
    }
}
