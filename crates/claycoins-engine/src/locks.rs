use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use claycoins_types::models::UserId;

/// One async mutex per user. Holding a user's guard is what makes a
/// read-check-write sequence on that user's rows linearizable; different
/// users never wait on each other.
#[derive(Default)]
pub struct UserLocks {
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

/// Proof that the holder has exclusive access to one user's economy state.
pub struct UserGuard {
    user_id: UserId,
    _guard: OwnedMutexGuard<()>,
}

impl UserGuard {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user_id: UserId) -> UserGuard {
        // Clone the Arc out so the map shard is not held across the await
        let mutex = self
            .locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        UserGuard {
            user_id,
            _guard: mutex.lock_owned().await,
        }
    }
}
