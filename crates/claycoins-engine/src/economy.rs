use std::sync::Arc;

use tracing::debug;

use claycoins_db::models::{CurrencyRow, MessageRow};
use claycoins_types::models::{CurrencyAccount, UserId};

use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};
use crate::locks::{UserGuard, UserLocks};
use crate::store::Store;

/// One claycoin becomes due per interval of elapsed wall-clock time.
pub const ACCRUAL_INTERVAL_MS: i64 = 10_000;

/// Minimum spacing between a user's accepted chat messages.
pub const COOLDOWN_DURATION_MS: i64 = 10_000;

/// Shiners earned each time shiner progress wraps around.
pub const SHINER_INCREMENT: f64 = 0.1;

/// Accepted messages per shiner payout. Progress cycles `0..SHINER_CYCLE`.
pub const SHINER_CYCLE: u8 = 5;

/// Claycoin accrual, shiner progression and chat cooldown.
///
/// Accrual is lazy: nothing runs in the background, coins owed for the idle
/// period are settled when the account is next read through [`accrue`].
///
/// [`accrue`]: EconomyEngine::accrue
pub struct EconomyEngine {
    store: Store,
    clock: Arc<dyn Clock>,
    locks: UserLocks,
}

impl EconomyEngine {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            locks: UserLocks::new(),
        }
    }

    /// Take exclusive access to one user's economy state.
    pub async fn lock(&self, user_id: UserId) -> UserGuard {
        self.locks.lock(user_id).await
    }

    /// Plain snapshot, no accrual.
    pub async fn get_currencies(&self, user_id: UserId) -> EngineResult<CurrencyAccount> {
        self.snapshot(user_id).await.map(to_account)
    }

    /// Settle claycoins owed since the last accrual and return the account.
    ///
    /// The accrual timestamp moves to `now`, not forward by whole intervals,
    /// so the remainder of a partial interval is forfeited on every paying
    /// read.
    pub async fn accrue(&self, user_id: UserId) -> EngineResult<CurrencyAccount> {
        let _guard = self.lock(user_id).await;

        let row = self.snapshot(user_id).await?;
        let now = self.clock.now_ms();
        let units = (now - row.coin_update_ms).max(0) / ACCRUAL_INTERVAL_MS;
        if units == 0 {
            return Ok(to_account(row));
        }

        let row = self
            .store
            .run("add_coins", move |db| db.add_coins(user_id, units, now))
            .await?
            .ok_or(EngineError::UserDoesNotExist)?;

        debug!("User {} accrued {} claycoins (total {})", user_id, units, row.coins);
        Ok(to_account(row))
    }

    pub async fn is_on_cooldown(&self, user_id: UserId) -> EngineResult<bool> {
        let last = self
            .store
            .run("get_last_message_ms", move |db| db.get_last_message_ms(user_id))
            .await?
            .ok_or(EngineError::UserDoesNotExist)?;

        Ok(self.clock.now_ms() - last < COOLDOWN_DURATION_MS)
    }

    /// Record an accepted chat message: store it, advance shiner progress
    /// (paying out on wrap) and restart the cooldown, all in one storage
    /// transaction. Either everything lands or nothing does.
    pub async fn on_message_accepted(
        &self,
        guard: &UserGuard,
        content: String,
    ) -> EngineResult<(MessageRow, CurrencyAccount)> {
        let user_id = guard.user_id();
        let row = self.snapshot(user_id).await?;

        let (progress, shiner_delta) = advance_progress(row.shiner_progress);
        let now = self.clock.now_ms();
        let created_at = self.clock.now_secs();

        let (message, row) = self
            .store
            .run("accept_message", move |db| {
                db.accept_message(user_id, &content, created_at, progress, shiner_delta, now)
            })
            .await?
            .ok_or(EngineError::UserDoesNotExist)?;

        if shiner_delta > 0.0 {
            debug!("User {} earned a shiner increment (total {:.1})", user_id, row.shiners);
        }
        Ok((message, to_account(row)))
    }

    async fn snapshot(&self, user_id: UserId) -> EngineResult<CurrencyRow> {
        self.store
            .run("get_currencies", move |db| db.get_currencies(user_id))
            .await?
            .ok_or(EngineError::UserDoesNotExist)
    }
}

/// Next shiner progress and the shiners earned by reaching it.
fn advance_progress(progress: u8) -> (u8, f64) {
    let next = (progress + 1) % SHINER_CYCLE;
    let earned = if next == 0 { SHINER_INCREMENT } else { 0.0 };
    (next, earned)
}

fn to_account(row: CurrencyRow) -> CurrencyAccount {
    CurrencyAccount {
        coins: row.coins,
        shiners: row.shiners,
        coin_update_time_ms: row.coin_update_ms,
        shiner_progress: row.shiner_progress,
    }
}
