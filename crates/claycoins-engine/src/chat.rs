use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use claycoins_db::models::MessageRow;
use claycoins_types::models::ChatMessage;

use crate::auth::TokenAuthority;
use crate::economy::EconomyEngine;
use crate::error::{EngineError, EngineResult};
use crate::hub::BroadcastHub;
use crate::store::Store;

/// Longest accepted message, in characters, after trimming.
pub const MAX_MESSAGE_LEN: usize = 400;

/// Size of the default chat history page.
pub const RECENT_MESSAGES: u32 = 50;

/// Upper bound on `limit` for range queries.
pub const MAX_PAGE_SIZE: u32 = 200;

pub struct ChatCoordinator {
    store: Store,
    auth: Arc<TokenAuthority>,
    economy: Arc<EconomyEngine>,
    hub: BroadcastHub,
    // Held from id assignment through publish, so the hub sees ids in order
    publish_order: Arc<Mutex<()>>,
}

impl ChatCoordinator {
    pub fn new(
        store: Store,
        auth: Arc<TokenAuthority>,
        economy: Arc<EconomyEngine>,
        hub: BroadcastHub,
    ) -> Self {
        Self {
            store,
            auth,
            economy,
            hub,
            publish_order: Arc::new(Mutex::new(())),
        }
    }

    /// Accept a chat message from the holder of `token`, persist it, credit
    /// shiner progress and broadcast it.
    ///
    /// The cooldown check and the accept happen while holding the sender's
    /// lock, so two simultaneous posts from one user cannot both get
    /// through. A rejected post changes nothing. Once the cooldown check
    /// passes, storing and publishing run to completion on their own task
    /// even if the caller goes away.
    pub async fn post_message(&self, token: &str, content: &str) -> EngineResult<ChatMessage> {
        let sender = self.auth.resolve(token).await?;
        let content = validate_content(content)?;
        let user_id = sender.user_id;

        let guard = self.economy.lock(user_id).await;
        if self.economy.is_on_cooldown(user_id).await? {
            debug!("{} ({}) is on cooldown", sender.username, user_id);
            return Err(EngineError::UserOnCooldown);
        }

        let economy = self.economy.clone();
        let hub = self.hub.clone();
        let order = self.publish_order.clone();
        let accept = tokio::spawn(async move {
            let _order = order.lock_owned().await;
            let (row, _) = economy.on_message_accepted(&guard, content).await?;
            let message = to_message(row);
            hub.publish(message.clone());
            Ok::<_, EngineError>(message)
        });

        let message = accept.await.map_err(|e| {
            error!("Accept task for user {} failed: {}", user_id, e);
            EngineError::PersistenceUnavailable { op: "accept_message" }
        })??;

        info!(
            "{} ({}) posted message {}",
            sender.username, user_id, message.message_id
        );
        Ok(message)
    }

    /// The newest `count` messages, oldest first.
    pub async fn recent(&self, count: u32) -> EngineResult<Vec<ChatMessage>> {
        let count = count.min(MAX_PAGE_SIZE);
        let rows = self
            .store
            .run("recent_messages", move |db| db.recent_messages(count))
            .await?;
        Ok(rows.into_iter().map(to_message).collect())
    }

    /// Up to `limit` messages oldest first, skipping the first `offset`.
    pub async fn range(&self, offset: i64, limit: i64) -> EngineResult<Vec<ChatMessage>> {
        let offset = u32::try_from(offset)
            .map_err(|_| EngineError::malformed("Offset must be a non-negative integer"))?;
        let limit = u32::try_from(limit)
            .map_err(|_| EngineError::malformed("Limit must be a non-negative integer"))?
            .min(MAX_PAGE_SIZE);

        let rows = self
            .store
            .run("messages_range", move |db| db.messages_range(offset, limit))
            .await?;
        Ok(rows.into_iter().map(to_message).collect())
    }

    /// Delete a message. Admin only. Sessions that already received it keep
    /// it; new sessions will not see it replayed.
    pub async fn remove_message(&self, token: &str, message_id: i64) -> EngineResult<()> {
        let caller = self.auth.resolve(token).await?;
        if !caller.is_admin {
            return Err(EngineError::Forbidden);
        }

        let removed = self
            .store
            .run("delete_message", move |db| db.delete_message(message_id))
            .await?;
        if !removed {
            return Err(EngineError::MessageDoesNotExist);
        }

        self.hub.retract(message_id);
        info!("{} ({}) removed message {}", caller.username, caller.user_id, message_id);
        Ok(())
    }
}

fn validate_content(content: &str) -> EngineResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(EngineError::malformed("Message must not be blank"));
    }
    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(EngineError::malformed(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_LEN
        )));
    }
    Ok(content.to_string())
}

fn to_message(row: MessageRow) -> ChatMessage {
    ChatMessage {
        user_id: row.user_id,
        message_id: row.id,
        message: row.content,
        time: row.created_at,
    }
}
