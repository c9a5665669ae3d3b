use serde::{Deserialize, Serialize};

/// Server-assigned user identifier (SQLite rowid).
pub type UserId = i64;

/// Snapshot of a user's balances as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyAccount {
    pub coins: i64,
    pub shiners: f64,
    /// Wall-clock ms of the last accrual write. Clients use it to animate
    /// progress toward the next coin.
    pub coin_update_time_ms: i64,
    pub shiner_progress: u8,
}

/// A persisted chat message. `time` is epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub user_id: UserId,
    pub message_id: i64,
    pub message: String,
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub username: String,
    pub id: UserId,
    pub user_currencies: CurrencyAccount,
    pub admin: bool,
}

/// Who a token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
    pub is_admin: bool,
}
