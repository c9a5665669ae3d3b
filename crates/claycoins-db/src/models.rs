//! Database row types. These map directly to SQLite rows and stay
//! separate from the claycoins-types wire models.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub salt: String,
    pub admin: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyRow {
    pub user_id: i64,
    pub coins: i64,
    pub shiners: f64,
    pub shiner_progress: u8,
    pub coin_update_ms: i64,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    /// Epoch seconds.
    pub created_at: i64,
}

/// Everything written when an account is created.
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub salt: &'a str,
    pub token: &'a str,
    pub coin_update_ms: i64,
    pub last_message_ms: i64,
}
