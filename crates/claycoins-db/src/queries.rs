use crate::Database;
use crate::models::{CurrencyRow, MessageRow, NewUser, UserRow};
use anyhow::Result;
use rusqlite::{Connection, ErrorCode};

impl Database {
    // -- Users --

    /// Create a user together with its currency row, cooldown row and first
    /// token, in one transaction. Returns `None` if the username is taken.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let inserted = tx.execute(
                "INSERT INTO users (username, password, salt) VALUES (?1, ?2, ?3)",
                (user.username, user.password_hash, user.salt),
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
            let id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO currencies (user_id, coin_update_ms) VALUES (?1, ?2)",
                (id, user.coin_update_ms),
            )?;
            tx.execute(
                "INSERT INTO cooldowns (user_id, last_message_ms) VALUES (?1, ?2)",
                (id, user.last_message_ms),
            )?;
            tx.execute(
                "INSERT INTO tokens (token, user_id) VALUES (?1, ?2)",
                (user.token, id),
            )?;

            tx.commit()?;
            Ok(Some(id))
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(
                conn,
                "SELECT id, username, password, salt, admin FROM users WHERE username = ?1",
                username,
            )
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(
                conn,
                "SELECT id, username, password, salt, admin FROM users WHERE id = ?1",
                id,
            )
        })
    }

    pub fn username_exists(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT id FROM users WHERE username = ?1", [username], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Returns false if no such user.
    pub fn set_admin(&self, username: &str, admin: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET admin = ?1 WHERE username = ?2",
                rusqlite::params![admin, username],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Tokens --

    pub fn insert_token(&self, token: &str, user_id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO tokens (token, user_id) VALUES (?1, ?2)",
                rusqlite::params![token, user_id],
            )?;
            Ok(())
        })
    }

    /// Most recently issued token for a user.
    pub fn latest_token(&self, user_id: i64) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT token FROM tokens WHERE user_id = ?1 ORDER BY rowid DESC LIMIT 1",
                [user_id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn resolve_token(&self, token: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(
                conn,
                "SELECT u.id, u.username, u.password, u.salt, u.admin
                 FROM tokens t
                 JOIN users u ON t.user_id = u.id
                 WHERE t.token = ?1",
                token,
            )
        })
    }

    // -- Currencies / cooldowns --

    pub fn get_currencies(&self, user_id: i64) -> Result<Option<CurrencyRow>> {
        self.with_conn(|conn| query_currencies(conn, user_id))
    }

    /// Add `units` coins and move the accrual timestamp to `now_ms`. Returns
    /// the row as written.
    pub fn add_coins(&self, user_id: i64, units: i64, now_ms: i64) -> Result<Option<CurrencyRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE currencies SET coins = coins + ?1, coin_update_ms = ?2 WHERE user_id = ?3",
                rusqlite::params![units, now_ms, user_id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let row = query_currencies(&tx, user_id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_last_message_ms(&self, user_id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT last_message_ms FROM cooldowns WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    // -- Messages --

    /// Store an accepted chat message together with its economy effects:
    /// the shiner state and the restarted cooldown. All three writes commit
    /// or none do. Returns `None` if the user has no currency row.
    pub fn accept_message(
        &self,
        user_id: i64,
        content: &str,
        created_at: i64,
        shiner_progress: u8,
        shiner_delta: f64,
        now_ms: i64,
    ) -> Result<Option<(MessageRow, CurrencyRow)>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE currencies SET shiner_progress = ?1, shiners = shiners + ?2 WHERE user_id = ?3",
                rusqlite::params![shiner_progress, shiner_delta, user_id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            tx.execute(
                "UPDATE cooldowns SET last_message_ms = ?1 WHERE user_id = ?2",
                rusqlite::params![now_ms, user_id],
            )?;
            tx.execute(
                "INSERT INTO messages (user_id, content, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![user_id, content, created_at],
            )?;
            let message = MessageRow {
                id: tx.last_insert_rowid(),
                user_id,
                content: content.to_string(),
                created_at,
            };

            let Some(currencies) = query_currencies(&tx, user_id)? else {
                return Ok(None);
            };
            tx.commit()?;
            Ok(Some((message, currencies)))
        })
    }

    /// The newest `count` messages, oldest first.
    pub fn recent_messages(&self, count: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                "SELECT id, user_id, content, created_at FROM (
                     SELECT id, user_id, content, created_at
                     FROM messages
                     ORDER BY id DESC
                     LIMIT ?1
                 ) ORDER BY id ASC",
                rusqlite::params![count],
            )
        })
    }

    pub fn messages_range(&self, offset: u32, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                "SELECT id, user_id, content, created_at
                 FROM messages
                 ORDER BY id ASC
                 LIMIT ?1 OFFSET ?2",
                rusqlite::params![limit, offset],
            )
        })
    }

    pub fn delete_message(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

fn query_user<P: rusqlite::ToSql>(conn: &Connection, sql: &str, key: P) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(sql)?;

    let row = stmt
        .query_row([key], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                salt: row.get(3)?,
                admin: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_currencies(conn: &Connection, user_id: i64) -> Result<Option<CurrencyRow>> {
    conn.query_row(
        "SELECT user_id, coins, shiners, shiner_progress, coin_update_ms
         FROM currencies WHERE user_id = ?1",
        [user_id],
        |row| {
            Ok(CurrencyRow {
                user_id: row.get(0)?,
                coins: row.get(1)?,
                shiners: row.get(2)?,
                shiner_progress: row.get(3)?,
                coin_update_ms: row.get(4)?,
            })
        },
    )
    .optional()
}

fn query_messages(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(sql)?;

    let rows = stmt
        .query_map(params, |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                content: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
