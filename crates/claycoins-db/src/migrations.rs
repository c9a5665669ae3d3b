use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            salt        TEXT NOT NULL,
            admin       INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS tokens (
            token       TEXT PRIMARY KEY,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_tokens_user
            ON tokens(user_id);

        CREATE TABLE IF NOT EXISTS currencies (
            user_id          INTEGER PRIMARY KEY REFERENCES users(id),
            coins            INTEGER NOT NULL DEFAULT 0,
            shiners          REAL NOT NULL DEFAULT 0,
            shiner_progress  INTEGER NOT NULL DEFAULT 0
                CHECK (shiner_progress BETWEEN 0 AND 4),
            coin_update_ms   INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS cooldowns (
            user_id          INTEGER PRIMARY KEY REFERENCES users(id),
            last_message_ms  INTEGER NOT NULL
        );

        -- AUTOINCREMENT so a deleted message id is never handed out again
        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            created_at  INTEGER NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
