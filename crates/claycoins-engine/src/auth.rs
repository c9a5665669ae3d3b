use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::SaltString,
};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use claycoins_db::models::{NewUser, UserRow};
use claycoins_types::api::Token;
use claycoins_types::models::{Identity, UserId};

use crate::clock::Clock;
use crate::economy::COOLDOWN_DURATION_MS;
use crate::error::{EngineError, EngineResult};
use crate::store::Store;

pub const MAX_USERNAME_LEN: usize = 50;

/// Issues and resolves session tokens.
pub struct TokenAuthority {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl TokenAuthority {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Sign up. Creates the user, its currency account, its cooldown state
    /// and a first token in one transaction.
    pub async fn create_account(&self, username: &str, password: &str) -> EngineResult<Token> {
        let username = validate_credentials(username, password)?;

        if self.username_exists(&username).await? {
            return Err(EngineError::UserAlreadyExists);
        }

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                warn!("Password hashing failed: {}", e);
                EngineError::PersistenceUnavailable { op: "hash_password" }
            })?
            .to_string();

        let token = generate_token();
        let now = self.clock.now_ms();

        let name = username.clone();
        let tok = token.hashed_token.clone();
        let salt = salt.as_str().to_string();
        let created = self
            .store
            .run("create_user", move |db| {
                db.create_user(&NewUser {
                    username: &name,
                    password_hash: &password_hash,
                    salt: &salt,
                    token: &tok,
                    coin_update_ms: now,
                    // Backdated so a brand-new user may post immediately
                    last_message_ms: now - COOLDOWN_DURATION_MS,
                })
            })
            .await?;

        match created {
            Some(id) => {
                info!("Created account {} ({})", username, id);
                Ok(token)
            }
            // Lost a race with a concurrent signup for the same name
            None => Err(EngineError::UserAlreadyExists),
        }
    }

    /// Log in. Returns the user's current token; tokens are not rotated.
    pub async fn login(&self, username: &str, password: &str) -> EngineResult<Token> {
        let username = username.trim().to_string();
        let user = self.user_by_username(&username).await?;

        let parsed_hash = PasswordHash::new(&user.password).map_err(|e| {
            warn!("Stored hash for {} is unreadable: {}", user.username, e);
            EngineError::PersistenceUnavailable { op: "parse_hash" }
        })?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| EngineError::InvalidCredentials)?;

        let user_id = user.id;
        let existing = self
            .store
            .run("latest_token", move |db| db.latest_token(user_id))
            .await?;

        match existing {
            Some(token) => Ok(Token::new(token)),
            None => {
                let token = generate_token();
                let tok = token.hashed_token.clone();
                self.store
                    .run("insert_token", move |db| db.insert_token(&tok, user_id))
                    .await?;
                info!("Issued replacement token for {} ({})", user.username, user_id);
                Ok(token)
            }
        }
    }

    pub async fn resolve(&self, token: &str) -> EngineResult<Identity> {
        let token = token.to_string();
        self.store
            .run("resolve_token", move |db| db.resolve_token(&token))
            .await?
            .map(identity)
            .ok_or(EngineError::TokenNotFound)
    }

    pub async fn username_exists(&self, username: &str) -> EngineResult<bool> {
        let username = username.to_string();
        self.store
            .run("username_exists", move |db| db.username_exists(&username))
            .await
    }

    pub async fn user(&self, user_id: UserId) -> EngineResult<Identity> {
        self.store
            .run("get_user_by_id", move |db| db.get_user_by_id(user_id))
            .await?
            .map(identity)
            .ok_or(EngineError::UserDoesNotExist)
    }

    /// Grant or revoke admin. The admin flag is the only part of a user that
    /// changes after signup.
    pub async fn set_admin(&self, username: &str, admin: bool) -> EngineResult<()> {
        let name = username.to_string();
        let changed = self
            .store
            .run("set_admin", move |db| db.set_admin(&name, admin))
            .await?;
        if !changed {
            return Err(EngineError::UserDoesNotExist);
        }
        info!("Admin flag for {} set to {}", username, admin);
        Ok(())
    }

    async fn user_by_username(&self, username: &str) -> EngineResult<UserRow> {
        let name = username.to_string();
        self.store
            .run("get_user_by_username", move |db| db.get_user_by_username(&name))
            .await?
            .ok_or(EngineError::UserDoesNotExist)
    }
}

fn identity(row: UserRow) -> Identity {
    Identity {
        user_id: row.id,
        username: row.username,
        is_admin: row.admin,
    }
}

fn validate_credentials(username: &str, password: &str) -> EngineResult<String> {
    let username = username.trim();
    if username.is_empty() {
        return Err(EngineError::malformed("Username must not be blank"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(EngineError::malformed(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if password.is_empty() {
        return Err(EngineError::malformed("Password must not be blank"));
    }
    Ok(username.to_string())
}

/// 256 bits from the OS CSPRNG, hashed and hex encoded.
fn generate_token() -> Token {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    Token::new(hex::encode(Sha256::digest(seed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Engine, ManualClock};

    fn engine() -> Engine {
        Engine::in_memory(Arc::new(ManualClock::new(1_000_000))).unwrap()
    }

    #[tokio::test]
    async fn signup_then_resolve() {
        let engine = engine();
        let token = engine.auth.create_account("clay", "pass0").await.unwrap();
        assert_eq!(token.as_str().len(), 64);

        let who = engine.auth.resolve(token.as_str()).await.unwrap();
        assert_eq!(who.username, "clay");
        assert!(!who.is_admin);
        assert_eq!(engine.auth.user(who.user_id).await.unwrap(), who);
    }

    #[tokio::test]
    async fn duplicate_signup_is_rejected() {
        let engine = engine();
        engine.auth.create_account("clay", "pass0").await.unwrap();
        assert_eq!(
            engine.auth.create_account("clay", "other").await,
            Err(EngineError::UserAlreadyExists)
        );
    }

    #[tokio::test]
    async fn login_returns_existing_token() {
        let engine = engine();
        let signup = engine.auth.create_account("clay", "pass0").await.unwrap();
        let login = engine.auth.login("clay", "pass0").await.unwrap();
        assert_eq!(signup, login);
    }

    #[tokio::test]
    async fn login_failures() {
        let engine = engine();
        engine.auth.create_account("clay", "pass0").await.unwrap();
        assert_eq!(
            engine.auth.login("clay", "wrong").await,
            Err(EngineError::InvalidCredentials)
        );
        assert_eq!(
            engine.auth.login("nobody", "pass0").await,
            Err(EngineError::UserDoesNotExist)
        );
    }

    #[tokio::test]
    async fn tokens_are_not_derived_from_identity() {
        // Same username on two fresh databases gets the same id, so a
        // derived token would collide.
        let a = engine().auth.create_account("clay", "p").await.unwrap();
        let b = engine().auth.create_account("clay", "p").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn unknown_token() {
        assert_eq!(
            engine().auth.resolve("nope").await,
            Err(EngineError::TokenNotFound)
        );
    }

    #[tokio::test]
    async fn blank_credentials_are_malformed() {
        let engine = engine();
        assert!(matches!(
            engine.auth.create_account("   ", "p").await,
            Err(EngineError::MalformedInput(_))
        ));
        assert!(matches!(
            engine.auth.create_account("clay", "").await,
            Err(EngineError::MalformedInput(_))
        ));
    }

    #[tokio::test]
    async fn admin_flag() {
        let engine = engine();
        let token = engine.auth.create_account("clay", "p").await.unwrap();
        engine.auth.set_admin("clay", true).await.unwrap();
        assert!(engine.auth.resolve(token.as_str()).await.unwrap().is_admin);
        assert_eq!(
            engine.auth.set_admin("nobody", true).await,
            Err(EngineError::UserDoesNotExist)
        );
    }
}
