use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::security;
use crate::storage::{SharedStore, StoreError};

use super::codec::{TokenCodec, AUTH_PURPOSE};
use super::principal::{Principal, TokenEntry};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex")
});

const MIN_PASSWORD_LEN: usize = 6;

/// Issues tokens on registration and login, revokes one on logout.
///
/// Holds no state of its own; all durable state lives in the store, and each
/// operation runs under a single store lock so a token-sequence mutation is
/// atomic per principal.
#[derive(Clone)]
pub struct SessionManager {
    store: SharedStore,
    codec: TokenCodec,
}

impl SessionManager {
    pub fn new(store: SharedStore, codec: TokenCodec) -> Self {
        Self { store, codec }
    }

    /// Create a principal and issue its first token.
    ///
    /// Duplicate email registration fails with a validation error, never
    /// silently overwrites.
    pub async fn register(&self, email: &str, password: &str) -> AppResult<(Principal, String)> {
        if !EMAIL_RE.is_match(email) {
            return Err(AppError::validation("invalid_email", "not a well-formed email address"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation("weak_password", "password must be at least 6 characters"));
        }
        let hash = security::hash_password(password)
            .map_err(|e| AppError::internal("hash_failed", e.to_string()))?;
        let mut principal = Principal::new(email, hash);
        let token = self.codec.issue(&principal.id, AUTH_PURPOSE);
        principal.tokens.push(TokenEntry { purpose: AUTH_PURPOSE.into(), token: token.clone() });

        let mut store = self.store.0.write().await;
        match store.insert_user(principal.clone()) {
            Ok(()) => {}
            Err(StoreError::DuplicateEmail) => {
                return Err(AppError::validation("email_taken", "email already registered"));
            }
            Err(StoreError::Io(e)) => {
                return Err(AppError::internal("store_failed", e.to_string()));
            }
        }
        info!(user = %principal.id, "session.register");
        Ok((principal, token))
    }

    /// Authenticate by email and password and issue a fresh token.
    ///
    /// Unknown email and wrong password surface as the same error kind.
    /// Previously issued tokens stay valid (concurrent sessions).
    pub async fn login(&self, email: &str, password: &str) -> AppResult<(Principal, String)> {
        let mut store = self.store.0.write().await;
        let Some(user) = store.user_by_email(email).cloned() else {
            return Err(invalid_credentials());
        };
        if !security::verify_password(&user.password_hash, password) {
            return Err(invalid_credentials());
        }
        let token = self.codec.issue(&user.id, AUTH_PURPOSE);
        let entry = TokenEntry { purpose: AUTH_PURPOSE.into(), token: token.clone() };
        let principal = store
            .push_token(&user.id, entry)
            .map_err(|e| AppError::internal("store_failed", e.to_string()))?;
        info!(user = %principal.id, "session.login");
        Ok((principal, token))
    }

    /// Remove exactly the matching token entry. Removing a token that is
    /// already absent still reports success (double-logout is not an error).
    pub async fn logout(&self, principal_id: &str, token: &str) -> AppResult<()> {
        let mut store = self.store.0.write().await;
        store
            .pull_token(principal_id, token)
            .map_err(|e| AppError::internal("store_failed", e.to_string()))?;
        info!(user = %principal_id, "session.logout");
        Ok(())
    }
}

fn invalid_credentials() -> AppError {
    AppError::credentials("invalid_credentials", "invalid email or password")
}
