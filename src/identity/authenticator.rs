use crate::error::{AppError, AppResult};
use crate::storage::SharedStore;

use super::codec::TokenCodec;
use super::principal::Principal;

/// Resolves a raw token string to the principal that owns it.
///
/// Read-only. Validity requires both a verifying signature and the exact
/// token string being present in the principal's current token sequence with
/// a matching purpose. Every failure collapses to the same error kind so a
/// caller cannot tell an unknown user from a revoked token or a bad
/// signature.
#[derive(Clone)]
pub struct Authenticator {
    store: SharedStore,
    codec: TokenCodec,
}

impl Authenticator {
    pub fn new(store: SharedStore, codec: TokenCodec) -> Self {
        Self { store, codec }
    }

    pub async fn resolve(&self, token: &str) -> AppResult<Principal> {
        let claims = self.codec.verify(token).map_err(|_| unauthenticated())?;
        let store = self.store.0.read().await;
        let principal = store.user_by_id(&claims.id).ok_or_else(unauthenticated)?;
        if !principal.has_token(&claims.purpose, token) {
            return Err(unauthenticated());
        }
        Ok(principal.clone())
    }
}

fn unauthenticated() -> AppError {
    AppError::auth("unauthenticated", "authentication required")
}
