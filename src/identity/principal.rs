use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single issued credential held by a principal: the purpose it serves and
/// the exact signed string. Insertion order is kept; the last entry is the
/// most recently issued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenEntry {
    pub purpose: String,
    pub token: String,
}

/// An authenticated user account as persisted in the credential store.
///
/// The password is stored only as an Argon2 PHC hash. A principal may hold
/// zero or more simultaneously valid tokens (multi-device).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
}

/// Client-facing projection of a principal. The password hash and the token
/// sequence never leave the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicPrincipal {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
}

impl Principal {
    pub fn new(email: &str, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash,
            tokens: Vec::new(),
        }
    }

    /// True when the exact token string is present with a matching purpose.
    pub fn has_token(&self, purpose: &str, token: &str) -> bool {
        self.tokens.iter().any(|t| t.purpose == purpose && t.token == token)
    }

    pub fn to_public(&self) -> PublicPrincipal {
        PublicPrincipal { id: self.id.clone(), email: self.email.clone() }
    }
}
