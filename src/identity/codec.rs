//! Stateless signed-token codec.
//!
//! A token is `base64url(claims-json) "." base64url(hmac-sha256(payload))`,
//! keyed with the process-wide secret and safe for header transport. Any
//! structural or cryptographic mismatch verifies as `InvalidSignature`; a
//! well-formed token signed with a different secret never yields claims.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// Purpose tag embedded in every authentication token.
pub const AUTH_PURPOSE: &str = "auth";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
#[error("invalid token signature")]
pub struct InvalidSignature;

/// Signed payload: the owning principal, the purpose tag and the issue time
/// in epoch milliseconds. `iat` keeps tokens from separate logins distinct;
/// nothing expires on its own, revocation is the only termination path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub id: String,
    pub purpose: String,
    pub iat: i64,
}

#[derive(Clone)]
pub struct TokenCodec {
    key: Vec<u8>,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        Self { key: secret.as_bytes().to_vec() }
    }

    pub fn issue(&self, principal_id: &str, purpose: &str) -> String {
        let claims = Claims {
            id: principal_id.to_string(),
            purpose: purpose.to_string(),
            iat: chrono::Utc::now().timestamp_millis(),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).expect("claims serialize"));
        let sig = URL_SAFE_NO_PAD.encode(self.mac(payload.as_bytes()));
        format!("{payload}.{sig}")
    }

    pub fn verify(&self, token: &str) -> Result<Claims, InvalidSignature> {
        let (payload, sig) = token.split_once('.').ok_or(InvalidSignature)?;
        let sig = URL_SAFE_NO_PAD.decode(sig).map_err(|_| InvalidSignature)?;
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(payload.as_bytes());
        // Constant-time comparison
        mac.verify_slice(&sig).map_err(|_| InvalidSignature)?;
        let raw = URL_SAFE_NO_PAD.decode(payload).map_err(|_| InvalidSignature)?;
        serde_json::from_slice(&raw).map_err(|_| InvalidSignature)
    }

    fn mac(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_verify_roundtrip() {
        let codec = TokenCodec::new("s3cr3t");
        let token = codec.issue("user-1", AUTH_PURPOSE);
        let claims = codec.verify(&token).expect("verify");
        assert_eq!(claims.id, "user-1");
        assert_eq!(claims.purpose, AUTH_PURPOSE);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let codec = TokenCodec::new("s3cr3t");
        let token = codec.issue("user-1", AUTH_PURPOSE);
        let (payload, sig) = token.split_once('.').expect("two parts");
        // Substitute a different but well-formed payload under the old signature
        let forged_claims = Claims { id: "user-2".into(), purpose: AUTH_PURPOSE.into(), iat: 0 };
        let forged = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).expect("json"));
        assert_ne!(forged, payload);
        assert!(codec.verify(&format!("{forged}.{sig}")).is_err());
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let ours = TokenCodec::new("s3cr3t");
        let theirs = TokenCodec::new("other-secret");
        let token = theirs.issue("user-1", AUTH_PURPOSE);
        assert!(ours.verify(&token).is_err());
    }

    #[test]
    fn structural_garbage_is_rejected() {
        let codec = TokenCodec::new("s3cr3t");
        assert!(codec.verify("").is_err());
        assert!(codec.verify("no-dot-here").is_err());
        assert!(codec.verify("two.dots.here").is_err());
        assert!(codec.verify("!!!.???").is_err());
    }
}
