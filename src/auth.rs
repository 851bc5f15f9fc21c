//! Password hashing, signed bearer tokens and the request identity extractor.
//!
//! Tokens are `base64url(claims JSON) . hex(HMAC-SHA256(payload))`. The
//! claims carry the subject id plus the leader/admin flags so role checks
//! never need a store round trip.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::error::ApiError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Malformed token")]
    Malformed,

    #[error("Invalid token signature")]
    BadSignature,

    #[error("Token expired")]
    Expired,
}

/// Identity claims carried inside a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub leader: bool,
    pub admin: bool,
    /// Expiry as unix seconds.
    pub exp: i64,
}

// =============================================================================
// Passwords
// =============================================================================

/// HMAC-SHA256 keyed by a random salt, stored as `salt$hexdigest`.
///
/// One round only: there is no work factor, so a leaked table is cheap to
/// brute-force. Swapping in a slow KDF means a new stored prefix and a
/// rehash on next login.
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let digest = password_mac(&salt, password)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default();
    format!("{}${}", salt, digest)
}

/// Compares in constant time through `Mac::verify_slice`.
pub fn verify_password(stored: &str, candidate: &str) -> bool {
    let Some((salt, digest)) = stored.split_once('$') else {
        return false;
    };
    let Ok(expected) = hex::decode(digest) else {
        return false;
    };
    match password_mac(salt, candidate) {
        Some(mac) => mac.verify_slice(&expected).is_ok(),
        None => false,
    }
}

fn password_mac(salt: &str, password: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(salt.as_bytes()).ok()?;
    mac.update(password.as_bytes());
    Some(mac)
}

// =============================================================================
// Tokens
// =============================================================================

pub fn issue_token(secret: &[u8], claims: &Claims) -> Result<String, AuthError> {
    let payload = serde_json::to_vec(claims).map_err(|_| AuthError::Malformed)?;
    let payload_part = URL_SAFE_NO_PAD.encode(payload);
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| AuthError::Malformed)?;
    mac.update(payload_part.as_bytes());
    let sig = hex::encode(mac.finalize().into_bytes());
    Ok(format!("{}.{}", payload_part, sig))
}

/// Check signature first, then expiry against `now` (unix seconds).
pub fn verify_token(secret: &[u8], token: &str, now: i64) -> Result<Claims, AuthError> {
    let (payload_part, sig_part) = token.split_once('.').ok_or(AuthError::Malformed)?;

    let expected = hex::decode(sig_part).map_err(|_| AuthError::Malformed)?;
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| AuthError::Malformed)?;
    mac.update(payload_part.as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| AuthError::BadSignature)?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload_part)
        .map_err(|_| AuthError::Malformed)?;
    let claims: Claims = serde_json::from_slice(&payload).map_err(|_| AuthError::Malformed)?;
    if claims.exp <= now {
        return Err(AuthError::Expired);
    }
    Ok(claims)
}

// =============================================================================
// Request identity
// =============================================================================

/// The authenticated caller, extracted from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct Identity {
    pub employee_id: String,
    pub is_people_leader: bool,
    pub is_admin: bool,
}

impl Identity {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin role required".into()))
        }
    }

    pub fn require_leader(&self) -> Result<(), ApiError> {
        if self.is_people_leader {
            Ok(())
        } else {
            Err(ApiError::Forbidden("People leader role required".into()))
        }
    }

    pub fn require_admin_or_leader(&self) -> Result<(), ApiError> {
        if self.is_admin || self.is_people_leader {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin or people leader role required".into()))
        }
    }
}

impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingToken)?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = verify_token(&state.token_secret, token, chrono::Utc::now().timestamp())?;
        Ok(Identity {
            employee_id: claims.sub,
            is_people_leader: claims.leader,
            is_admin: claims.admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn claims(exp: i64) -> Claims {
        Claims {
            sub: "emp-1".into(),
            leader: true,
            admin: false,
            exp,
        }
    }

    #[test]
    fn test_password_verify() {
        let stored = hash_password("hunter2");
        assert!(verify_password(&stored, "hunter2"));
        assert!(!verify_password(&stored, "hunter3"));
        assert!(!verify_password("no-separator", "hunter2"));
        assert!(!verify_password("salt$not-hex", "hunter2"));
        assert!(!verify_password("salt$", "hunter2"));

        let (salt, digest) = stored.split_once('$').expect("separator");
        assert_eq!(digest.len(), 64);
        let truncated = format!("{}${}", salt, &digest[..32]);
        assert!(!verify_password(&truncated, "hunter2"));
        assert_ne!(hash_password("hunter2"), stored, "salts differ");
    }

    #[test]
    fn test_token_round_trip() {
        let token = issue_token(SECRET, &claims(2_000)).expect("issue");
        let decoded = verify_token(SECRET, &token, 1_000).expect("verify");
        assert_eq!(decoded, claims(2_000));
    }

    #[test]
    fn test_token_rejects_tamper_and_expiry() {
        let token = issue_token(SECRET, &claims(2_000)).expect("issue");
        assert_eq!(
            verify_token(b"other-secret", &token, 1_000),
            Err(AuthError::BadSignature)
        );

        let (_, sig) = token.split_once('.').expect("two parts");
        let forged_payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&Claims { admin: true, ..claims(2_000) }).expect("json"),
        );
        let forged = format!("{}.{}", forged_payload, sig);
        assert_eq!(verify_token(SECRET, &forged, 1_000), Err(AuthError::BadSignature));

        assert_eq!(verify_token(SECRET, &token, 2_000), Err(AuthError::Expired));
        assert_eq!(verify_token(SECRET, "garbage", 1_000), Err(AuthError::Malformed));
    }
}
