//! Unverified view of the JWT payload the service issues.
//!
//! Signature checks belong to the server. The client only reads the
//! payload to learn who it is (`sub`, `role`) and when the token stops
//! being worth presenting (`exp`).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::models::Role;

#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: Option<Value>,
    role: Option<String>,
    exp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub subject: Option<String>,
    pub role: Option<Role>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenClaims {
    /// Decode the payload segment of a `header.payload.signature` token.
    /// Returns `None` for opaque tokens or unreadable payloads.
    pub fn decode(token: &str) -> Option<Self> {
        let mut parts = token.split('.');
        let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }

        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        let raw: RawClaims = serde_json::from_slice(&bytes).ok()?;

        let subject = match raw.sub {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Some(Self {
            subject,
            role: raw.role.map(Role::from),
            expires_at: raw.exp.and_then(|exp| DateTime::from_timestamp(exp, 0)),
        })
    }

    /// Numeric user id carried in `sub`, if any
    pub fn user_id(&self) -> Option<i64> {
        self.subject.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }
}

/// True when `token` is a JWT whose `exp` has passed.
/// Opaque tokens never expire locally.
pub fn token_expired(token: &str) -> bool {
    TokenClaims::decode(token)
        .map(|claims| claims.is_expired())
        .unwrap_or(false)
}
