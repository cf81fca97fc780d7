//! Session types.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (caller identity).
    pub sub: String,
    /// Caller email.
    pub email: String,
    /// Session role (`admin`, `doctor`, `patient`, ...).
    pub role: String,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
    /// JWT ID.
    pub jti: String,
}

impl Claims {
    /// Create session claims valid for `expires_in` seconds.
    pub fn new(sub: impl Into<String>, email: &str, role: &str, expires_in: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: sub.into(),
            email: email.to_string(),
            role: role.to_string(),
            iat: now,
            exp: now + expires_in,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Check if token is expired.
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// Authenticated caller, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl AuthUser {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: String::new(),
            role: role.into(),
        }
    }

    /// Create from verified claims. Claims without a subject carry no identity.
    pub fn from_claims(claims: Claims) -> Option<Self> {
        if claims.sub.trim().is_empty() {
            return None;
        }
        Some(Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}
