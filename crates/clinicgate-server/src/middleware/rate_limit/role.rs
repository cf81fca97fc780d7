//! Role-aware ceilings.

use super::{
    key::caller_identity,
    types::{LimiterConfig, Quota},
};
use crate::{error::ApiError, middleware::auth::AuthUser};
use axum::extract::Request;
use std::{collections::HashMap, sync::Arc, time::Duration};

/// Tier for callers without a session or with an unlisted role.
pub const ANONYMOUS_ROLE: &str = "anonymous";

pub const DEFAULT_ROLE_WINDOW: Duration = Duration::from_secs(15 * 60);

const DEFAULT_LIMITS: [(&str, u32); 4] = [
    ("admin", 1000),
    ("doctor", 500),
    ("patient", 200),
    (ANONYMOUS_ROLE, 50),
];

/// Requests per window by role. Always holds an anonymous tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleLimitTable {
    limits: HashMap<String, u32>,
}

impl Default for RoleLimitTable {
    fn default() -> Self {
        Self {
            limits: DEFAULT_LIMITS
                .iter()
                .map(|(role, max)| (role.to_string(), *max))
                .collect(),
        }
    }
}

impl RoleLimitTable {
    pub fn with_role(mut self, role: impl Into<String>, max: u32) -> Self {
        self.limits.insert(role.into(), max);
        self
    }

    /// Merge overrides over the current table.
    pub fn merge<I, R>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (R, u32)>,
        R: Into<String>,
    {
        self.limits
            .extend(overrides.into_iter().map(|(role, max)| (role.into(), max)));
        self
    }

    /// Ceiling for `role`, falling back to the anonymous tier.
    pub fn limit_for(&self, role: &str) -> u32 {
        self.limits
            .get(role)
            .or_else(|| self.limits.get(ANONYMOUS_ROLE))
            .copied()
            .unwrap_or(DEFAULT_LIMITS[3].1)
    }

    /// Limiter keyed by `role:<identity>` with the ceiling picked per request.
    pub fn limiter_config(self, window: Duration) -> LimiterConfig {
        let table = Arc::new(self);
        LimiterConfig::new(0, window)
            .with_quota(Quota::PerRequest(Arc::new(move |req: &Request| {
                table.limit_for(caller_role(req))
            })))
            .with_key_fn(role_key)
    }
}

fn caller_role(req: &Request) -> &str {
    req.extensions()
        .get::<AuthUser>()
        .map(|user| user.role.as_str())
        .unwrap_or(ANONYMOUS_ROLE)
}

fn role_key(req: &Request) -> Result<String, ApiError> {
    Ok(format!("role:{}", caller_identity(req)))
}
