//! Rate limiting types.

use crate::error::ApiError;
use axum::{extract::Request, response::Response};
use chrono::{DateTime, Utc};
use std::{fmt, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::Instant;

/// Derives the quota key for a request.
pub type KeyFn = Arc<dyn Fn(&Request) -> Result<String, ApiError> + Send + Sync>;

/// Decides whether a request bypasses the limiter entirely.
pub type SkipFn = Arc<dyn Fn(&Request) -> Result<bool, ApiError> + Send + Sync>;

/// Builds the response sent when a request is over quota.
pub type RejectionHandler = Arc<dyn Fn(&RateLimitRejection) -> Response + Send + Sync>;

/// Computes the ceiling for a request.
pub type QuotaFn = Arc<dyn Fn(&Request) -> u32 + Send + Sync>;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_MAX: u32 = 100;
pub const DEFAULT_MESSAGE: &str = "Too many requests from this client, please try again later.";

/// Longest window a limiter accepts.
pub const MAX_WINDOW: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Request ceiling of a limiter.
#[derive(Clone)]
pub enum Quota {
    Fixed(u32),
    /// Ceiling chosen per request, e.g. from the caller's role.
    PerRequest(QuotaFn),
}

impl Quota {
    pub fn resolve(&self, req: &Request) -> u32 {
        match self {
            Self::Fixed(max) => *max,
            Self::PerRequest(f) => f(req),
        }
    }
}

impl From<u32> for Quota {
    fn from(max: u32) -> Self {
        Self::Fixed(max)
    }
}

impl fmt::Debug for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(max) => f.debug_tuple("Fixed").field(max).finish(),
            Self::PerRequest(_) => f.write_str("PerRequest(..)"),
        }
    }
}

/// Limiter configuration.
#[derive(Clone)]
pub struct LimiterConfig {
    /// Length of one counting window.
    pub window: Duration,
    /// Requests admitted per window and key.
    pub max: Quota,
    /// Key derivation.
    pub key_fn: KeyFn,
    /// Requests for which this returns true are never counted.
    pub skip_fn: Option<SkipFn>,
    /// Namespace prepended to every derived key as `<prefix>:<key>`.
    pub key_prefix: Option<String>,
    /// Message of the default rejection body.
    pub message: String,
    /// Custom rejection response.
    pub handler: Option<RejectionHandler>,
    /// Only count requests whose response has a failure status.
    pub skip_successful_requests: bool,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max: Quota::Fixed(DEFAULT_MAX),
            key_fn: super::key::by_address(),
            skip_fn: None,
            key_prefix: None,
            message: DEFAULT_MESSAGE.to_string(),
            handler: None,
            skip_successful_requests: false,
        }
    }
}

impl LimiterConfig {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            window,
            max: Quota::Fixed(max),
            ..Self::default()
        }
    }

    pub fn with_quota(mut self, quota: Quota) -> Self {
        self.max = quota;
        self
    }

    pub fn with_key_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Request) -> Result<String, ApiError> + Send + Sync + 'static,
    {
        self.key_fn = Arc::new(f);
        self
    }

    pub fn with_skip<F>(mut self, f: F) -> Self
    where
        F: Fn(&Request) -> Result<bool, ApiError> + Send + Sync + 'static,
    {
        self.skip_fn = Some(Arc::new(f));
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&RateLimitRejection) -> Response + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(f));
        self
    }

    pub fn skip_successful_requests(mut self, skip: bool) -> Self {
        self.skip_successful_requests = skip;
        self
    }

    /// Check the configuration before any gate is built from it.
    pub fn validate(&self) -> Result<(), RateLimitConfigError> {
        if self.window.is_zero() {
            return Err(RateLimitConfigError::ZeroWindow);
        }
        if self.window > MAX_WINDOW {
            return Err(RateLimitConfigError::WindowTooLarge(self.window));
        }
        if self.message.trim().is_empty() {
            return Err(RateLimitConfigError::EmptyMessage);
        }
        Ok(())
    }
}

impl fmt::Debug for LimiterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimiterConfig")
            .field("window", &self.window)
            .field("max", &self.max)
            .field("skip_fn", &self.skip_fn.is_some())
            .field("key_prefix", &self.key_prefix)
            .field("message", &self.message)
            .field("handler", &self.handler.is_some())
            .field("skip_successful_requests", &self.skip_successful_requests)
            .finish()
    }
}

/// Counter state of one key within its current window.
#[derive(Debug, Clone)]
pub struct WindowState {
    /// Identifies this window instance; a rollover gets a new id.
    pub id: u64,
    pub count: u32,
    /// Ceiling last applied to the key.
    pub limit: u32,
    pub window_start: Instant,
    pub reset_at: Instant,
    pub first_request_at: DateTime<Utc>,
    pub reset_time: DateTime<Utc>,
}

impl WindowState {
    /// Start an empty window at `now`.
    pub fn fresh(id: u64, window: Duration, limit: u32, now: Instant) -> Self {
        let started = Utc::now();
        let span = chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            id,
            count: 0,
            limit,
            window_start: now,
            reset_at: now + window,
            first_request_at: started,
            reset_time: started + span,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.reset_at
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.count)
    }

    /// Whole seconds until the window resets, rounded up.
    pub fn retry_after(&self, now: Instant) -> u64 {
        let left = self.reset_at.saturating_duration_since(now);
        left.as_secs() + u64::from(left.subsec_nanos() > 0)
    }
}

/// Outcome of counting one request.
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub key: String,
    pub window_id: u64,
    pub allowed: bool,
    pub limit: u32,
    pub count: u32,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
    pub retry_after: u64,
}

impl RateLimitResult {
    pub(crate) fn from_state(key: String, state: &WindowState, now: Instant) -> Self {
        Self {
            key,
            window_id: state.id,
            allowed: state.count <= state.limit,
            limit: state.limit,
            count: state.count,
            remaining: state.remaining(),
            reset_time: state.reset_time,
            retry_after: state.retry_after(now),
        }
    }
}

/// Details handed to a custom rejection handler.
#[derive(Debug, Clone)]
pub struct RateLimitRejection {
    pub key: String,
    pub count: u32,
    pub limit: u32,
    pub retry_after: u64,
    pub reset_time: DateTime<Utc>,
    pub message: String,
}

/// Invalid limiter wiring, raised before any request is served.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitConfigError {
    #[error("unknown rate limit preset: {0}")]
    UnknownPreset(String),

    #[error("rate limit window must be greater than zero")]
    ZeroWindow,

    #[error("rate limit window of {0:?} exceeds the 366 day maximum")]
    WindowTooLarge(Duration),

    #[error("rate limit message must not be blank")]
    EmptyMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LimiterConfig::default();
        assert_eq!(config.window, Duration::from_secs(900));
        assert!(matches!(config.max, Quota::Fixed(100)));
        assert_eq!(config.message, DEFAULT_MESSAGE);
        assert!(config.skip_fn.is_none());
        assert!(config.handler.is_none());
        assert!(!config.skip_successful_requests);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            LimiterConfig::new(5, Duration::ZERO).validate(),
            Err(RateLimitConfigError::ZeroWindow)
        );
        assert!(matches!(
            LimiterConfig::new(5, MAX_WINDOW + Duration::from_secs(1)).validate(),
            Err(RateLimitConfigError::WindowTooLarge(_))
        ));
        assert_eq!(
            LimiterConfig::default().with_message("  ").validate(),
            Err(RateLimitConfigError::EmptyMessage)
        );
        assert!(LimiterConfig::new(0, Duration::from_secs(1)).validate().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_state_lifecycle() {
        let now = Instant::now();
        let mut state = WindowState::fresh(1, Duration::from_millis(1500), 3, now);
        assert_eq!(state.count, 0);
        assert_eq!(state.remaining(), 3);
        assert_eq!(state.retry_after(now), 2);
        assert!(!state.is_expired(now));

        state.count = 5;
        assert_eq!(state.remaining(), 0);

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(state.is_expired(Instant::now()));
        assert_eq!(state.retry_after(Instant::now()), 0);
    }
}
