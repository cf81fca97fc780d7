//! Middleware for the clinicgate API server.

pub mod auth;
pub mod rate_limit;

pub use auth::{AuthUser, MaybeAuth, SessionLayer, SessionMiddleware};
pub use rate_limit::{
    LimiterConfig, LimiterOverrides, RateLimitConfigError, RateLimitLayer, RateLimitMiddleware,
    RateLimitRegistry, RoleLimitTable,
};
