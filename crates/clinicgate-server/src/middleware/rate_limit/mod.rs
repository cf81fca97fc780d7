//! Rate limiting middleware.
//!
//! Fixed-window counters keyed per caller. A [`RateLimitRegistry`] owns the
//! counters and hands out gates ([`RateLimitLayer`]) built from an explicit
//! [`LimiterConfig`], a named preset, or the caller's role. Up to twice the
//! ceiling can pass across a window boundary.

pub mod key;
pub mod layer;
pub mod maintenance;
pub mod presets;
pub mod role;
pub mod store;
pub mod types;

pub use key::TrustProxyHeaders;
pub use layer::{RateLimitLayer, RateLimitMiddleware, RateLimiter};
pub use maintenance::{CleanupTask, KeySnapshot, KeyStatus, RateLimitRegistry};
pub use presets::{LimiterOverrides, PresetRegistry};
pub use role::{RoleLimitTable, ANONYMOUS_ROLE};
pub use store::QuotaStore;
pub use types::{
    KeyFn, LimiterConfig, Quota, RateLimitConfigError, RateLimitRejection, RateLimitResult,
    SkipFn, WindowState,
};
