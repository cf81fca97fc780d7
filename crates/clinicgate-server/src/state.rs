//! Shared application state.

use crate::{
    config::ServerConfig, middleware::rate_limit::{RateLimitConfigError, RateLimitRegistry},
    shutdown::ShutdownCoordinator,
};
use std::sync::Arc;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Counters behind every rate limit gate the router mounts.
    pub rate_limits: RateLimitRegistry,
    pub shutdown: ShutdownCoordinator,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self, RateLimitConfigError> {
        let rate_limits = config.rate_limit.registry()?;
        let shutdown = ShutdownCoordinator::new(config.server.request_timeout());

        Ok(Self {
            config: Arc::new(config),
            rate_limits,
            shutdown,
        })
    }
}
