//! Server configuration types.

use crate::middleware::rate_limit::{
    PresetRegistry, RateLimitConfigError, RateLimitRegistry, RoleLimitTable,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

/// Main server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server binding configuration.
    #[serde(default)]
    pub server: ServerBindConfig,
    /// Session token verification.
    pub auth: AuthConfig,
    /// Rate limiting configuration.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server binding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerBindConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    /// Enable only behind a proxy that overwrites both headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerBindConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            trust_proxy_headers: false,
        }
    }
}

impl ServerBindConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret the identity provider signs session tokens with.
    pub jwt_secret: String,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Mount the rate limit gates.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between sweeps of expired windows.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
    /// Tuning of built-in presets by name.
    #[serde(default)]
    pub presets: HashMap<String, PresetSettings>,
    /// Role ceilings merged over the built-in role table.
    #[serde(default)]
    pub roles: HashMap<String, u32>,
    /// Window of the role-aware limiter.
    #[serde(default = "default_role_window")]
    pub role_window_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_role_window() -> u64 {
    15 * 60
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cleanup_interval_secs: default_cleanup_interval(),
            presets: HashMap::new(),
            roles: HashMap::new(),
            role_window_secs: default_role_window(),
        }
    }
}

/// Window and ceiling tuning for one preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetSettings {
    pub window_secs: Option<u64>,
    pub max: Option<u32>,
}

impl RateLimitSettings {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Build the registry with preset tuning and role overrides applied.
    pub fn registry(&self) -> Result<RateLimitRegistry, RateLimitConfigError> {
        let mut presets = PresetRegistry::builtin();
        for (name, tuning) in &self.presets {
            presets.tune(
                name,
                tuning.window_secs.map(Duration::from_secs),
                tuning.max,
            )?;
        }

        let roles = RoleLimitTable::default().merge(self.roles.clone());

        Ok(RateLimitRegistry::new()
            .with_presets(presets)
            .with_roles(roles, Duration::from_secs(self.role_window_secs)))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty, compact or json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
