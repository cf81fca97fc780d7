//! Configuration validation.

use super::types::ServerConfig;
use crate::middleware::rate_limit::PresetRegistry;
use clinicgate_common_log::{LogFormat, LogLevel};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid JWT secret: must be at least 32 characters")]
    InvalidJwtSecret,

    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid rate limit cleanup interval: must be greater than zero")]
    InvalidCleanupInterval,

    #[error("Unknown rate limit preset: {0}")]
    UnknownPreset(String),

    #[error("Invalid window for rate limit preset {0}: must be greater than zero")]
    InvalidPresetWindow(String),

    #[error("Invalid role window: must be greater than zero")]
    InvalidRoleWindow,

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}")]
    InvalidLogFormat(String),
}

/// Validate server configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.auth.jwt_secret.len() < 32 {
        errors.push(ConfigError::InvalidJwtSecret);
    }

    if config.server.port == 0 {
        errors.push(ConfigError::InvalidPort(0));
    } else if config.server.socket_addr().is_err() {
        errors.push(ConfigError::InvalidBindAddress(config.server.host.clone()));
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.cleanup_interval_secs == 0 {
        errors.push(ConfigError::InvalidCleanupInterval);
    }

    let builtin = PresetRegistry::builtin();
    let mut names: Vec<_> = rate_limit.presets.keys().collect();
    names.sort();
    for name in names {
        if !builtin.contains(name) {
            errors.push(ConfigError::UnknownPreset(name.clone()));
        } else if rate_limit.presets[name].window_secs == Some(0) {
            errors.push(ConfigError::InvalidPresetWindow(name.clone()));
        }
    }

    if rate_limit.role_window_secs == 0 {
        errors.push(ConfigError::InvalidRoleWindow);
    }

    if LogLevel::parse(&config.logging.level).is_none() {
        errors.push(ConfigError::InvalidLogLevel(config.logging.level.clone()));
    }

    if LogFormat::parse(&config.logging.format).is_none() {
        errors.push(ConfigError::InvalidLogFormat(config.logging.format.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
