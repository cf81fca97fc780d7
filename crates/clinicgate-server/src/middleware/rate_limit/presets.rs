//! Named limiter presets.

use super::{
    key,
    types::{KeyFn, LimiterConfig, Quota, RateLimitConfigError, RejectionHandler, SkipFn},
};
use std::{collections::HashMap, time::Duration};

pub const STRICT: &str = "strict";
pub const MODERATE: &str = "moderate";
pub const STANDARD: &str = "standard";
pub const GENEROUS: &str = "generous";
pub const PER_IDENTITY: &str = "per-identity";

const PRESET_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Field-wise overrides applied on top of a preset.
///
/// Every field left as `None` keeps the preset's value.
#[derive(Clone, Default)]
pub struct LimiterOverrides {
    pub window: Option<Duration>,
    pub max: Option<Quota>,
    pub key_fn: Option<KeyFn>,
    pub skip_fn: Option<SkipFn>,
    pub key_prefix: Option<String>,
    pub message: Option<String>,
    pub handler: Option<RejectionHandler>,
    pub skip_successful_requests: Option<bool>,
}

impl LimiterOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.window = Some(window);
        self
    }

    pub fn max(mut self, max: u32) -> Self {
        self.max = Some(Quota::Fixed(max));
        self
    }

    pub fn quota(mut self, quota: Quota) -> Self {
        self.max = Some(quota);
        self
    }

    pub fn key_fn(mut self, key_fn: KeyFn) -> Self {
        self.key_fn = Some(key_fn);
        self
    }

    pub fn skip_fn(mut self, skip_fn: SkipFn) -> Self {
        self.skip_fn = Some(skip_fn);
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn handler(mut self, handler: RejectionHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn skip_successful_requests(mut self, skip: bool) -> Self {
        self.skip_successful_requests = Some(skip);
        self
    }

    /// Shallow-merge into `config`.
    pub fn apply(self, mut config: LimiterConfig) -> LimiterConfig {
        if let Some(window) = self.window {
            config.window = window;
        }
        if let Some(max) = self.max {
            config.max = max;
        }
        if let Some(key_fn) = self.key_fn {
            config.key_fn = key_fn;
        }
        if self.skip_fn.is_some() {
            config.skip_fn = self.skip_fn;
        }
        if self.key_prefix.is_some() {
            config.key_prefix = self.key_prefix;
        }
        if let Some(message) = self.message {
            config.message = message;
        }
        if self.handler.is_some() {
            config.handler = self.handler;
        }
        if let Some(skip) = self.skip_successful_requests {
            config.skip_successful_requests = skip;
        }
        config
    }
}

/// Preset templates by name.
#[derive(Debug, Clone)]
pub struct PresetRegistry {
    presets: HashMap<String, LimiterConfig>,
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PresetRegistry {
    /// Registry holding only the built-in presets.
    pub fn builtin() -> Self {
        let mut presets = HashMap::new();
        presets.insert(
            STRICT.to_string(),
            LimiterConfig::new(5, PRESET_WINDOW)
                .with_message("Too many failed attempts, please try again later.")
                .skip_successful_requests(true),
        );
        presets.insert(MODERATE.to_string(), LimiterConfig::new(50, PRESET_WINDOW));
        presets.insert(STANDARD.to_string(), LimiterConfig::new(100, PRESET_WINDOW));
        presets.insert(GENEROUS.to_string(), LimiterConfig::new(1000, PRESET_WINDOW));

        let mut per_identity = LimiterConfig::new(200, PRESET_WINDOW);
        per_identity.key_fn = key::by_identity_or_address();
        presets.insert(PER_IDENTITY.to_string(), per_identity);

        Self { presets }
    }

    /// Add or replace a preset.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        config: LimiterConfig,
    ) -> Result<(), RateLimitConfigError> {
        config.validate()?;
        self.presets.insert(name.into(), config);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&LimiterConfig, RateLimitConfigError> {
        self.presets
            .get(name)
            .ok_or_else(|| RateLimitConfigError::UnknownPreset(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.presets.contains_key(name)
    }

    /// Preset names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.presets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Adjust the window and ceiling of an existing preset.
    pub fn tune(
        &mut self,
        name: &str,
        window: Option<Duration>,
        max: Option<u32>,
    ) -> Result<(), RateLimitConfigError> {
        let mut overrides = LimiterOverrides::new();
        overrides.window = window;
        overrides.max = max.map(Quota::Fixed);

        let tuned = overrides.apply(self.get(name)?.clone());
        self.register(name, tuned)
    }

    /// Build the effective configuration for `name`.
    pub fn resolve(
        &self,
        name: &str,
        overrides: Option<LimiterOverrides>,
    ) -> Result<LimiterConfig, RateLimitConfigError> {
        let base = self.get(name)?.clone();
        let config = match overrides {
            Some(overrides) => overrides.apply(base),
            None => base,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(config: &LimiterConfig) -> Option<u32> {
        match config.max {
            Quota::Fixed(max) => Some(max),
            Quota::PerRequest(_) => None,
        }
    }

    #[test]
    fn test_builtin_ceilings() {
        let registry = PresetRegistry::builtin();
        assert_eq!(
            registry.names(),
            vec![GENEROUS, MODERATE, PER_IDENTITY, STANDARD, STRICT]
        );

        let strict = registry.get(STRICT).unwrap();
        assert_eq!(fixed(strict), Some(5));
        assert!(strict.skip_successful_requests);
        assert_eq!(strict.window, Duration::from_secs(900));

        assert_eq!(fixed(registry.get(MODERATE).unwrap()), Some(50));
        assert_eq!(fixed(registry.get(STANDARD).unwrap()), Some(100));
        assert_eq!(fixed(registry.get(GENEROUS).unwrap()), Some(1000));
        assert_eq!(fixed(registry.get(PER_IDENTITY).unwrap()), Some(200));
    }

    #[test]
    fn test_unknown_preset_fails() {
        let registry = PresetRegistry::builtin();
        assert_eq!(
            registry.resolve("lenient", None).err(),
            Some(RateLimitConfigError::UnknownPreset("lenient".into()))
        );
    }

    #[test]
    fn test_overrides_merge_shallowly() {
        let registry = PresetRegistry::builtin();
        let config = registry
            .resolve(STRICT, Some(LimiterOverrides::new().max(3).message("slow down")))
            .unwrap();

        assert_eq!(fixed(&config), Some(3));
        assert_eq!(config.message, "slow down");
        assert!(config.skip_successful_requests);
        assert_eq!(config.window, Duration::from_secs(900));
    }

    #[test]
    fn test_invalid_override_is_refused() {
        let registry = PresetRegistry::builtin();
        let result = registry.resolve(STANDARD, Some(LimiterOverrides::new().window(Duration::ZERO)));
        assert_eq!(result.err(), Some(RateLimitConfigError::ZeroWindow));
    }

    #[test]
    fn test_register_and_tune() {
        let mut registry = PresetRegistry::builtin();
        registry
            .register("uploads", LimiterConfig::new(10, Duration::from_secs(3600)))
            .unwrap();
        assert!(registry.contains("uploads"));

        registry.tune(GENEROUS, None, Some(2000)).unwrap();
        assert_eq!(fixed(registry.get(GENEROUS).unwrap()), Some(2000));

        assert_eq!(
            registry.tune("missing", None, Some(1)).err(),
            Some(RateLimitConfigError::UnknownPreset("missing".into()))
        );
    }
}
