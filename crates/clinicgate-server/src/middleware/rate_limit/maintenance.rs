//! Gate construction, introspection and background cleanup.

use super::{
    layer::{RateLimitLayer, RateLimiter},
    presets::{LimiterOverrides, PresetRegistry},
    role::{RoleLimitTable, DEFAULT_ROLE_WINDOW},
    store::QuotaStore,
    types::{LimiterConfig, RateLimitConfigError},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::Instant};
use tracing::{debug, info};

/// Owns the quota store and builds every gate that counts in it.
///
/// Clones share the store. Separate registries never share counters.
#[derive(Clone)]
pub struct RateLimitRegistry {
    store: Arc<QuotaStore>,
    presets: Arc<PresetRegistry>,
    roles: Arc<RoleLimitTable>,
    role_window: Duration,
}

impl Default for RateLimitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitRegistry {
    pub fn new() -> Self {
        Self {
            store: Arc::new(QuotaStore::new()),
            presets: Arc::new(PresetRegistry::builtin()),
            roles: Arc::new(RoleLimitTable::default()),
            role_window: DEFAULT_ROLE_WINDOW,
        }
    }

    pub fn with_presets(mut self, presets: PresetRegistry) -> Self {
        self.presets = Arc::new(presets);
        self
    }

    pub fn with_roles(mut self, roles: RoleLimitTable, window: Duration) -> Self {
        self.roles = Arc::new(roles);
        self.role_window = window;
        self
    }

    pub fn store(&self) -> &Arc<QuotaStore> {
        &self.store
    }

    pub fn presets(&self) -> &PresetRegistry {
        &self.presets
    }

    /// Gate from an explicit configuration.
    pub fn limiter(&self, config: LimiterConfig) -> Result<RateLimitLayer, RateLimitConfigError> {
        Ok(RateLimiter::new(self.store.clone(), config)?.into_layer())
    }

    /// Gate from a named preset.
    pub fn preset(
        &self,
        name: &str,
        overrides: Option<LimiterOverrides>,
    ) -> Result<RateLimitLayer, RateLimitConfigError> {
        self.limiter(self.presets.resolve(name, overrides)?)
    }

    /// Gate whose ceiling follows the caller's role.
    ///
    /// `roles` merges over the registry's table.
    pub fn role_aware(
        &self,
        roles: Option<HashMap<String, u32>>,
    ) -> Result<RateLimitLayer, RateLimitConfigError> {
        let table = match roles {
            Some(roles) => (*self.roles).clone().merge(roles),
            None => (*self.roles).clone(),
        };
        self.limiter(table.limiter_config(self.role_window))
    }

    /// Current usage of `key`. A key without a live window reports neutral values.
    pub fn status(&self, key: &str) -> KeyStatus {
        match self.store.get(key) {
            Some(state) if !state.is_expired(Instant::now()) => KeyStatus {
                count: state.count,
                remaining: Some(state.remaining()),
                reset_time: Some(state.reset_time),
                first_request: Some(state.first_request_at),
            },
            _ => KeyStatus::default(),
        }
    }

    /// Forget `key`. Idempotent.
    pub fn reset(&self, key: &str) -> bool {
        let existed = self.store.delete(key);
        info!(key = %key, existed, "Rate limit reset");
        existed
    }

    /// Every stored key, sorted by key.
    pub fn all_keys(&self) -> Vec<KeySnapshot> {
        let mut keys: Vec<_> = self
            .store
            .entries()
            .into_iter()
            .map(|(key, state)| KeySnapshot {
                key,
                count: state.count,
                reset_time: state.reset_time,
                first_request: state.first_request_at,
            })
            .collect();
        keys.sort_by(|a, b| a.key.cmp(&b.key));
        keys
    }

    /// Remove expired windows now.
    pub fn sweep_expired(&self) -> usize {
        let removed = self.store.sweep_expired(Instant::now());
        debug!(removed, "Swept expired rate limit windows");
        removed
    }

    /// Start a background sweep every `interval`.
    pub fn spawn_cleanup(&self, interval: Duration) -> CleanupTask {
        CleanupTask::spawn(self.clone(), interval)
    }
}

/// Usage report for one key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatus {
    pub count: u32,
    pub remaining: Option<u32>,
    pub reset_time: Option<DateTime<Utc>>,
    pub first_request: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySnapshot {
    pub key: String,
    pub count: u32,
    pub reset_time: DateTime<Utc>,
    pub first_request: DateTime<Utc>,
}

/// Handle to the periodic sweep.
///
/// Dropping the handle stops the sweep; [`CleanupTask::stop`] also waits for it.
pub struct CleanupTask {
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl CleanupTask {
    fn spawn(registry: RateLimitRegistry, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let period = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            info!(interval_secs = period.as_secs_f64(), "Rate limit cleanup started");
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        registry.sweep_expired();
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Rate limit cleanup stopped");
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Stop the sweep and wait for it to exit.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for CleanupTask {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}
