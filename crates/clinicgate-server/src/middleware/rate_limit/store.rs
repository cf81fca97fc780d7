//! In-memory quota storage.

use super::types::WindowState;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Window state per quota key.
///
/// Every read-modify-write on a key runs under that key's shard lock, so
/// concurrent requests for the same key never observe the same count.
#[derive(Debug, Default)]
pub struct QuotaStore {
    states: DashMap<String, WindowState>,
    next_window_id: AtomicU64,
}

impl QuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<WindowState> {
        self.states.get(key).map(|entry| entry.value().clone())
    }

    pub fn set(&self, key: impl Into<String>, state: WindowState) {
        self.states.insert(key.into(), state);
    }

    /// Remove a key. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.states.remove(key).is_some()
    }

    /// Snapshot of every stored key.
    pub fn entries(&self) -> Vec<(String, WindowState)> {
        self.states
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Count one request against `key`.
    ///
    /// An absent or expired window is replaced by a fresh one first. Returns
    /// the state after the increment.
    pub fn hit(&self, key: &str, window: Duration, max: u32, now: Instant) -> WindowState {
        let mut entry = self
            .states
            .entry(key.to_string())
            .or_insert_with(|| WindowState::fresh(self.next_id(), window, max, now));

        let state = entry.value_mut();
        if state.is_expired(now) {
            *state = WindowState::fresh(self.next_id(), window, max, now);
        }
        state.limit = max;
        state.count = state.count.saturating_add(1);
        state.clone()
    }

    /// Undo one provisional increment, but only inside the window it was
    /// counted in.
    pub fn rollback(&self, key: &str, window_id: u64) -> bool {
        match self.states.get_mut(key) {
            Some(mut entry) if entry.id == window_id && entry.count > 0 => {
                entry.count -= 1;
                true
            }
            _ => false,
        }
    }

    /// Drop every window that has ended. Returns how many were removed.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let before = self.states.len();
        self.states.retain(|_, state| !state.is_expired(now));
        before.saturating_sub(self.states.len())
    }

    fn next_id(&self) -> u64 {
        self.next_window_id.fetch_add(1, Ordering::Relaxed)
    }
}
