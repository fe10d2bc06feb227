//! Keyed fixed-window counters.
//!
//! # Responsibilities
//! - Create an entry on the first hit for a key
//! - Increment atomically per key under concurrent access
//! - Drop entries once their window has passed (lazily and by sweep)
//!
//! # Design Decisions
//! - Fixed window: `reset_time` is set once at creation and never moves
//! - Counts only grow; a new window is a new entry, never a mutated one
//! - `get`, `increment` and the sweep share one expiry predicate
//! - Process-local; other backends plug in behind [`RateLimitStore`]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::rate_limit::clock::{iso_from_ms, Clock, SystemClock};

/// Counter state for one key and one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitEntry {
    /// Requests seen in this window (always >= 1).
    pub count: u32,
    /// Epoch milliseconds at which the window closes.
    pub reset_time: u64,
    /// Epoch milliseconds of the request that opened the window.
    pub first_request: u64,
}

impl RateLimitEntry {
    fn open(now: u64, window_ms: u64) -> Self {
        Self {
            count: 1,
            reset_time: now.saturating_add(window_ms),
            first_request: now,
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now > self.reset_time
    }

    /// `reset_time` as an RFC 3339 timestamp with millisecond precision.
    pub fn reset_iso(&self) -> String {
        iso_from_ms(self.reset_time)
    }
}

/// Storage backend for rate-limit counters.
pub trait RateLimitStore: Send + Sync {
    /// Live entry for `key`; an expired entry is removed and `None` returned.
    fn get(&self, key: &str) -> Option<RateLimitEntry>;

    /// Count one request against `key`, opening a new window when needed.
    fn increment(&self, key: &str, window: Duration) -> RateLimitEntry;

    /// Forget `key` unconditionally.
    fn reset(&self, key: &str);

    /// Remove every expired entry. Returns how many were removed.
    fn purge_expired(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process store backed by a sharded concurrent map.
pub struct MemoryStore {
    entries: DashMap<String, RateLimitEntry>,
    clock: Arc<dyn Clock>,
    shutdown: Shutdown,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            shutdown: Shutdown::new(),
            sweeper: Mutex::new(None),
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Spawn the periodic sweep on the current tokio runtime.
    ///
    /// The task holds only a weak reference, so dropping the store also ends it.
    pub fn start_sweeper(self: &Arc<Self>, every: Duration) {
        let store = Arc::downgrade(self);
        let mut shutdown = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(store) = store.upgrade() else { break };
                        let removed = store.purge_expired();
                        let remaining = store.len();
                        metrics::record_store_size(remaining);
                        if removed > 0 {
                            tracing::debug!(removed, remaining, "Swept expired rate-limit entries");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Rate-limit sweeper stopping");
                        break;
                    }
                }
            }
        });

        tracing::info!(interval_secs = every.as_secs(), "Rate-limit sweeper started");
        if let Ok(mut slot) = self.sweeper.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
    }

    /// Whether a sweep task is attached and still running.
    pub fn sweeper_running(&self) -> bool {
        self.sweeper
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Stop the sweeper, wait for it to exit, and drop all entries.
    pub async fn close(&self) {
        self.shutdown.trigger();
        let handle = self.sweeper.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.entries.clear();
        tracing::info!("Rate-limit store closed");
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

impl RateLimitStore for MemoryStore {
    fn get(&self, key: &str) -> Option<RateLimitEntry> {
        let now = self.clock.now_ms();
        if self.entries.remove_if(key, |_, entry| entry.is_expired(now)).is_some() {
            return None;
        }
        self.entries.get(key).map(|entry| *entry)
    }

    fn increment(&self, key: &str, window: Duration) -> RateLimitEntry {
        let now = self.clock.now_ms();
        let window_ms = window.as_millis() as u64;

        // The entry guard holds the shard lock for the whole read-modify-write.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                if slot.get().is_expired(now) {
                    slot.insert(RateLimitEntry::open(now, window_ms));
                } else {
                    let entry = slot.get_mut();
                    entry.count = entry.count.saturating_add(1);
                }
                *slot.get()
            }
            Entry::Vacant(slot) => *slot.insert(RateLimitEntry::open(now, window_ms)),
        }
    }

    fn reset(&self, key: &str) {
        self.entries.remove(key);
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
