//! In-process store - per-key locking over concurrent maps.
//!
//! Good for single-instance deployments and testing. The top-level maps are
//! concurrent so per-key locks can be taken without serializing on the
//! container; a background janitor evicts window entries older than the TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use gatekeeper_core::error::StoreError;
use gatekeeper_core::ports::{Clock, Store, TokenState, WindowCount};

/// Window records older than this are eligible for eviction.
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// How often the janitor scans for expired windows.
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

struct Inner {
    /// key → (window start in epoch millis → count)
    windows: DashMap<String, Mutex<HashMap<i64, u64>>>,
    /// key → bucket state
    tokens: DashMap<String, Mutex<TokenState>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl Inner {
    /// One filter pass over the window maps. Each per-key lock is held only
    /// for the duration of its own pass; empty maps are dropped.
    fn evict_expired(&self) {
        let cutoff = (self.clock.now() - self.ttl).timestamp_millis();
        let mut evicted = 0usize;
        self.windows.retain(|_, cell| {
            let map = cell.get_mut();
            let before = map.len();
            map.retain(|&start, _| start >= cutoff);
            evicted += before - map.len();
            !map.is_empty()
        });
        if evicted > 0 {
            debug!(evicted, "evicted expired window records");
        }
    }
}

/// In-memory store with a background eviction task.
pub struct MemoryStore {
    inner: Arc<Inner>,
    shutdown: watch::Sender<bool>,
    janitor: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryStore {
    /// Create a store with the default 24 hour window TTL.
    ///
    /// Spawns the janitor task, so a tokio runtime must be running.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, DEFAULT_TTL)
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        let inner = Arc::new(Inner {
            windows: DashMap::new(),
            tokens: DashMap::new(),
            ttl: chrono::Duration::from_std(ttl)
                .unwrap_or_else(|_| chrono::Duration::hours(24)),
            clock,
        });

        let (shutdown, mut signal) = watch::channel(false);
        let janitor_inner = inner.clone();
        let janitor = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(EVICTION_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = signal.changed() => break,
                    _ = ticker.tick() => janitor_inner.evict_expired(),
                }
            }
        });

        Self {
            inner,
            shutdown,
            janitor: Mutex::new(Some(janitor)),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn increment(
        &self,
        key: &str,
        window: DateTime<Utc>,
        amount: u64,
    ) -> Result<u64, StoreError> {
        let cell = self
            .inner
            .windows
            .entry(key.to_string())
            .or_default();
        let mut map = cell.lock();
        let count = map.entry(window.timestamp_millis()).or_insert(0);
        *count += amount;
        Ok(*count)
    }

    async fn get_windows(
        &self,
        key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<WindowCount>, StoreError> {
        let Some(cell) = self.inner.windows.get(key) else {
            return Ok(Vec::new());
        };

        let from_ms = from.timestamp_millis();
        let to_ms = to.timestamp_millis();

        let mut windows: Vec<WindowCount> = {
            let map = cell.lock();
            map.iter()
                .filter(|(&start, _)| start >= from_ms && start <= to_ms)
                .filter_map(|(&start, &count)| {
                    DateTime::from_timestamp_millis(start)
                        .map(|start| WindowCount { start, count })
                })
                .collect()
        };

        windows.sort_by_key(|w| w.start);
        Ok(windows)
    }

    async fn get_tokens(&self, key: &str) -> Result<Option<TokenState>, StoreError> {
        Ok(self.inner.tokens.get(key).map(|cell| *cell.lock()))
    }

    async fn set_tokens(&self, key: &str, state: TokenState) -> Result<(), StoreError> {
        let cell = self
            .inner
            .tokens
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(state));
        *cell.lock() = state;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.windows.remove(key);
        self.inner.tokens.remove(key);
        Ok(())
    }

    async fn close(&self) {
        let _ = self.shutdown.send(true);
        let janitor = self.janitor.lock().take();
        if let Some(janitor) = janitor {
            let _ = janitor.await;
        }
        debug!("memory store closed");
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        if let Some(janitor) = self.janitor.lock().take() {
            janitor.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_core::ports::ManualClock;

    fn store() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (MemoryStore::new(clock.clone()), clock)
    }

    fn window(clock: &ManualClock) -> DateTime<Utc> {
        // Align to a 1s boundary the way the algorithms do.
        let ms = clock.now().timestamp_millis().div_euclid(1000) * 1000;
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[tokio::test]
    async fn increment_accumulates_per_window() {
        let (store, clock) = store();
        let start = window(&clock);

        assert_eq!(store.increment("k", start, 1).await.unwrap(), 1);
        assert_eq!(store.increment("k", start, 2).await.unwrap(), 3);

        let other = start + chrono::Duration::seconds(1);
        assert_eq!(store.increment("k", other, 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_windows_filters_by_inclusive_range() {
        let (store, clock) = store();
        let start = window(&clock);
        let prev = start - chrono::Duration::seconds(1);
        let old = start - chrono::Duration::seconds(10);

        store.increment("k", start, 2).await.unwrap();
        store.increment("k", prev, 5).await.unwrap();
        store.increment("k", old, 9).await.unwrap();

        let windows = store.get_windows("k", prev, start).await.unwrap();
        assert_eq!(
            windows,
            vec![
                WindowCount { start: prev, count: 5 },
                WindowCount { start, count: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn get_windows_for_unknown_key_is_empty() {
        let (store, clock) = store();
        let now = clock.now();
        assert!(store.get_windows("nope", now, now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn token_state_round_trip() {
        let (store, clock) = store();
        assert_eq!(store.get_tokens("k").await.unwrap(), None);

        let state = TokenState {
            tokens: 7.25,
            last_refill: clock.now(),
        };
        store.set_tokens("k", state).await.unwrap();
        assert_eq!(store.get_tokens("k").await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn delete_removes_both_families() {
        let (store, clock) = store();
        let start = window(&clock);

        store.increment("k", start, 1).await.unwrap();
        store
            .set_tokens(
                "k",
                TokenState {
                    tokens: 1.0,
                    last_refill: clock.now(),
                },
            )
            .await
            .unwrap();

        store.delete("k").await.unwrap();

        assert!(store.get_windows("k", start, start).await.unwrap().is_empty());
        assert_eq!(store.get_tokens("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn eviction_drops_windows_older_than_ttl() {
        let (store, clock) = store();
        let old = window(&clock);
        store.increment("k", old, 4).await.unwrap();

        clock.advance(Duration::from_secs(25 * 60 * 60));
        let fresh = window(&clock);
        store.increment("k", fresh, 1).await.unwrap();

        store.inner.evict_expired();

        let windows = store
            .get_windows("k", old, fresh)
            .await
            .unwrap();
        assert_eq!(windows, vec![WindowCount { start: fresh, count: 1 }]);
    }

    #[tokio::test]
    async fn eviction_drops_empty_key_entries() {
        let (store, clock) = store();
        store.increment("k", window(&clock), 1).await.unwrap();

        clock.advance(Duration::from_secs(25 * 60 * 60));
        store.inner.evict_expired();

        assert!(store.inner.windows.get("k").is_none());
    }

    #[tokio::test]
    async fn close_joins_the_janitor() {
        let (store, _clock) = store();
        store.close().await;
        assert!(store.janitor.lock().is_none());
        // A second close is a no-op.
        store.close().await;
    }
}
