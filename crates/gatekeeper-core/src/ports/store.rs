use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;

/// A (window start, count) pair owned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowCount {
    /// Window start, aligned to a window boundary.
    pub start: DateTime<Utc>,
    pub count: u64,
}

/// Token bucket state for one key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenState {
    pub tokens: f64,
    pub last_refill: DateTime<Utc>,
}

/// Store trait - abstraction over rate limit state backends (memory, Redis).
///
/// The store keeps two disjoint data families per key: window counters and
/// token bucket state. Both implementations expose identical semantics; only
/// atomicity mechanics differ (per-key mutexes vs. server-side scripts).
#[async_trait]
pub trait Store: Send + Sync {
    /// Add `amount` to the counter at (key, window) and return the new count.
    /// The read-modify-write is atomic for that (key, window) pair.
    async fn increment(
        &self,
        key: &str,
        window: DateTime<Utc>,
        amount: u64,
    ) -> Result<u64, StoreError>;

    /// Return all (window, count) pairs for `key` whose window start falls in
    /// the inclusive range `[from, to]`. Consistent snapshot per key.
    async fn get_windows(
        &self,
        key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<WindowCount>, StoreError>;

    /// Fetch the bucket state for `key`. `None` means the key has never been
    /// seen; an absent key is not an error.
    async fn get_tokens(&self, key: &str) -> Result<Option<TokenState>, StoreError>;

    /// Atomically replace the bucket state for `key`, refreshing its TTL.
    async fn set_tokens(&self, key: &str, state: TokenState) -> Result<(), StoreError>;

    /// Remove both the window and the token family for `key`.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Release external handles and stop background jobs.
    async fn close(&self);
}
