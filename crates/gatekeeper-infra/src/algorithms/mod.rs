//! Rate limiting algorithms.
//!
//! The three algorithms share no decision logic, only the per-key locking
//! scheme and the window alignment arithmetic below.

mod fixed_window;
mod sliding_window;
mod token_bucket;

pub use fixed_window::FixedWindowCounter;
pub use sliding_window::SlidingWindowCounter;
pub use token_bucket::TokenBucket;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key exclusive regions. Decisions on the same key serialize; distinct
/// keys never contend. Insertion into the registry is lock-free.
pub(crate) struct KeyLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLocks {
    pub(crate) fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    pub(crate) async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(key.to_string()).or_default().clone();
        lock.lock_owned().await
    }
}

/// Epoch-aligned window start: floor(t, window). Alignment is to the absolute
/// epoch so all instances agree on boundaries.
pub(crate) fn window_floor(now: DateTime<Utc>, window_ms: i64) -> DateTime<Utc> {
    let start = now.timestamp_millis().div_euclid(window_ms) * window_ms;
    DateTime::from_timestamp_millis(start).unwrap_or(now)
}

/// Elapsed fractional seconds from `from` to `to`, clamped at zero so
/// negative clock skew never yields negative elapsed time.
pub(crate) fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds().max(0) as f64 / 1000.0
}

/// Fractional seconds as a chrono duration, rounded to millisecond precision.
pub(crate) fn chrono_secs(secs: f64) -> chrono::Duration {
    chrono::Duration::milliseconds((secs * 1000.0).round() as i64)
}
