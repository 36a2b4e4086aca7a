//! Sliding window counter - fixed windows with weighted blending.
//!
//! The previous window's count fades linearly as the current window fills,
//! approximating a true sliding window without per-event timestamps.

use std::sync::Arc;

use async_trait::async_trait;

use gatekeeper_core::domain::LimitConfig;
use gatekeeper_core::error::StoreError;
use gatekeeper_core::ports::{Clock, Decision, LimitInfo, RateLimiter, Store};

use super::{window_floor, KeyLocks};

pub struct SlidingWindowCounter {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    limit: u32,
    window_ms: i64,
    locks: KeyLocks,
}

impl SlidingWindowCounter {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: &LimitConfig) -> Self {
        Self {
            store,
            clock,
            limit: config.limit,
            window_ms: config.window.as_millis() as i64,
            locks: KeyLocks::new(),
        }
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowCounter {
    async fn allow_n(&self, key: &str, n: u32) -> Result<Decision, StoreError> {
        let _guard = self.locks.acquire(key).await;
        let now = self.clock.now();
        let current_start = window_floor(now, self.window_ms);
        let previous_start = current_start - chrono::Duration::milliseconds(self.window_ms);

        let windows = self
            .store
            .get_windows(key, previous_start, now)
            .await?;

        let mut current = 0u64;
        let mut previous = 0u64;
        for window in &windows {
            if window.start == current_start {
                current = window.count;
            } else if window.start == previous_start {
                previous = window.count;
            }
        }

        // Fraction of the current window already elapsed, in [0, 1).
        let elapsed = (now.timestamp_millis() - current_start.timestamp_millis()) as f64
            / self.window_ms as f64;
        let weight = 1.0 - elapsed;

        let weighted = current as f64 + previous as f64 * weight;
        let allowed = weighted + f64::from(n) <= f64::from(self.limit);

        let weighted = if allowed && n > 0 {
            let updated = self
                .store
                .increment(key, current_start, u64::from(n))
                .await?;
            updated as f64 + previous as f64 * weight
        } else {
            weighted
        };

        let remaining = (f64::from(self.limit) - weighted).floor().max(0.0) as u32;
        let reset_at = current_start + chrono::Duration::milliseconds(self.window_ms);
        let retry_after = (!allowed).then(|| (reset_at - now).to_std().unwrap_or_default());

        Ok(Decision {
            allowed,
            info: LimitInfo {
                limit: self.limit,
                remaining,
                reset_at,
                retry_after,
            },
        })
    }

    async fn reset(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.locks.acquire(key).await;
        self.store.delete(key).await
    }
}
