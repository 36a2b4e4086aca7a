//! Fixed window counter - the simplest and cheapest algorithm.
//!
//! Time is divided into epoch-aligned windows of fixed length; each window
//! owns an independent counter. A caller can legally burst up to twice the
//! limit across two adjacent windows; that trade-off is inherent to the
//! algorithm, not a defect.

use std::sync::Arc;

use async_trait::async_trait;

use gatekeeper_core::domain::LimitConfig;
use gatekeeper_core::error::StoreError;
use gatekeeper_core::ports::{Clock, Decision, LimitInfo, RateLimiter, Store};

use super::{window_floor, KeyLocks};

pub struct FixedWindowCounter {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    limit: u32,
    window_ms: i64,
    locks: KeyLocks,
}

impl FixedWindowCounter {
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
impl RateLimiter for FixedWindowCounter {
    async fn allow_n(&self, key: &str, n: u32) -> Result<Decision, StoreError> {
        let _guard = self.locks.acquire(key).await;
        let now = self.clock.now();
        let start = window_floor(now, self.window_ms);

        let windows = self.store.get_windows(key, start, now).await?;
        let current = windows
            .iter()
            .find(|w| w.start == start)
            .map(|w| w.count)
            .unwrap_or(0);

        let allowed = current + u64::from(n) <= u64::from(self.limit);

        // A zero-cost probe reads without writing.
        let count = if allowed && n > 0 {
            self.store.increment(key, start, u64::from(n)).await?
        } else {
            current
        };

        let remaining = u64::from(self.limit).saturating_sub(count) as u32;
        let reset_at = start + chrono::Duration::milliseconds(self.window_ms);
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
