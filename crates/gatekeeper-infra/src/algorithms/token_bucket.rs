//! Token bucket - smooth rate limiting with burst handling.
//!
//! Tokens refill at a constant fractional rate; each request consumes its
//! cost. The refill is computed lazily from the elapsed time since the last
//! decision and written back on every decision, including denials, so
//! concurrent callers always observe a bucket within `[0, capacity]`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use gatekeeper_core::domain::LimitConfig;
use gatekeeper_core::error::StoreError;
use gatekeeper_core::ports::{Clock, Decision, LimitInfo, RateLimiter, Store, TokenState};

use super::{chrono_secs, elapsed_seconds, KeyLocks};

pub struct TokenBucket {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    /// Maximum tokens the bucket holds: burst, or limit when burst is 0.
    capacity: u32,
    /// Tokens added per second.
    rate: f64,
    locks: KeyLocks,
}

impl TokenBucket {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: &LimitConfig) -> Self {
        Self {
            store,
            clock,
            capacity: config.capacity(),
            rate: f64::from(config.limit) / config.window.as_secs_f64(),
            locks: KeyLocks::new(),
        }
    }
}

#[async_trait]
impl RateLimiter for TokenBucket {
    async fn allow_n(&self, key: &str, n: u32) -> Result<Decision, StoreError> {
        let _guard = self.locks.acquire(key).await;
        let now = self.clock.now();
        let capacity = f64::from(self.capacity);

        // First touch starts from a full bucket.
        let (tokens, last_refill) = match self.store.get_tokens(key).await? {
            Some(state) => (state.tokens, state.last_refill),
            None => (capacity, now),
        };

        let mut tokens = (tokens + elapsed_seconds(last_refill, now) * self.rate).min(capacity);

        let cost = f64::from(n);
        let allowed = tokens >= cost;
        let retry_after = if allowed {
            tokens -= cost;
            None
        } else {
            Some(Duration::from_secs_f64((cost - tokens) / self.rate))
        };

        let tokens = tokens.clamp(0.0, capacity);

        // Persisted even on denial: the refill must be observable.
        self.store
            .set_tokens(
                key,
                TokenState {
                    tokens,
                    last_refill: now,
                },
            )
            .await?;

        let reset_at = now + chrono_secs((capacity - tokens) / self.rate);

        Ok(Decision {
            allowed,
            info: LimitInfo {
                limit: self.capacity,
                remaining: tokens.floor() as u32,
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
