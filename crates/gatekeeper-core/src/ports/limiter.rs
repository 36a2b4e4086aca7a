use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;

/// Quota metadata returned with every decision.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitInfo {
    /// The configured budget (bucket capacity or requests per window).
    pub limit: u32,
    /// Caller-visible headroom after this decision. Clamped at zero.
    pub remaining: u32,
    /// When the caller can expect a full budget again.
    pub reset_at: DateTime<Utc>,
    /// How long to wait before retrying the same cost. Present iff denied.
    pub retry_after: Option<Duration>,
}

/// The outcome of one rate limit decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    pub info: LimitInfo,
}

/// Rate limiter trait - the uniform contract over the three algorithms.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check whether a single request is allowed for `key`.
    async fn allow(&self, key: &str) -> Result<Decision, StoreError> {
        self.allow_n(key, 1).await
    }

    /// Check whether `n` requests are allowed for `key`. `n = 0` is a status
    /// probe: it never consumes budget and always reports the current state.
    async fn allow_n(&self, key: &str, n: u32) -> Result<Decision, StoreError>;

    /// Return `key` to cold state, as if it had never been seen.
    async fn reset(&self, key: &str) -> Result<(), StoreError>;
}
