//! Dispatcher - routes incoming checks to the named algorithm instance.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::domain::Algorithm;
use crate::error::StoreError;
use crate::ports::{Decision, RateLimiter};

/// Name → algorithm table. Built once at startup from the three algorithm
/// instances and the configured default; immutable afterwards.
pub struct Dispatcher {
    token_bucket: Arc<dyn RateLimiter>,
    sliding_window: Arc<dyn RateLimiter>,
    fixed_window: Arc<dyn RateLimiter>,
    default: Algorithm,
}

impl Dispatcher {
    pub fn new(
        token_bucket: Arc<dyn RateLimiter>,
        sliding_window: Arc<dyn RateLimiter>,
        fixed_window: Arc<dyn RateLimiter>,
        default: Algorithm,
    ) -> Self {
        Self {
            token_bucket,
            sliding_window,
            fixed_window,
            default,
        }
    }

    pub fn default_algorithm(&self) -> Algorithm {
        self.default
    }

    /// An explicit algorithm beats the configured default.
    fn resolve(&self, explicit: Option<Algorithm>) -> (Algorithm, &dyn RateLimiter) {
        let algorithm = explicit.unwrap_or(self.default);
        let limiter: &dyn RateLimiter = match algorithm {
            Algorithm::TokenBucket => self.token_bucket.as_ref(),
            Algorithm::SlidingWindow => self.sliding_window.as_ref(),
            Algorithm::FixedWindow => self.fixed_window.as_ref(),
        };
        (algorithm, limiter)
    }

    /// Route a decision to the requested algorithm and record the outcome.
    /// Returns the algorithm that actually ran, for telemetry labels.
    pub async fn decide(
        &self,
        explicit: Option<Algorithm>,
        key: &str,
        n: u32,
    ) -> Result<(Algorithm, Decision), StoreError> {
        let (algorithm, limiter) = self.resolve(explicit);
        trace!(%algorithm, key, n, "dispatching rate limit check");

        let decision = limiter.allow_n(key, n).await.inspect_err(|err| {
            debug!(%algorithm, key, %err, "rate limit check failed");
        })?;

        debug!(
            %algorithm,
            key,
            n,
            allowed = decision.allowed,
            remaining = decision.info.remaining,
            "rate limit decision"
        );
        Ok((algorithm, decision))
    }

    /// Status is a decision with cost zero: it reports headroom without
    /// consuming budget.
    pub async fn status(
        &self,
        explicit: Option<Algorithm>,
        key: &str,
    ) -> Result<(Algorithm, Decision), StoreError> {
        self.decide(explicit, key, 0).await
    }

    /// Reset a key on the requested algorithm. Resetting a key that has never
    /// been seen is a no-op, not an error.
    pub async fn reset(
        &self,
        explicit: Option<Algorithm>,
        key: &str,
    ) -> Result<Algorithm, StoreError> {
        let (algorithm, limiter) = self.resolve(explicit);
        limiter.reset(key).await?;
        debug!(%algorithm, key, "rate limit reset");
        Ok(algorithm)
    }
}

/// First dotted segment of a resource name, used as a low-cardinality
/// telemetry label (`api.users.create` → `api`).
pub fn resource_prefix(resource: &str) -> &str {
    resource.split('.').next().unwrap_or(resource)
}
