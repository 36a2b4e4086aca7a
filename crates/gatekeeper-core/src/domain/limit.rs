use std::time::Duration;

use crate::error::ConfigError;

/// Rate limit parameters, immutable for the life of an algorithm instance.
#[derive(Debug, Clone)]
pub struct LimitConfig {
    /// Maximum requests allowed in the window (tokens per window for the bucket).
    pub limit: u32,
    /// Length of the enforcement window.
    pub window: Duration,
    /// Burst capacity for the token bucket; 0 means "use `limit`".
    pub burst: u32,
}

impl LimitConfig {
    pub fn new(limit: u32, window: Duration, burst: u32) -> Self {
        Self {
            limit,
            window,
            burst,
        }
    }

    /// Validate the configuration. A zero limit or a zero window can never
    /// admit a request and is rejected at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError::Invalid("limit must be positive".into()));
        }
        if self.window.is_zero() {
            return Err(ConfigError::Invalid("window must be positive".into()));
        }
        Ok(())
    }

    /// Token bucket capacity: the configured burst, falling back to the limit.
    pub fn capacity(&self) -> u32 {
        if self.burst == 0 {
            self.limit
        } else {
            self.burst
        }
    }
}
