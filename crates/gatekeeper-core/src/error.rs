//! Domain-level error types.

use thiserror::Error;

/// Store operation errors.
///
/// Algorithms propagate these verbatim; they never retry the store and never
/// fall back to allowing traffic when the store cannot answer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store is unreachable or a command exceeded its deadline.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with a value of an unexpected shape
    /// (e.g. non-numeric where a counter was expected). Treated as transient.
    #[error("store returned inconsistent data: {0}")]
    Inconsistent(String),
}

/// Configuration validation errors, surfaced at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
