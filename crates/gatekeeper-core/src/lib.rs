//! # Gatekeeper Core
//!
//! The domain layer of the Gatekeeper rate limiter.
//! This crate contains the decision types, the ports that infrastructure
//! must implement, and the dispatcher that routes requests to algorithms.

pub mod dispatch;
pub mod domain;
pub mod error;
pub mod ports;

pub use error::{ConfigError, StoreError};
