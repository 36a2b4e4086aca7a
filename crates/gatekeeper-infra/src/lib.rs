//! # Gatekeeper Infrastructure
//!
//! Concrete implementations of the ports defined in `gatekeeper-core`:
//! the two state stores (in-process memory and Redis) and the three
//! rate limiting algorithms.

pub mod algorithms;
pub mod store;

pub use algorithms::{FixedWindowCounter, SlidingWindowCounter, TokenBucket};
pub use store::{MemoryStore, RedisStore, RedisStoreConfig};
