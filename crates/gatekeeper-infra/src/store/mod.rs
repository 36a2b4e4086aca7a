//! Store implementations.

mod memory;
mod redis;

pub use self::redis::{RedisStore, RedisStoreConfig};
pub use memory::MemoryStore;
