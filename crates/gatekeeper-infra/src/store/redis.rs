//! Redis store - shared state for multi-instance deployments.
//!
//! Windows are a hash per key (field = window-start epoch seconds), bucket
//! state a hash with `tokens` and `last_refill` fields. Increments run as an
//! atomic Lua script; every key carries a TTL so the server reclaims memory
//! without client-side eviction.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tracing::{debug, info};

use gatekeeper_core::error::StoreError;
use gatekeeper_core::ports::{Store, TokenState, WindowCount};

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    pub url: String,
    /// Key TTL; bounds how long idle state survives.
    pub ttl: Duration,
    pub connect_timeout: Duration,
    /// Deadline applied to every command.
    pub command_timeout: Duration,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            ttl: Duration::from_secs(24 * 60 * 60),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(1),
        }
    }
}

/// Redis-backed store using server-side scripts for atomic increments.
pub struct RedisStore {
    conn: ConnectionManager,
    ttl_secs: i64,
    command_timeout: Duration,
    /// HINCRBY plus TTL-on-first-touch, executed atomically.
    increment_script: Script,
}

impl RedisStore {
    pub async fn connect(config: RedisStoreConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Unavailable("redis connection timed out".to_string()))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let increment_script = Script::new(
            r#"
            local key = KEYS[1]
            local field = ARGV[1]
            local amount = tonumber(ARGV[2])
            local ttl = tonumber(ARGV[3])

            local count = redis.call('HINCRBY', key, field, amount)
            if count == amount then
                redis.call('EXPIRE', key, ttl)
            end

            return count
            "#,
        );

        let store = Self {
            conn,
            ttl_secs: config.ttl.as_secs().max(1) as i64,
            command_timeout: config.command_timeout,
            increment_script,
        };

        // Fail fast at startup rather than on the first decision.
        let mut probe = store.conn.clone();
        let _: String = store.run(redis::cmd("PING").query_async(&mut probe)).await?;

        info!(url = %config.url, "connected to Redis store");
        Ok(store)
    }

    fn window_key(key: &str) -> String {
        format!("window:{key}")
    }

    fn token_key(key: &str) -> String {
        format!("tokens:{key}")
    }

    /// Run a command under the configured deadline. Exceeding the deadline is
    /// reported the same way as an unreachable server.
    async fn run<T>(
        &self,
        command: impl Future<Output = redis::RedisResult<T>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.command_timeout, command).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(StoreError::Unavailable(err.to_string())),
            Err(_) => Err(StoreError::Unavailable("redis command timed out".to_string())),
        }
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn increment(
        &self,
        key: &str,
        window: DateTime<Utc>,
        amount: u64,
    ) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let count: i64 = self
            .run(
                self.increment_script
                    .key(Self::window_key(key))
                    .arg(window.timestamp())
                    .arg(amount)
                    .arg(self.ttl_secs)
                    .invoke_async(&mut conn),
            )
            .await?;

        u64::try_from(count).map_err(|_| {
            StoreError::Inconsistent(format!("negative window count for {key}: {count}"))
        })
    }

    async fn get_windows(
        &self,
        key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<WindowCount>, StoreError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> =
            self.run(conn.hgetall(Self::window_key(key))).await?;

        let from_secs = from.timestamp();
        let to_secs = to.timestamp();

        let mut windows = Vec::new();
        for (field, value) in fields {
            let secs: i64 = field.parse().map_err(|_| {
                StoreError::Inconsistent(format!("window field is not a timestamp: {field}"))
            })?;
            if secs < from_secs || secs > to_secs {
                continue;
            }
            let count: u64 = value.parse().map_err(|_| {
                StoreError::Inconsistent(format!("window count is not numeric: {value}"))
            })?;
            if let Some(start) = DateTime::from_timestamp(secs, 0) {
                windows.push(WindowCount { start, count });
            }
        }

        windows.sort_by_key(|w| w.start);
        Ok(windows)
    }

    async fn get_tokens(&self, key: &str) -> Result<Option<TokenState>, StoreError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> =
            self.run(conn.hgetall(Self::token_key(key))).await?;

        if fields.is_empty() {
            return Ok(None);
        }

        let tokens: f64 = fields
            .get("tokens")
            .ok_or_else(|| StoreError::Inconsistent(format!("bucket hash for {key} missing tokens")))?
            .parse()
            .map_err(|_| StoreError::Inconsistent(format!("bucket tokens not numeric for {key}")))?;

        let last_refill_secs: f64 = fields
            .get("last_refill")
            .ok_or_else(|| {
                StoreError::Inconsistent(format!("bucket hash for {key} missing last_refill"))
            })?
            .parse()
            .map_err(|_| {
                StoreError::Inconsistent(format!("bucket last_refill not numeric for {key}"))
            })?;

        let secs = last_refill_secs.floor();
        let nanos = ((last_refill_secs - secs) * 1e9) as u32;
        let last_refill = DateTime::from_timestamp(secs as i64, nanos).ok_or_else(|| {
            StoreError::Inconsistent(format!("bucket last_refill out of range for {key}"))
        })?;

        Ok(Some(TokenState { tokens, last_refill }))
    }

    async fn set_tokens(&self, key: &str, state: TokenState) -> Result<(), StoreError> {
        let token_key = Self::token_key(key);
        // Fractional epoch seconds keep sub-second refill across the round trip.
        let last_refill = state.last_refill.timestamp_millis() as f64 / 1000.0;

        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset(&token_key, "tokens", state.tokens)
            .ignore()
            .hset(&token_key, "last_refill", last_refill)
            .ignore()
            .expire(&token_key, self.ttl_secs)
            .ignore();

        let _: () = self.run(pipe.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(Self::window_key(key))
            .ignore()
            .del(Self::token_key(key))
            .ignore();

        let _: () = self.run(pipe.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn close(&self) {
        // The connection manager closes its connections on drop.
        debug!("redis store closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Connects to REDIS_URL (default localhost). Tests are skipped when no
    /// server is reachable.
    async fn test_store() -> Option<RedisStore> {
        let config = RedisStoreConfig {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            ttl: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(1),
            command_timeout: Duration::from_secs(1),
        };
        RedisStore::connect(config).await.ok()
    }

    fn unique_key(name: &str) -> String {
        format!("gatekeeper-test:{}:{}", name, Utc::now().timestamp_nanos_opt().unwrap_or(0))
    }

    fn aligned(now: DateTime<Utc>) -> DateTime<Utc> {
        DateTime::from_timestamp(now.timestamp(), 0).unwrap()
    }

    #[tokio::test]
    async fn window_increment_round_trip() {
        let Some(store) = test_store().await else { return };
        let key = unique_key("windows");
        let start = aligned(Utc::now());

        assert_eq!(store.increment(&key, start, 1).await.unwrap(), 1);
        assert_eq!(store.increment(&key, start, 3).await.unwrap(), 4);

        let windows = store.get_windows(&key, start, start).await.unwrap();
        assert_eq!(windows, vec![WindowCount { start, count: 4 }]);

        store.delete(&key).await.unwrap();
        assert!(store.get_windows(&key, start, start).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn token_state_round_trip_keeps_sub_second_precision() {
        let Some(store) = test_store().await else { return };
        let key = unique_key("tokens");

        assert_eq!(store.get_tokens(&key).await.unwrap(), None);

        let last_refill = DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap();
        let state = TokenState {
            tokens: 3.5,
            last_refill,
        };
        store.set_tokens(&key, state).await.unwrap();

        let loaded = store.get_tokens(&key).await.unwrap().unwrap();
        assert!((loaded.tokens - 3.5).abs() < f64::EPSILON);
        let skew = (loaded.last_refill - last_refill).num_milliseconds().abs();
        assert!(skew <= 1, "last_refill drifted by {skew}ms");

        store.delete(&key).await.unwrap();
    }
}
