//! Application state - shared across all handlers.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use gatekeeper_core::dispatch::Dispatcher;
use gatekeeper_core::error::{ConfigError, StoreError};
use gatekeeper_core::ports::{Clock, Store, SystemClock};
use gatekeeper_infra::store::{MemoryStore, RedisStore, RedisStoreConfig};
use gatekeeper_infra::{FixedWindowCounter, SlidingWindowCounter, TokenBucket};

use crate::config::{AppConfig, StoreBackend};
use crate::metrics::Metrics;

/// Failures that keep the process from serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("store initialization failed: {0}")]
    Store(#[from] StoreError),

    #[error("metrics initialization failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub store: Arc<dyn Store>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Build the store, the three algorithm instances, and the dispatcher.
    pub async fn new(config: &AppConfig) -> Result<Self, StartupError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store: Arc<dyn Store> = match config.store {
            StoreBackend::Redis => {
                let store = RedisStore::connect(RedisStoreConfig {
                    url: config.redis.url.clone(),
                    ttl: Duration::from_secs(config.redis.ttl_secs),
                    connect_timeout: Duration::from_millis(config.redis.connect_timeout_ms),
                    command_timeout: Duration::from_millis(config.redis.command_timeout_ms),
                })
                .await?;
                tracing::info!("using Redis store");
                Arc::new(store)
            }
            StoreBackend::Memory => {
                tracing::info!("using in-memory store");
                Arc::new(MemoryStore::new(clock.clone()))
            }
        };

        let limits = config.limits.default.to_limit_config();

        let dispatcher = Dispatcher::new(
            Arc::new(TokenBucket::new(store.clone(), clock.clone(), &limits)),
            Arc::new(SlidingWindowCounter::new(store.clone(), clock.clone(), &limits)),
            Arc::new(FixedWindowCounter::new(store.clone(), clock.clone(), &limits)),
            config.algorithms.default,
        );

        let metrics = Metrics::new()?;

        tracing::info!(
            default_algorithm = %config.algorithms.default,
            "application state initialized"
        );

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            store,
            metrics: Arc::new(metrics),
        })
    }
}
