//! Application configuration loaded from a YAML file.
//!
//! The file path comes from `CONFIG_FILE` (default `config.yaml`). A missing
//! file falls back to built-in defaults; an unreadable or invalid file is a
//! startup error - the process refuses to serve on a bad configuration.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use gatekeeper_core::domain::{Algorithm, LimitConfig};
use gatekeeper_core::error::ConfigError;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreBackend,
    pub redis: RedisSettings,
    pub algorithms: AlgorithmsConfig,
    pub limits: LimitsConfig,
    pub metrics: MetricsConfig,
}

/// Which state store backs the algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    pub url: String,
    /// TTL applied to every key so the server reclaims idle state.
    pub ttl_secs: u64,
    pub connect_timeout_ms: u64,
    pub command_timeout_ms: u64,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            ttl_secs: 24 * 60 * 60,
            connect_timeout_ms: 5000,
            command_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlgorithmsConfig {
    /// Used when a request names no algorithm.
    pub default: Algorithm,
}

impl Default for AlgorithmsConfig {
    fn default() -> Self {
        Self {
            default: Algorithm::TokenBucket,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub default: LimitSettings,
    /// Named tiers for deployments that configure per-plan limits.
    pub tiers: HashMap<String, LimitSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    pub requests: u32,
    pub window_secs: u64,
    /// Token bucket burst capacity; 0 means "same as requests".
    pub burst: u32,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            requests: 100,
            window_secs: 60,
            burst: 0,
        }
    }
}

impl LimitSettings {
    pub fn to_limit_config(&self) -> LimitConfig {
        LimitConfig::new(
            self.requests,
            Duration::from_secs(self.window_secs),
            self.burst,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `CONFIG_FILE` (default `config.yaml`).
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.yaml".to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                ConfigError::Invalid(format!("cannot read {}: {e}", path.display()))
            })?;
            serde_yaml::from_str(&raw).map_err(|e| {
                ConfigError::Invalid(format!("cannot parse {}: {e}", path.display()))
            })?
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.limits.default.to_limit_config().validate()?;
        for (name, tier) in &self.limits.tiers {
            tier.to_limit_config()
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("tier {name}: {e}")))?;
        }
        if self.metrics.enabled && !self.metrics.path.starts_with('/') {
            return Err(ConfigError::Invalid(
                "metrics path must start with '/'".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_take_defaults() {
        let config: AppConfig = serde_yaml::from_str("store: memory\n").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.algorithms.default, Algorithm::TokenBucket);
        assert_eq!(config.limits.default.requests, 100);
        assert!(config.metrics.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn parses_a_full_document() {
        let yaml = r#"
server:
  host: 127.0.0.1
  port: 9090
store: redis
redis:
  url: redis://redis:6379
  ttl_secs: 3600
algorithms:
  default: sliding_window
limits:
  default:
    requests: 50
    window_secs: 10
    burst: 75
  tiers:
    premium:
      requests: 10000
      window_secs: 3600
metrics:
  enabled: false
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.store, StoreBackend::Redis);
        assert_eq!(config.algorithms.default, Algorithm::SlidingWindow);
        assert_eq!(config.limits.default.burst, 75);
        assert_eq!(config.limits.tiers["premium"].requests, 10000);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_unknown_store_backend() {
        let result: Result<AppConfig, _> = serde_yaml::from_str("store: cassandra\n");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_zero_limit_or_window() {
        let mut config = AppConfig::default();
        config.limits.default.requests = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.limits.default.window_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_invalid_tier() {
        let mut config = AppConfig::default();
        config.limits.tiers.insert(
            "free".to_string(),
            LimitSettings {
                requests: 0,
                window_secs: 60,
                burst: 0,
            },
        );
        assert!(config.validate().is_err());
    }
}
