use serde::{Deserialize, Serialize};

use super::{ConfigError, Validate};

/// Which backing store holds breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Shared Redis instance, visible to every process
    Redis,
    /// In-process map, visible to this process only
    Memory,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Namespace segment of `circuit-breaker:<namespace>:<service>`
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Backend selection
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    /// Redis connection settings, used when `backend = "redis"`
    #[serde(default)]
    pub redis: RedisConfig,
}

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Maximum time to establish the connection, in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Optional bound on every store operation, in milliseconds
    #[serde(default)]
    pub operation_timeout_ms: Option<u64>,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_backend() -> StoreBackend {
    StoreBackend::Redis
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            backend: default_backend(),
            redis: RedisConfig::default(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            operation_timeout_ms: None,
        }
    }
}

impl Validate for StoreConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::ValidationError(
                "store.namespace cannot be empty".to_string(),
            ));
        }
        if self.namespace.contains(char::is_whitespace) {
            return Err(ConfigError::ValidationError(
                "store.namespace cannot contain whitespace".to_string(),
            ));
        }
        if self.backend == StoreBackend::Redis {
            self.redis.validate()?;
        }
        Ok(())
    }
}

impl Validate for RedisConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::ValidationError(
                "store.redis.url cannot be empty".to_string(),
            ));
        }
        if !(self.url.starts_with("redis://")
            || self.url.starts_with("rediss://")
            || self.url.starts_with("redis+unix://")
            || self.url.starts_with("unix://"))
        {
            return Err(ConfigError::ValidationError(format!(
                "store.redis.url has an unsupported scheme: {}",
                self.url
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "store.redis.connect_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.operation_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "store.redis.operation_timeout_ms must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}
