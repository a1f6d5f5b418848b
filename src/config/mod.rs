pub mod resilience;
pub mod store;

pub use resilience::BreakerPolicy;
pub use store::{RedisConfig, StoreBackend, StoreConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix for environment variable overrides (`CIRCUIT_BREAKER__POLICY__FAILURE_THRESHOLD`)
pub const ENV_PREFIX: &str = "CIRCUIT_BREAKER";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Sources could not be read or deserialized
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    /// A value was read but is out of range
    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

/// Range checks applied after deserialization
pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Top-level configuration for a breaker deployment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Backing store selection and namespace
    #[serde(default)]
    pub store: StoreConfig,
    /// Thresholds and windows used by the driver
    #[serde(default)]
    pub policy: BreakerPolicy,
}

impl Validate for BreakerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.policy.validate()?;
        Ok(())
    }
}

/// Load configuration from `./config` and the environment
pub fn load() -> Result<BreakerConfig, ConfigError> {
    load_from("config")
}

/// Load configuration from files under `dir` and the environment
///
/// Sources, lowest precedence first:
/// 1. `<dir>/default`
/// 2. `<dir>/<APP_ENV>` (defaults to `development`)
/// 3. `<dir>/local`
/// 4. `CIRCUIT_BREAKER__*` environment variables
pub fn load_from(dir: impl AsRef<Path>) -> Result<BreakerConfig, ConfigError> {
    use ::config::{Config, Environment, File};

    let dir = dir.as_ref();
    let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
    let source = |name: &str| File::from(dir.join(name)).required(false);

    let config = Config::builder()
        .add_source(source("default"))
        .add_source(source(&env))
        .add_source(source("local"))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let breaker_config: BreakerConfig = config.try_deserialize()?;
    breaker_config.validate()?;

    ::tracing::debug!(
        namespace = %breaker_config.store.namespace,
        backend = ?breaker_config.store.backend,
        environment = %env,
        "Loaded breaker configuration"
    );

    Ok(breaker_config)
}
