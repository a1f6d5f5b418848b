mod clock;
mod memory;
mod metered;
#[cfg(feature = "redis-store")]
mod redis;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::MemoryBreakerStore;
pub use metered::MeteredStore;
#[cfg(feature = "redis-store")]
pub use self::redis::RedisBreakerStore;

use async_trait::async_trait;
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{StoreBackend, StoreConfig};
use crate::error::{Result, StoreError};

/// Breaker state as seen by a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, allowing all requests through
    Closed,
    /// Failing state, rejecting all requests until the open window expires
    Open,
    /// Trial state, admitting probe calls to check if the service recovered
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "Closed"),
            CircuitState::Open => write!(f, "Open"),
            CircuitState::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Durable breaker state shared by every process that protects a service
///
/// Implementations keep three time-bounded fields per service (`open`,
/// `failures`, `half_open`). Absence of a key is the terminal state whether
/// it was deleted or expired, so no sweeper is needed. Errors always
/// propagate; a read never turns an unreachable store into `false`.
#[async_trait]
pub trait BreakerStore: Send + Sync + Debug {
    /// Whether the `open` marker is present
    async fn is_open(&self, service: &str) -> Result<bool>;

    /// Whether the `half_open` marker is present
    ///
    /// The marker outlives the open window, so this is only meaningful once
    /// `is_open` has returned `false`.
    async fn is_half_open(&self, service: &str) -> Result<bool>;

    /// Whether the failure counter (absent = 0) reached `failure_threshold`
    async fn reach_rate_limit(&self, service: &str, failure_threshold: u32) -> Result<bool>;

    /// Increment the failure counter
    ///
    /// The first failure of a window creates the counter and its expiry as
    /// one unit. Later failures keep the original expiry.
    async fn increment_failure(&self, service: &str, failure_window_secs: u64) -> Result<bool>;

    /// Clear `open`, `failures` and `half_open` together
    async fn set_success(&self, service: &str) -> Result<()>;

    /// Mark the circuit open for `time_window_secs`
    async fn set_open_circuit(&self, service: &str, time_window_secs: u64) -> Result<()>;

    /// Mark the circuit half-open for `time_window_secs + interval_to_half_open_secs`
    async fn set_half_open_circuit(
        &self,
        service: &str,
        time_window_secs: u64,
        interval_to_half_open_secs: u64,
    ) -> Result<()>;

    /// Derive the driver-visible state, consulting `is_open` before `is_half_open`
    async fn state(&self, service: &str) -> Result<CircuitState> {
        if self.is_open(service).await? {
            return Ok(CircuitState::Open);
        }

        if self.is_half_open(service).await? {
            return Ok(CircuitState::HalfOpen);
        }

        Ok(CircuitState::Closed)
    }
}

/// Build the backend selected by configuration
pub async fn from_config(config: &StoreConfig) -> Result<Arc<dyn BreakerStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryBreakerStore::new(config.namespace.clone()))),
        #[cfg(feature = "redis-store")]
        StoreBackend::Redis => {
            let mut store = RedisBreakerStore::connect_with_timeout(
                &config.redis.url,
                &config.namespace,
                std::time::Duration::from_millis(config.redis.connect_timeout_ms),
            )
            .await?;

            if let Some(ms) = config.redis.operation_timeout_ms {
                store = store.with_operation_timeout(std::time::Duration::from_millis(ms));
            }

            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis-store"))]
        StoreBackend::Redis => Err(StoreError::InvalidArgument(
            "redis backend requires the `redis-store` feature".to_string(),
        )),
    }
}

pub(crate) fn ensure_threshold(failure_threshold: u32) -> Result<()> {
    if failure_threshold == 0 {
        return Err(StoreError::InvalidArgument(
            "failure threshold must be > 0".to_string(),
        ));
    }
    Ok(())
}

/// Longest TTL any stored field may carry (ten years)
pub const MAX_WINDOW_SECS: u64 = 10 * 365 * 24 * 60 * 60;

pub(crate) fn ensure_window(name: &str, secs: u64) -> Result<()> {
    if secs == 0 {
        return Err(StoreError::InvalidArgument(format!("{} must be > 0 seconds", name)));
    }
    if secs > MAX_WINDOW_SECS {
        return Err(StoreError::InvalidArgument(format!(
            "{} must be <= {} seconds, got {}",
            name, MAX_WINDOW_SECS, secs
        )));
    }
    Ok(())
}

/// TTL of the half-open marker: the open window plus the trial interval
pub(crate) fn half_open_ttl(time_window_secs: u64, interval_secs: u64) -> Result<u64> {
    ensure_window("open window", time_window_secs)?;
    let ttl = time_window_secs.checked_add(interval_secs).ok_or_else(|| {
        StoreError::InvalidArgument("half-open interval overflows the window".to_string())
    })?;
    ensure_window("half-open window", ttl)?;
    Ok(ttl)
}

/// Seconds since the Unix epoch, stored as the informational marker value
pub(crate) fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
