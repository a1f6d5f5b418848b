//! State-tracking core for distributed circuit breakers
//!
//! Failure counters, open markers and half-open markers live in a shared,
//! TTL-aware store so that every process protecting the same service reaches
//! the same breaker decision without a coordinator.

pub mod config;
pub mod error;
pub mod keys;
pub mod metrics;
pub mod resilience;
pub mod store;

// Re-export commonly used types for convenience
pub use config::{BreakerConfig, BreakerPolicy};
pub use error::{Result, StoreError};
pub use keys::{Field, KeyNamespace};
pub use resilience::{CircuitBreaker, CircuitBreakerError};
pub use store::{BreakerStore, CircuitState, MemoryBreakerStore, MeteredStore};
#[cfg(feature = "redis-store")]
pub use store::RedisBreakerStore;
