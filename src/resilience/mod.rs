//! Circuit breaker driver built on the shared breaker store
//!
//! The store only persists state; this module decides when to consult and
//! mutate it around a protected call.
//!
//! # Example
//!
//! ```rust
//! use circuit_breaker_store::config::BreakerPolicy;
//! use circuit_breaker_store::resilience::CircuitBreaker;
//! use circuit_breaker_store::store::MemoryBreakerStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = BreakerPolicy {
//!     failure_threshold: 3,
//!     failure_window_secs: 60,
//!     open_window_secs: 30,
//!     half_open_interval_secs: 10,
//! };
//!
//! let store = Arc::new(MemoryBreakerStore::new("checkout"));
//! let cb = CircuitBreaker::new("payment-api", store, policy);
//!
//! let result = cb.call(async {
//!     Ok::<_, std::io::Error>(())
//! }).await;
//! # Ok(())
//! # }
//! ```

mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitBreakerStats};
pub use crate::store::CircuitState;
