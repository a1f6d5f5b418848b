//! Circuit breaker driver backed by a shared [`BreakerStore`]
//!
//! Every process that builds a `CircuitBreaker` for the same service name,
//! namespace and store observes the same state, so a circuit opened by one
//! instance short-circuits calls in all of them.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────┐
//! │ Closed  │ ◄──────────────────────┐
//! │ (Normal)│                        │
//! └────┬────┘                        │
//!      │ failures >= threshold       │ trial call succeeds
//!      │ within failure window       │ (set_success)
//!      ▼                             │
//! ┌─────────┐  open window ends  ┌───┴───────┐
//! │  Open   │───────────────────►│ HalfOpen  │
//! │(Failing)│                    │ (Testing) │
//! └─────────┘◄───────────────────└───────────┘
//!              trial call fails
//! ```
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
//! let store = Arc::new(MemoryBreakerStore::new("checkout"));
//! let cb = CircuitBreaker::new("payments", store, BreakerPolicy::default());
//!
//! let result = cb.call(async {
//!     Ok::<String, std::io::Error>("Success".to_string())
//! }).await;
//!
//! match result {
//!     Ok(response) => println!("Success: {:?}", response),
//!     Err(e) => println!("Failed: {:?}", e),
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::BreakerPolicy;
use crate::error::{Result, StoreError};
use crate::metrics::BreakerMetrics;
use crate::store::{BreakerStore, CircuitState};

/// Process-local call counters, kept for logging and debugging only
#[derive(Debug, Default)]
pub struct CircuitBreakerStats {
    total_calls: AtomicU64,
    total_failures: AtomicU64,
    rejected_calls: AtomicU64,
}

impl CircuitBreakerStats {
    fn record_success(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.total_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_rejected(&self) {
        self.rejected_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Relaxed)
    }

    pub fn rejected_calls(&self) -> u64 {
        self.rejected_calls.load(Ordering::Relaxed)
    }
}

/// Circuit breaker error
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, rejecting requests
    #[error("Circuit breaker is open for {name}")]
    Open { name: String },
    /// The breaker state could not be read, so the call was not attempted
    #[error("Circuit breaker state unavailable: {0}")]
    Store(#[source] StoreError),
    /// The underlying operation failed
    #[error("Operation failed: {0}")]
    Inner(#[source] E),
}

/// Circuit breaker driver for one named service
///
/// The breaker keeps no state of its own beyond local counters: every
/// decision is read from the store, which is shared through an `Arc` and may
/// be the same handle used by many breakers.
pub struct CircuitBreaker<S: ?Sized = dyn BreakerStore> {
    name: String,
    store: Arc<S>,
    policy: BreakerPolicy,
    stats: Arc<CircuitBreakerStats>,
    metrics: BreakerMetrics,
}

impl<S: BreakerStore + ?Sized> CircuitBreaker<S> {
    /// Create a breaker for `name` on `store`
    pub fn new(name: impl Into<String>, store: Arc<S>, policy: BreakerPolicy) -> Self {
        Self {
            name: name.into(),
            store,
            policy,
            stats: Arc::new(CircuitBreakerStats::default()),
            metrics: BreakerMetrics::new(),
        }
    }

    /// Service name used for every store key
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &BreakerPolicy {
        &self.policy
    }

    pub fn stats(&self) -> &CircuitBreakerStats {
        &self.stats
    }

    /// Shared store handle
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Current state, read from the store
    pub async fn state(&self) -> Result<CircuitState> {
        self.store.state(&self.name).await
    }

    /// Whether a call may proceed now
    ///
    /// - Open: rejected
    /// - HalfOpen (open window over, trial window running): admitted as a trial
    /// - Closed with the failure threshold reached: the circuit is opened and
    ///   the call rejected
    /// - Closed otherwise: admitted
    pub async fn is_available(&self) -> Result<bool> {
        Ok(self.admit().await?.is_some())
    }

    /// Record a failed call
    ///
    /// A failed trial re-opens the circuit; any other failure counts toward
    /// the threshold.
    pub async fn record_failure(&self) -> Result<()> {
        let state = self.store.state(&self.name).await?;
        self.on_failure(state).await
    }

    /// Record a successful call, resetting the circuit to Closed
    pub async fn record_success(&self) -> Result<()> {
        let state = self.store.state(&self.name).await?;
        self.on_success(state).await
    }

    /// Execute an operation protected by the circuit breaker
    ///
    /// A store error before the call rejects it with
    /// [`CircuitBreakerError::Store`]. A store error while recording the
    /// outcome is logged and the operation's own result is returned.
    pub async fn call<F, T, E>(&self, f: F) -> std::result::Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = std::result::Result<T, E>>,
    {
        let Some(admitted) = self.admit().await.map_err(CircuitBreakerError::Store)? else {
            self.stats.record_rejected();
            self.metrics.record_call(&self.name, "rejected");
            return Err(CircuitBreakerError::Open {
                name: self.name.clone(),
            });
        };

        match f.await {
            Ok(result) => {
                self.metrics.record_call(&self.name, "success");
                if let Err(e) = self.on_success(admitted).await {
                    ::tracing::warn!(
                        circuit_breaker = %self.name,
                        error = %e,
                        "Failed to record success in breaker store"
                    );
                }
                Ok(result)
            }
            Err(err) => {
                self.metrics.record_call(&self.name, "failure");
                if let Err(e) = self.on_failure(admitted).await {
                    ::tracing::warn!(
                        circuit_breaker = %self.name,
                        error = %e,
                        "Failed to record failure in breaker store"
                    );
                }
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    /// Manually reset the circuit to Closed in every process sharing the store
    pub async fn reset(&self) -> Result<()> {
        let state = self.store.state(&self.name).await?;
        self.store.set_success(&self.name).await?;
        if state != CircuitState::Closed {
            self.metrics.record_transition(&self.name, CircuitState::Closed);
        }
        ::tracing::info!(
            circuit_breaker = %self.name,
            from = %state,
            "Circuit breaker manually reset to Closed"
        );
        Ok(())
    }

    /// The state a call is admitted in, or `None` when it must be rejected
    async fn admit(&self) -> Result<Option<CircuitState>> {
        match self.store.state(&self.name).await? {
            CircuitState::Open => Ok(None),
            CircuitState::HalfOpen => {
                ::tracing::debug!(circuit_breaker = %self.name, "Admitting trial call");
                Ok(Some(CircuitState::HalfOpen))
            }
            CircuitState::Closed => {
                let tripped = self
                    .store
                    .reach_rate_limit(&self.name, self.policy.failure_threshold)
                    .await?;

                if tripped {
                    self.open().await?;
                    ::tracing::warn!(
                        circuit_breaker = %self.name,
                        state = "Closed -> Open",
                        failure_threshold = self.policy.failure_threshold,
                        "Circuit breaker opened after reaching failure threshold"
                    );
                    return Ok(None);
                }

                Ok(Some(CircuitState::Closed))
            }
        }
    }

    async fn on_failure(&self, state: CircuitState) -> Result<()> {
        self.stats.record_failure();

        if state == CircuitState::HalfOpen {
            self.open().await?;
            ::tracing::warn!(
                circuit_breaker = %self.name,
                state = "HalfOpen -> Open",
                "Circuit breaker re-opened after failed trial call"
            );
            return Ok(());
        }

        self.store
            .increment_failure(&self.name, self.policy.failure_window_secs)
            .await?;
        Ok(())
    }

    async fn on_success(&self, state: CircuitState) -> Result<()> {
        self.stats.record_success();
        self.store.set_success(&self.name).await?;

        if state != CircuitState::Closed {
            self.metrics.record_transition(&self.name, CircuitState::Closed);
            ::tracing::info!(
                circuit_breaker = %self.name,
                from = %state,
                "Circuit breaker closed after successful call"
            );
        }
        Ok(())
    }

    async fn open(&self) -> Result<()> {
        let window = self.policy.open_window_secs;
        self.store.set_open_circuit(&self.name, window).await?;
        self.store
            .set_half_open_circuit(&self.name, window, self.policy.half_open_interval_secs)
            .await?;
        self.metrics.record_transition(&self.name, CircuitState::Open);
        Ok(())
    }
}

impl<S: ?Sized> Clone for CircuitBreaker<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            store: Arc::clone(&self.store),
            policy: self.policy,
            stats: Arc::clone(&self.stats),
            metrics: self.metrics,
        }
    }
}

impl<S: BreakerStore + ?Sized> fmt::Debug for CircuitBreaker<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("store", &self.store)
            .field("total_calls", &self.stats.total_calls())
            .field("total_failures", &self.stats.total_failures())
            .field("rejected_calls", &self.stats.rejected_calls())
            .field("policy", &self.policy)
            .finish()
    }
}
