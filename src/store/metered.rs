use async_trait::async_trait;
use std::time::Instant;

use super::BreakerStore;
use crate::error::Result;
use crate::metrics::BreakerMetrics;

/// Breaker store decorator that records per-operation metrics
///
/// ## Behavior
/// - Every operation is timed and counted by outcome
/// - Writes are logged at debug level
/// - Errors from the inner store pass through untouched
///
/// State transitions are counted by the driver, which knows the state a
/// write moves away from. A `set_success` on a Closed circuit is just an
/// operation here.
///
/// ## Example
/// ```
/// use circuit_breaker_store::store::{BreakerStore, MemoryBreakerStore, MeteredStore};
///
/// # async fn example() -> circuit_breaker_store::Result<()> {
/// let store = MeteredStore::new(MemoryBreakerStore::new("checkout"));
/// store.set_open_circuit("payments", 30).await?;
/// assert!(store.is_open("payments").await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MeteredStore<S> {
    inner: S,
    metrics: BreakerMetrics,
}

impl<S: BreakerStore> MeteredStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            metrics: BreakerMetrics::new(),
        }
    }

    /// Wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn observe<T>(&self, operation: &'static str, started: Instant, result: &Result<T>) {
        let elapsed = started.elapsed().as_secs_f64();
        self.metrics
            .record_operation(operation, result.is_ok(), elapsed);

        if let Err(e) = result {
            ::tracing::warn!(error = %e, operation, "Breaker store operation failed");
        }
    }
}

#[async_trait]
impl<S: BreakerStore> BreakerStore for MeteredStore<S> {
    async fn is_open(&self, service: &str) -> Result<bool> {
        let started = Instant::now();
        let result = self.inner.is_open(service).await;
        self.observe("is_open", started, &result);
        result
    }

    async fn is_half_open(&self, service: &str) -> Result<bool> {
        let started = Instant::now();
        let result = self.inner.is_half_open(service).await;
        self.observe("is_half_open", started, &result);
        result
    }

    async fn reach_rate_limit(&self, service: &str, failure_threshold: u32) -> Result<bool> {
        let started = Instant::now();
        let result = self
            .inner
            .reach_rate_limit(service, failure_threshold)
            .await;
        self.observe("reach_rate_limit", started, &result);
        result
    }

    async fn increment_failure(&self, service: &str, failure_window_secs: u64) -> Result<bool> {
        let started = Instant::now();
        let result = self
            .inner
            .increment_failure(service, failure_window_secs)
            .await;
        self.observe("increment_failure", started, &result);
        result
    }

    async fn set_success(&self, service: &str) -> Result<()> {
        let started = Instant::now();
        let result = self.inner.set_success(service).await;
        self.observe("set_success", started, &result);

        if result.is_ok() {
            ::tracing::debug!(service, "Breaker state cleared");
        }
        result
    }

    async fn set_open_circuit(&self, service: &str, time_window_secs: u64) -> Result<()> {
        let started = Instant::now();
        let result = self.inner.set_open_circuit(service, time_window_secs).await;
        self.observe("set_open_circuit", started, &result);

        if result.is_ok() {
            ::tracing::debug!(service, open_secs = time_window_secs, "Open marker written");
        }
        result
    }

    async fn set_half_open_circuit(
        &self,
        service: &str,
        time_window_secs: u64,
        interval_to_half_open_secs: u64,
    ) -> Result<()> {
        let started = Instant::now();
        let result = self
            .inner
            .set_half_open_circuit(service, time_window_secs, interval_to_half_open_secs)
            .await;
        self.observe("set_half_open_circuit", started, &result);

        if result.is_ok() {
            ::tracing::debug!(
                service,
                half_open_after_secs = time_window_secs,
                trial_secs = interval_to_half_open_secs,
                "Half-open marker written"
            );
        }
        result
    }
}
