use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use super::{ensure_threshold, ensure_window, half_open_ttl, unix_timestamp, BreakerStore};
use crate::error::{Result, StoreError};
use crate::keys::{Field, KeyNamespace};

/// Redis-backed breaker store shared by every instance protecting a service
///
/// Features:
/// - Async operations using `redis::aio::ConnectionManager`
/// - Automatic reconnection handled by the connection manager
/// - Keys laid out as `circuit-breaker:<namespace>:<service>:<field>`
/// - Native TTLs for every field, so no sweeper is needed
/// - `MULTI`/`EXEC` for the first-failure create and for resets
/// - Optional per-operation timeout
///
/// ## Counter creation race
/// `increment_failure` checks for the counter before choosing between a
/// plain `INCR` and `MULTI { INCR; EXPIRE }`. Two callers can both see no
/// counter and both run the transaction. `INCR` is atomic, so no increment
/// is lost; the only effect is the expiry being set twice to the same window.
#[derive(Clone)]
pub struct RedisBreakerStore {
    conn: ConnectionManager,
    keys: std::sync::Arc<KeyNamespace>,
    operation_timeout: Option<Duration>,
}

impl RedisBreakerStore {
    /// Create a store from an existing connection manager
    ///
    /// # Example
    /// ```no_run
    /// use circuit_breaker_store::store::RedisBreakerStore;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let client = redis::Client::open("redis://localhost:6379")?;
    ///     let conn = redis::aio::ConnectionManager::new(client).await?;
    ///     let store = RedisBreakerStore::new(conn, "checkout");
    ///     Ok(())
    /// }
    /// ```
    pub fn new(conn: ConnectionManager, namespace: impl Into<String>) -> Self {
        Self {
            conn,
            keys: std::sync::Arc::new(KeyNamespace::new(namespace)),
            operation_timeout: None,
        }
    }

    /// Connect to `url`, waiting at most 3 seconds
    pub async fn connect(url: &str, namespace: &str) -> Result<Self> {
        Self::connect_with_timeout(url, namespace, Duration::from_secs(3)).await
    }

    /// Connect to `url` with a custom connection timeout
    pub async fn connect_with_timeout(
        url: &str,
        namespace: &str,
        connection_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::open(url)?;

        let conn = timeout(connection_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout {
                operation: "connect",
                after: connection_timeout,
            })??;

        ::tracing::info!(namespace, "Connected breaker store to Redis");
        Ok(Self::new(conn, namespace))
    }

    /// Bound every store operation by `limit`
    pub fn with_operation_timeout(mut self, limit: Duration) -> Self {
        self.operation_timeout = Some(limit);
        self
    }

    /// Namespace used for every key written by this handle
    pub fn namespace(&self) -> &str {
        self.keys.namespace()
    }

    fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }

    async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = ::redis::RedisResult<T>>,
    {
        let result = match self.operation_timeout {
            Some(limit) => timeout(limit, fut)
                .await
                .map_err(|_| StoreError::Timeout {
                    operation,
                    after: limit,
                })?,
            None => fut.await,
        };

        result.map_err(|e| {
            ::tracing::warn!(error = %e, operation, "Redis breaker store operation failed");
            StoreError::from(e)
        })
    }

    async fn exists(&self, operation: &'static str, key: String) -> Result<bool> {
        let mut conn = self.connection();
        self.run(operation, async move { conn.exists(&key).await })
            .await
    }
}

impl std::fmt::Debug for RedisBreakerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBreakerStore")
            .field("namespace", &self.keys.namespace())
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BreakerStore for RedisBreakerStore {
    #[tracing::instrument(skip(self))]
    async fn is_open(&self, service: &str) -> Result<bool> {
        let key = self.keys.key(service, Field::Open)?;
        self.exists("is_open", key).await
    }

    #[tracing::instrument(skip(self))]
    async fn is_half_open(&self, service: &str) -> Result<bool> {
        let key = self.keys.key(service, Field::HalfOpen)?;
        self.exists("is_half_open", key).await
    }

    #[tracing::instrument(skip(self))]
    async fn reach_rate_limit(&self, service: &str, failure_threshold: u32) -> Result<bool> {
        ensure_threshold(failure_threshold)?;
        let key = self.keys.key(service, Field::Failures)?;
        let mut conn = self.connection();

        let failures: Option<u64> = self
            .run("reach_rate_limit", async move { conn.get(&key).await })
            .await?;

        let failures = failures.unwrap_or(0);
        ::tracing::debug!(failures, failure_threshold, "Read failure counter");
        Ok(failures >= u64::from(failure_threshold))
    }

    #[tracing::instrument(skip(self))]
    async fn increment_failure(&self, service: &str, failure_window_secs: u64) -> Result<bool> {
        ensure_window("failure window", failure_window_secs)?;
        let key = self.keys.key(service, Field::Failures)?;

        if self.exists("increment_failure", key.clone()).await? {
            let mut conn = self.connection();
            let count: i64 = self
                .run("increment_failure", async move { conn.incr(&key, 1).await })
                .await?;
            return Ok(count > 0);
        }

        // First failure of the window: counter and expiry land together.
        let mut conn = self.connection();
        let window = i64::try_from(failure_window_secs)
            .map_err(|_| StoreError::InvalidArgument("failure window out of range".to_string()))?;
        let (count, _expiry_set): (i64, i64) = self
            .run("increment_failure", async move {
                let mut pipe = ::redis::pipe();
                pipe.atomic().incr(&key, 1).expire(&key, window);
                pipe.query_async(&mut conn).await
            })
            .await?;

        ::tracing::debug!(window_secs = failure_window_secs, "Started failure window");
        Ok(count > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn set_success(&self, service: &str) -> Result<()> {
        let prefix = self.keys.service(service)?;
        let mut conn = self.connection();

        self.run("set_success", async move {
            let mut pipe = ::redis::pipe();
            pipe.atomic();
            for field in Field::ALL {
                pipe.del(format!("{}:{}", prefix, field.suffix())).ignore();
            }
            pipe.query_async(&mut conn).await
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn set_open_circuit(&self, service: &str, time_window_secs: u64) -> Result<()> {
        ensure_window("open window", time_window_secs)?;
        let key = self.keys.key(service, Field::Open)?;
        let mut conn = self.connection();

        self.run("set_open_circuit", async move {
            conn.set_ex(&key, unix_timestamp(), time_window_secs).await
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn set_half_open_circuit(
        &self,
        service: &str,
        time_window_secs: u64,
        interval_to_half_open_secs: u64,
    ) -> Result<()> {
        let ttl = half_open_ttl(time_window_secs, interval_to_half_open_secs)?;
        let key = self.keys.key(service, Field::HalfOpen)?;
        let mut conn = self.connection();

        self.run("set_half_open_circuit", async move {
            conn.set_ex(&key, unix_timestamp(), ttl).await
        })
        .await
    }
}
