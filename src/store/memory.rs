use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{ensure_threshold, ensure_window, half_open_ttl, BreakerStore, Clock, SystemClock};
use crate::error::{Result, StoreError};
use crate::keys::KeyNamespace;

/// A field value with its expiry
#[derive(Debug, Clone, Copy)]
struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T: Copy> Expiring<T> {
    fn new(value: T, ttl: Duration, now: Instant) -> Result<Self> {
        let expires_at = now.checked_add(ttl).ok_or_else(|| {
            StoreError::InvalidArgument(format!("ttl of {}s is out of range", ttl.as_secs()))
        })?;
        Ok(Self { value, expires_at })
    }

    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    fn live(slot: &Option<Self>, now: Instant) -> Option<T> {
        slot.as_ref().filter(|f| f.is_live(now)).map(|f| f.value)
    }
}

/// All state fields of one service, kept under a single map entry so that a
/// reset or a first-failure create is applied as one unit
#[derive(Debug, Default)]
struct ServiceRecord {
    open: Option<Expiring<u64>>,
    failures: Option<Expiring<u64>>,
    half_open: Option<Expiring<u64>>,
}

impl ServiceRecord {
    fn is_expired(&self, now: Instant) -> bool {
        Expiring::live(&self.open, now).is_none()
            && Expiring::live(&self.failures, now).is_none()
            && Expiring::live(&self.half_open, now).is_none()
    }
}

/// In-process breaker store backed by DashMap
///
/// Shares state between every task holding the same handle, which makes it
/// a drop-in for single-instance deployments and the test double for the
/// Redis backend. Time is read from an injectable [`Clock`], so TTL windows
/// can be walked with a [`ManualClock`](super::ManualClock).
///
/// ## Example
/// ```
/// use circuit_breaker_store::store::{BreakerStore, MemoryBreakerStore};
///
/// # async fn example() -> circuit_breaker_store::Result<()> {
/// let store = MemoryBreakerStore::new("checkout");
///
/// store.increment_failure("payments", 60).await?;
/// assert!(store.reach_rate_limit("payments", 1).await?);
///
/// store.set_success("payments").await?;
/// assert!(!store.reach_rate_limit("payments", 1).await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryBreakerStore {
    keys: KeyNamespace,
    records: Arc<DashMap<Arc<str>, ServiceRecord>>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
}

impl MemoryBreakerStore {
    /// Create a store on the system clock
    pub fn new(namespace: impl Into<String>) -> Self {
        Self::with_clock(namespace, Arc::new(SystemClock))
    }

    /// Create a store reading time from `clock`
    pub fn with_clock(namespace: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let shards = (num_cpus::get() * 4).next_power_of_two();

        Self {
            keys: KeyNamespace::new(namespace),
            records: Arc::new(DashMap::with_shard_amount(shards)),
            clock,
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the backing store going away (`false`) or coming back (`true`)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Current failure count for a service, treating absence as zero
    pub async fn failure_count(&self, service: &str) -> Result<u64> {
        self.check_available()?;
        let now = self.clock.now();
        let key = self.keys.service(service)?;

        Ok(self
            .records
            .get(&*key)
            .and_then(|record| Expiring::live(&record.failures, now))
            .unwrap_or(0))
    }

    /// Drop records whose fields have all expired, returning how many went
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.records.len();

        self.records.retain(|_, record| !record.is_expired(now));

        let purged = before.saturating_sub(self.records.len());
        if purged > 0 {
            ::tracing::debug!(purged, "Purged expired breaker records");
        }
        purged
    }

    /// Number of services with a stored record (expired or not)
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::unavailable("memory", "store marked unavailable"))
        }
    }

    /// Read one field, dropping the whole record when nothing in it is live
    fn read_marker<F>(&self, service: &str, field: F) -> Result<bool>
    where
        F: Fn(&ServiceRecord) -> &Option<Expiring<u64>>,
    {
        self.check_available()?;
        let now = self.clock.now();
        let key = self.keys.service(service)?;

        let (present, expired) = match self.records.get(&*key) {
            Some(record) => (
                Expiring::live(field(record.value()), now).is_some(),
                record.is_expired(now),
            ),
            None => (false, false),
        };

        if expired {
            self.records.remove_if(&*key, |_, record| record.is_expired(now));
        }

        Ok(present)
    }
}

#[async_trait]
impl BreakerStore for MemoryBreakerStore {
    async fn is_open(&self, service: &str) -> Result<bool> {
        self.read_marker(service, |record| &record.open)
    }

    async fn is_half_open(&self, service: &str) -> Result<bool> {
        self.read_marker(service, |record| &record.half_open)
    }

    async fn reach_rate_limit(&self, service: &str, failure_threshold: u32) -> Result<bool> {
        ensure_threshold(failure_threshold)?;
        let failures = self.failure_count(service).await?;
        Ok(failures >= u64::from(failure_threshold))
    }

    async fn increment_failure(&self, service: &str, failure_window_secs: u64) -> Result<bool> {
        ensure_window("failure window", failure_window_secs)?;
        self.check_available()?;
        let now = self.clock.now();
        let key = self.keys.service(service)?;
        let fresh = Expiring::new(1, Duration::from_secs(failure_window_secs), now)?;

        // The shard lock covers check and create, so there is no race window here.
        let mut record = self.records.entry(key).or_default();
        match &mut record.failures {
            Some(counter) if counter.is_live(now) => counter.value += 1,
            slot => *slot = Some(fresh),
        }

        Ok(true)
    }

    async fn set_success(&self, service: &str) -> Result<()> {
        self.check_available()?;
        let key = self.keys.service(service)?;

        self.records.remove(&*key);
        Ok(())
    }

    async fn set_open_circuit(&self, service: &str, time_window_secs: u64) -> Result<()> {
        ensure_window("open window", time_window_secs)?;
        self.check_available()?;
        let now = self.clock.now();
        let key = self.keys.service(service)?;

        let marker = Expiring::new(
            self.clock.unix_timestamp(),
            Duration::from_secs(time_window_secs),
            now,
        )?;
        self.records.entry(key).or_default().open = Some(marker);
        Ok(())
    }

    async fn set_half_open_circuit(
        &self,
        service: &str,
        time_window_secs: u64,
        interval_to_half_open_secs: u64,
    ) -> Result<()> {
        let ttl = half_open_ttl(time_window_secs, interval_to_half_open_secs)?;
        self.check_available()?;
        let now = self.clock.now();
        let key = self.keys.service(service)?;

        let marker = Expiring::new(self.clock.unix_timestamp(), Duration::from_secs(ttl), now)?;
        self.records.entry(key).or_default().half_open = Some(marker);
        Ok(())
    }
}
