use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Time source for TTL bookkeeping in the in-process store
pub trait Clock: Send + Sync + Debug {
    /// Monotonic instant used for expiry checks
    fn now(&self) -> Instant;

    /// Wall-clock seconds stored as the `open`/`half_open` marker value
    fn unix_timestamp(&self) -> u64;
}

/// Real time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_timestamp(&self) -> u64 {
        super::unix_timestamp()
    }
}

/// Simulated clock that only moves when told to
///
/// Lets tests walk a breaker through its windows without sleeping.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    origin_unix: u64,
    offset_ms: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            origin_unix: super::unix_timestamp(),
            offset_ms: AtomicU64::new(0),
        }
    }

    /// Move simulated time forward
    pub fn advance(&self, by: Duration) {
        self.offset_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    /// Total simulated time elapsed since creation
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn unix_timestamp(&self) -> u64 {
        self.origin_unix + self.elapsed().as_secs()
    }
}
