use std::time::Duration;

/// Result alias used by every breaker store operation
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Errors surfaced by a breaker store
///
/// Store errors are never coerced into a breaker decision. A failed `is_open`
/// is an error, not "closed": the driver decides whether an unknown state
/// fails open or closed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached or dropped the connection
    #[error("{backend} breaker store unavailable: {source}")]
    Unavailable {
        backend: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The backing store did not answer in time
    #[error("breaker store operation `{operation}` timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The backing store answered with something we could not interpret
    #[error("breaker store protocol error: {0}")]
    Protocol(String),

    /// Caller passed an argument the store refuses to act on
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl StoreError {
    /// Build an `Unavailable` error from any backend error
    pub fn unavailable<E>(backend: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Unavailable {
            backend,
            source: source.into(),
        }
    }

    /// Whether the store could not be reached (connectivity or timeout)
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

#[cfg(feature = "redis-store")]
impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        use redis::ErrorKind;

        // Client-side timeouts carry no limit we know of; `Timeout` is reserved
        // for limits enforced by the store itself.
        if err.is_timeout() {
            return Self::unavailable("redis", err);
        }

        match err.kind() {
            ErrorKind::TypeError | ErrorKind::ResponseError | ErrorKind::ExecAbortError => {
                Self::Protocol(err.to_string())
            }
            _ => Self::unavailable("redis", err),
        }
    }
}
