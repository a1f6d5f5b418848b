mod redis_store_test;

use circuit_breaker_store::RedisBreakerStore;
use std::time::Duration;

/// Connect to the test Redis, or `None` when it is not running
pub async fn test_redis(namespace: &str) -> Option<RedisBreakerStore> {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

    RedisBreakerStore::connect_with_timeout(&url, namespace, Duration::from_secs(2))
        .await
        .ok()
}
