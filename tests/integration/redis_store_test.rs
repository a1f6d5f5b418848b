// Redis backend tests
// Each test skips when REDIS_URL (default redis://localhost:6379) is not reachable

use circuit_breaker_store::store::{BreakerStore, CircuitState};
use circuit_breaker_store::StoreError;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use super::test_redis;

#[tokio::test]
async fn test_redis_untouched_service_reads_closed() {
    let Some(store) = test_redis("it-fresh").await else {
        println!("Skipping test: Redis not available");
        return;
    };

    store.set_success("never-touched").await.unwrap();

    assert!(!store.is_open("never-touched").await.unwrap());
    assert!(!store.is_half_open("never-touched").await.unwrap());
    assert!(!store.reach_rate_limit("never-touched", 1).await.unwrap());
}

#[tokio::test]
async fn test_redis_counter_expires_with_window() {
    let Some(store) = test_redis("it-counter").await else {
        println!("Skipping test: Redis not available");
        return;
    };

    store.set_success("svc").await.unwrap();
    store.increment_failure("svc", 1).await.unwrap();
    store.increment_failure("svc", 1).await.unwrap();
    assert!(store.reach_rate_limit("svc", 2).await.unwrap());

    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert!(!store.reach_rate_limit("svc", 1).await.unwrap());
}

#[tokio::test]
async fn test_redis_markers_expire() {
    let Some(store) = test_redis("it-markers").await else {
        println!("Skipping test: Redis not available");
        return;
    };

    store.set_success("svc").await.unwrap();
    store.set_open_circuit("svc", 1).await.unwrap();
    store.set_half_open_circuit("svc", 1, 1).await.unwrap();
    assert_eq!(store.state("svc").await.unwrap(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(store.state("svc").await.unwrap(), CircuitState::HalfOpen);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(store.state("svc").await.unwrap(), CircuitState::Closed);
}

#[tokio::test]
async fn test_redis_concurrent_handles_count_every_failure() {
    let Some(first) = test_redis("it-concurrent").await else {
        println!("Skipping test: Redis not available");
        return;
    };
    first.set_success("svc").await.unwrap();

    // Separate handles stand in for separate processes.
    let mut handles = vec![Arc::new(first)];
    for _ in 0..3 {
        match test_redis("it-concurrent").await {
            Some(store) => handles.push(Arc::new(store)),
            None => return,
        }
    }

    let calls = join_all((0..40).map(|i| {
        let store = Arc::clone(&handles[i % handles.len()]);
        tokio::spawn(async move { store.increment_failure("svc", 60).await })
    }))
    .await;

    for call in calls {
        assert!(call.unwrap().unwrap());
    }

    assert!(handles[0].reach_rate_limit("svc", 40).await.unwrap());
    assert!(!handles[0].reach_rate_limit("svc", 41).await.unwrap());

    handles[0].set_success("svc").await.unwrap();
}

#[tokio::test]
async fn test_redis_namespaces_are_isolated() {
    let (Some(a), Some(b)) = (test_redis("it-team-a").await, test_redis("it-team-b").await) else {
        println!("Skipping test: Redis not available");
        return;
    };

    a.set_success("svc").await.unwrap();
    b.set_success("svc").await.unwrap();

    a.set_open_circuit("svc", 30).await.unwrap();
    assert!(a.is_open("svc").await.unwrap());
    assert!(!b.is_open("svc").await.unwrap());

    a.set_success("svc").await.unwrap();
}

#[tokio::test]
async fn test_redis_invalid_arguments_never_reach_server() {
    let Some(store) = test_redis("it-args").await else {
        println!("Skipping test: Redis not available");
        return;
    };

    assert!(matches!(
        store.increment_failure("", 60).await,
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        store.reach_rate_limit("svc", 0).await,
        Err(StoreError::InvalidArgument(_))
    ));
}
