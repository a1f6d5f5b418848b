use ::metrics::{counter, describe_counter, describe_histogram, histogram};
use std::sync::Once;

use crate::store::CircuitState;

static DESCRIBE: Once = Once::new();

/// Facade over the `metrics` macros for breaker store and driver events
///
/// The embedding application installs whatever recorder it exports with;
/// without one every call here is a no-op.
#[derive(Debug, Clone, Copy)]
pub struct BreakerMetrics;

impl BreakerMetrics {
    pub fn new() -> Self {
        DESCRIBE.call_once(Self::describe_metrics);
        Self
    }

    fn describe_metrics() {
        // Store metrics
        describe_counter!(
            "breaker_store_operations_total",
            "Total number of breaker store operations by outcome"
        );
        describe_histogram!(
            "breaker_store_operation_duration_seconds",
            "Breaker store operation duration in seconds"
        );

        // State metrics
        describe_counter!(
            "breaker_transitions_total",
            "Total number of circuit state transitions made by breaker drivers"
        );

        // Driver metrics
        describe_counter!(
            "breaker_calls_total",
            "Total number of protected calls by result"
        );
    }

    // Store metrics
    pub fn record_operation(&self, operation: &'static str, success: bool, duration_secs: f64) {
        let outcome = if success { "ok" } else { "error" };
        counter!(
            "breaker_store_operations_total",
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);

        histogram!(
            "breaker_store_operation_duration_seconds",
            "operation" => operation
        )
        .record(duration_secs);
    }

    // State metrics
    pub fn record_transition(&self, service: &str, to: CircuitState) {
        counter!(
            "breaker_transitions_total",
            "service" => service.to_string(),
            "to" => to.to_string()
        )
        .increment(1);
    }

    // Driver metrics
    pub fn record_call(&self, service: &str, result: &'static str) {
        counter!(
            "breaker_calls_total",
            "service" => service.to_string(),
            "result" => result
        )
        .increment(1);
    }
}

impl Default for BreakerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
