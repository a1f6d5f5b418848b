use serde::{Deserialize, Serialize};

use super::{ConfigError, Validate};
use crate::store::MAX_WINDOW_SECS;

/// Thresholds and windows the breaker driver applies to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerPolicy {
    /// Failures within one counting window that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Length of the failure-counting window in seconds
    #[serde(default = "default_failure_window_secs")]
    pub failure_window_secs: u64,
    /// How long the circuit stays open, in seconds
    #[serde(default = "default_open_window_secs")]
    pub open_window_secs: u64,
    /// Trial period after the open window, in seconds
    #[serde(default = "default_half_open_interval_secs")]
    pub half_open_interval_secs: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_failure_window_secs() -> u64 {
    60 // 1 minute
}

fn default_open_window_secs() -> u64 {
    30
}

fn default_half_open_interval_secs() -> u64 {
    10
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            failure_window_secs: default_failure_window_secs(),
            open_window_secs: default_open_window_secs(),
            half_open_interval_secs: default_half_open_interval_secs(),
        }
    }
}

impl Validate for BreakerPolicy {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "policy.failure_threshold must be > 0".to_string(),
            ));
        }
        if self.failure_window_secs == 0 {
            return Err(ConfigError::ValidationError(
                "policy.failure_window_secs must be > 0".to_string(),
            ));
        }
        if self.open_window_secs == 0 {
            return Err(ConfigError::ValidationError(
                "policy.open_window_secs must be > 0".to_string(),
            ));
        }
        if self.half_open_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "policy.half_open_interval_secs must be > 0".to_string(),
            ));
        }

        let longest = self
            .failure_window_secs
            .max(self.open_window_secs.saturating_add(self.half_open_interval_secs));
        if longest > MAX_WINDOW_SECS {
            return Err(ConfigError::ValidationError(format!(
                "policy windows must be <= {} seconds (open + half-open included)",
                MAX_WINDOW_SECS
            )));
        }
        Ok(())
    }
}
