//! Unit tests for configuration loading
//!
//! Covers:
//! - Loading the shipped config/default.toml
//! - Environment-specific and local file overrides
//! - Environment variable precedence
//! - Validation of out-of-range values

use circuit_breaker_store::config::*;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

// Test utilities for creating temporary config directories
mod utils {
    use std::fs;
    use std::path::{Path, PathBuf};

    /// Create an empty, per-test config directory
    pub fn temp_config_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "circuit-breaker-store-{}-{}",
            std::process::id(),
            name
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Write `<dir>/<file>` with the given content
    pub fn write_config(dir: &Path, file: &str, content: &str) {
        fs::write(dir.join(file), content).unwrap();
    }

    /// Clean up environment variables read by the loader
    pub fn clean_env_vars() {
        let keys: Vec<String> = std::env::vars()
            .filter(|(k, _)| k.starts_with("CIRCUIT_BREAKER") || k == "APP_ENV")
            .map(|(k, _)| k)
            .collect();

        for key in keys {
            unsafe { std::env::remove_var(&key) };
        }
    }
}

fn base_dir(name: &str) -> PathBuf {
    let dir = utils::temp_config_dir(name);
    utils::write_config(
        &dir,
        "default.toml",
        r#"
[store]
namespace = "base"
backend = "memory"

[policy]
failure_threshold = 4
failure_window_secs = 120
"#,
    );
    dir
}

// =============================================================================
// Shipped defaults
// =============================================================================

#[test]
#[serial]
fn test_load_shipped_default_config() {
    utils::clean_env_vars();

    let config = load();
    assert!(config.is_ok(), "Failed to load default configuration: {:?}", config.err());
    let config = config.unwrap();

    assert_eq!(config.store.namespace, "default");
    assert_eq!(config.store.backend, StoreBackend::Redis);
    assert_eq!(config.store.redis.url, "redis://127.0.0.1:6379");
    assert_eq!(config.store.redis.connect_timeout_ms, 3000);
    assert_eq!(config.policy, BreakerPolicy::default());
}

#[test]
#[serial]
fn test_missing_keys_use_serde_defaults() {
    utils::clean_env_vars();
    let dir = base_dir("serde-defaults");

    let config = load_from(&dir).unwrap();

    assert_eq!(config.store.namespace, "base");
    assert_eq!(config.store.backend, StoreBackend::Memory);
    assert_eq!(config.policy.failure_threshold, 4);
    assert_eq!(config.policy.failure_window_secs, 120);
    // Not present in the file
    assert_eq!(config.policy.open_window_secs, 30);
    assert_eq!(config.policy.half_open_interval_secs, 10);
}

// =============================================================================
// Layering
// =============================================================================

#[test]
#[serial]
fn test_environment_file_overrides_default() {
    utils::clean_env_vars();
    let dir = base_dir("env-file");
    utils::write_config(
        &dir,
        "staging.toml",
        r#"
[policy]
failure_threshold = 9
"#,
    );

    unsafe { env::set_var("APP_ENV", "staging") };
    let config = load_from(&dir).unwrap();
    utils::clean_env_vars();

    assert_eq!(config.policy.failure_threshold, 9);
    assert_eq!(config.policy.failure_window_secs, 120);
}

#[test]
#[serial]
fn test_local_file_overrides_environment_file() {
    utils::clean_env_vars();
    let dir = base_dir("local-file");
    utils::write_config(&dir, "development.toml", "[store]\nnamespace = \"dev\"\n");
    utils::write_config(&dir, "local.toml", "[store]\nnamespace = \"mine\"\n");

    let config = load_from(&dir).unwrap();

    assert_eq!(config.store.namespace, "mine");
}

#[test]
#[serial]
fn test_env_vars_take_precedence() {
    utils::clean_env_vars();
    let dir = base_dir("env-vars");
    utils::write_config(&dir, "local.toml", "[store]\nnamespace = \"mine\"\n");

    unsafe {
        env::set_var("CIRCUIT_BREAKER__STORE__NAMESPACE", "checkout");
        env::set_var("CIRCUIT_BREAKER__POLICY__FAILURE_THRESHOLD", "7");
        env::set_var("CIRCUIT_BREAKER__STORE__REDIS__OPERATION_TIMEOUT_MS", "250");
    }
    let config = load_from(&dir);
    utils::clean_env_vars();

    let config = config.unwrap();
    assert_eq!(config.store.namespace, "checkout");
    assert_eq!(config.policy.failure_threshold, 7);
    assert_eq!(config.store.redis.operation_timeout_ms, Some(250));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
#[serial]
fn test_zero_threshold_is_rejected() {
    utils::clean_env_vars();
    let dir = base_dir("zero-threshold");
    utils::write_config(&dir, "local.toml", "[policy]\nfailure_threshold = 0\n");

    let err = load_from(&dir).unwrap_err();

    assert!(matches!(err, ConfigError::ValidationError(_)));
    assert!(err.to_string().contains("policy.failure_threshold"));
}

#[test]
#[serial]
fn test_wrong_type_is_a_load_error() {
    utils::clean_env_vars();
    let dir = base_dir("wrong-type");
    utils::write_config(&dir, "local.toml", "[policy]\nfailure_threshold = \"lots\"\n");

    let err = load_from(&dir).unwrap_err();

    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
#[serial]
fn test_unknown_backend_is_a_load_error() {
    utils::clean_env_vars();
    let dir = base_dir("unknown-backend");
    utils::write_config(&dir, "local.toml", "[store]\nbackend = \"memcached\"\n");

    assert!(matches!(load_from(&dir), Err(ConfigError::Load(_))));
}

#[test]
#[serial]
fn test_redis_backend_validates_url() {
    utils::clean_env_vars();
    let dir = base_dir("redis-url");
    utils::write_config(
        &dir,
        "local.toml",
        "[store]\nbackend = \"redis\"\n\n[store.redis]\nurl = \"http://nope\"\n",
    );

    let err = load_from(&dir).unwrap_err();

    assert!(err.to_string().contains("store.redis.url"));
}
