use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, StoreError};

/// Fixed prefix shared by every breaker key
pub const KEY_PREFIX: &str = "circuit-breaker";

/// One of the three state fields tracked per service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Presence marker: circuit is open
    Open,
    /// Failure counter for the current counting window
    Failures,
    /// Presence marker: circuit admits trial calls
    HalfOpen,
}

impl Field {
    /// Every field, in the order a reset clears them
    pub const ALL: [Field; 3] = [Field::Open, Field::Failures, Field::HalfOpen];

    /// Key suffix for this field
    pub fn suffix(self) -> &'static str {
        match self {
            Field::Open => "open",
            Field::Failures => "failures",
            Field::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Builds `circuit-breaker:<namespace>:<service>[:<field>]` keys
///
/// The per-service prefix is computed once and kept for the life of the
/// handle. Only the derived key is cached, never a field value.
#[derive(Debug)]
pub struct KeyNamespace {
    namespace: String,
    services: DashMap<String, Arc<str>>,
}

impl KeyNamespace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            services: DashMap::new(),
        }
    }

    /// Configured namespace segment
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `circuit-breaker:<namespace>:<service>`
    pub fn service(&self, service: &str) -> Result<Arc<str>> {
        if service.is_empty() {
            return Err(StoreError::InvalidArgument(
                "service name cannot be empty".to_string(),
            ));
        }

        if let Some(cached) = self.services.get(service) {
            return Ok(Arc::clone(cached.value()));
        }

        let prefix = self
            .services
            .entry(service.to_string())
            .or_insert_with(|| {
                Arc::from(format!("{}:{}:{}", KEY_PREFIX, self.namespace, service))
            });

        Ok(Arc::clone(prefix.value()))
    }

    /// Full key for one field of a service
    pub fn key(&self, service: &str, field: Field) -> Result<String> {
        let prefix = self.service(service)?;
        Ok(format!("{}:{}", prefix, field.suffix()))
    }

    /// Number of service prefixes cached so far
    pub fn cached_services(&self) -> usize {
        self.services.len()
    }
}
