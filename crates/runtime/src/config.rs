//! Admission thresholds.
//!
//! [`AdmissionConfig`] can be built in code through [`AdmissionConfig::builder`] or loaded
//! from any serde format. Deserialization accepts both the snake case field names and the
//! camel case keys used by classic `httpRuntime` sections:
//!
//! ```
//! use gatehouse_runtime::config::AdmissionConfig;
//!
//! let config: AdmissionConfig = serde_json::from_str(
//!     r#"{ "minFreeThreads": 16, "appRequestQueueLimit": 100 }"#,
//! ).unwrap();
//!
//! assert_eq!(config.min_free_workers(), 16);
//! assert_eq!(config.min_free_workers_for_local(), 4);
//! assert_eq!(config.capacity_limit(), 100);
//! ```

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_MIN_FREE_WORKERS: usize = 8;
const DEFAULT_MIN_FREE_WORKERS_FOR_LOCAL: usize = 4;
const DEFAULT_CAPACITY_LIMIT: usize = 5000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("capacity limit must be at least 1, got {value}")]
    CapacityLimit { value: usize },

    #[error("worker pool of {pool_size} never has more than {min_free_workers} free workers")]
    PoolTooSmall { pool_size: usize, min_free_workers: usize },
}

/// Thresholds of an [`AdmissionQueue`](crate::admission::AdmissionQueue).
///
/// A request runs immediately while more than `min_free_workers` workers are free, or
/// more than `min_free_workers_for_local` for a request from a loopback address. Otherwise
/// it waits in a queue of at most `capacity_limit` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "AdmissionConfigBuilder")]
pub struct AdmissionConfig {
    min_free_workers: usize,
    min_free_workers_for_local: usize,
    capacity_limit: usize,
}

impl AdmissionConfig {
    pub fn builder() -> AdmissionConfigBuilder {
        AdmissionConfigBuilder::default()
    }

    pub fn min_free_workers(&self) -> usize {
        self.min_free_workers
    }

    pub fn min_free_workers_for_local(&self) -> usize {
        self.min_free_workers_for_local
    }

    pub fn capacity_limit(&self) -> usize {
        self.capacity_limit
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            min_free_workers: DEFAULT_MIN_FREE_WORKERS,
            min_free_workers_for_local: DEFAULT_MIN_FREE_WORKERS_FOR_LOCAL,
            capacity_limit: DEFAULT_CAPACITY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdmissionConfigBuilder {
    #[serde(alias = "minFreeThreads")]
    min_free_workers: usize,
    #[serde(alias = "minLocalRequestFreeThreads")]
    min_free_workers_for_local: usize,
    #[serde(alias = "appRequestQueueLimit")]
    capacity_limit: usize,
}

impl AdmissionConfigBuilder {
    #[must_use]
    pub fn min_free_workers(mut self, value: usize) -> Self {
        self.min_free_workers = value;
        self
    }

    #[must_use]
    pub fn min_free_workers_for_local(mut self, value: usize) -> Self {
        self.min_free_workers_for_local = value;
        self
    }

    #[must_use]
    pub fn capacity_limit(mut self, value: usize) -> Self {
        self.capacity_limit = value;
        self
    }

    /// # Errors
    ///
    /// [`ConfigError::CapacityLimit`] if the queue could hold no request at all.
    pub fn build(self) -> Result<AdmissionConfig, ConfigError> {
        if self.capacity_limit == 0 {
            return Err(ConfigError::CapacityLimit { value: self.capacity_limit });
        }

        Ok(AdmissionConfig {
            min_free_workers: self.min_free_workers,
            min_free_workers_for_local: self.min_free_workers_for_local,
            capacity_limit: self.capacity_limit,
        })
    }
}

impl Default for AdmissionConfigBuilder {
    fn default() -> Self {
        let defaults = AdmissionConfig::default();
        Self {
            min_free_workers: defaults.min_free_workers,
            min_free_workers_for_local: defaults.min_free_workers_for_local,
            capacity_limit: defaults.capacity_limit,
        }
    }
}

impl TryFrom<AdmissionConfigBuilder> for AdmissionConfig {
    type Error = ConfigError;

    fn try_from(builder: AdmissionConfigBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}
