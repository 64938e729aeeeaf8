//! Storage adapter configuration loaded via OrthoConfig.
//!
//! Values come from `REGISTRY_*` environment variables, configuration files
//! and command-line flags, in the precedence OrthoConfig defines.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::outbound::persistence::{PoolConfig, RetryPolicy};

const DEFAULT_POOL_MAX_SIZE: u32 = 10;
const DEFAULT_POOL_MIN_IDLE: u32 = 2;
const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 50;

/// Errors raised when settings cannot produce a usable adapter setup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// No database URL was configured.
    #[error("REGISTRY_DATABASE_URL is not set")]
    MissingDatabaseUrl,
    /// The pool cannot hold a single connection.
    #[error("pool max size must be at least 1")]
    EmptyPool,
}

/// Configuration for the registry's storage adapters.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "REGISTRY")]
pub struct RegistrySettings {
    /// PostgreSQL connection URL.
    pub database_url: Option<String>,
    /// Maximum pooled connections.
    pub pool_max_size: Option<u32>,
    /// Idle connections kept warm.
    pub pool_min_idle: Option<u32>,
    /// Seconds to wait for a pooled connection.
    pub connection_timeout_secs: Option<u64>,
    /// Total attempts for a transiently failing transaction.
    pub retry_attempts: Option<u32>,
    /// Delay before the first retry, in milliseconds; doubles per retry.
    pub retry_backoff_ms: Option<u64>,
}

impl RegistrySettings {
    /// Configured database URL.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::MissingDatabaseUrl`] when unset or blank.
    pub fn database_url(&self) -> Result<&str, SettingsError> {
        self.database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(SettingsError::MissingDatabaseUrl)
    }

    /// Connection pool configuration.
    ///
    /// # Errors
    ///
    /// Fails without a database URL or with a zero pool size.
    pub fn pool_config(&self) -> Result<PoolConfig, SettingsError> {
        let max_size = self.pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE);
        if max_size == 0 {
            return Err(SettingsError::EmptyPool);
        }
        let min_idle = self
            .pool_min_idle
            .unwrap_or(DEFAULT_POOL_MIN_IDLE)
            .min(max_size);

        Ok(PoolConfig::new(self.database_url()?)
            .with_max_size(max_size)
            .with_min_idle(Some(min_idle))
            .with_connection_timeout(Duration::from_secs(
                self.connection_timeout_secs
                    .unwrap_or(DEFAULT_CONNECTION_TIMEOUT_SECS),
            )))
    }

    /// Retry policy for transient storage failures.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS),
            Duration::from_millis(self.retry_backoff_ms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS)),
        )
    }
}
