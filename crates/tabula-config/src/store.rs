//! Records table connection configuration.

use super::{expand_env, ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tabula_store::sql::{is_valid_table_name, DEFAULT_TABLE_NAME};
use tabula_store::StoreConfig;

/// Records table connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Database URL. `$VAR` and `${VAR}` are expanded from the environment.
    pub url: String,

    /// Records table name.
    pub table_name: String,

    /// Maximum lifetime of a pooled connection (seconds).
    pub max_lifetime_secs: u64,

    /// Maximum number of open connections.
    pub max_open_connections: u32,

    /// Connections kept open while idle.
    pub min_idle_connections: u32,

    /// Idle connections beyond `min_idle_connections` are closed after this
    /// many seconds.
    pub idle_timeout_secs: u64,

    /// How long to wait for a free connection (milliseconds).
    pub acquire_timeout_ms: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            url: "sqlite://tabula.db".to_string(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            max_lifetime_secs: 24 * 60 * 60,
            max_open_connections: 10,
            min_idle_connections: 0,
            idle_timeout_secs: 600,
            acquire_timeout_ms: 5000,
        }
    }
}

impl StoreSection {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::invalid("store.url", "must not be empty"));
        }

        if !is_valid_table_name(&self.table_name) {
            return Err(ConfigError::invalid(
                "store.table_name",
                "must be a plain identifier (letters, digits, underscore)",
            ));
        }

        if self.max_open_connections == 0 {
            return Err(ConfigError::invalid(
                "store.max_open_connections",
                "must be at least 1",
            ));
        }

        if self.min_idle_connections > self.max_open_connections {
            return Err(ConfigError::invalid(
                "store.min_idle_connections",
                "cannot exceed max_open_connections",
            ));
        }

        if self.idle_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "store.idle_timeout_secs",
                "must be at least 1",
            ));
        }

        if self.acquire_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "store.acquire_timeout_ms",
                "must be at least 1",
            ));
        }

        Ok(())
    }

    /// Returns the URL with environment references expanded.
    pub fn resolved_url(&self) -> String {
        expand_env(&self.url)
    }

    /// Returns the store connection parameters.
    pub fn to_store_config(&self) -> StoreConfig {
        StoreConfig {
            url: self.resolved_url(),
            table_name: self.table_name.clone(),
            max_open_connections: self.max_open_connections,
            min_idle_connections: self.min_idle_connections,
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            max_lifetime: Duration::from_secs(self.max_lifetime_secs),
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
        }
    }
}
