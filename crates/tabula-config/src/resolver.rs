//! Resolver configuration.

use super::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tabula_resolver::{ResolverConfig, DEFAULT_MAX_CHAIN_DEPTH, DEFAULT_TTL};

/// Resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSection {
    /// TTL for rows stored with `ttl = 0` (seconds).
    pub default_ttl: u32,

    /// How often the zone list is reloaded (seconds).
    pub zone_refresh_secs: u64,

    /// Maximum CNAME hops per query.
    pub max_chain_depth: u8,

    /// Budget for the store calls of one query (milliseconds).
    pub query_timeout_ms: u64,
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            zone_refresh_secs: 60,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            query_timeout_ms: 5000,
        }
    }
}

impl ResolverSection {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_chain_depth == 0 {
            return Err(ConfigError::invalid(
                "resolver.max_chain_depth",
                "must be at least 1",
            ));
        }

        if self.query_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "resolver.query_timeout_ms",
                "must be at least 1",
            ));
        }

        Ok(())
    }

    /// Returns the zone refresh interval.
    pub fn zone_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.zone_refresh_secs)
    }

    /// Returns the query timeout.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Returns the resolver parameters.
    pub fn to_resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            default_ttl: self.default_ttl,
            zone_refresh_interval: self.zone_refresh_interval(),
            max_chain_depth: self.max_chain_depth,
            query_timeout: self.query_timeout(),
        }
    }
}
