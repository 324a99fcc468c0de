//! # Tabula Record Store
//!
//! A query-only repository over the records table that backs every zone
//! Tabula serves. The store answers two questions and nothing else:
//!
//! - which rows exist at an exact `(zone, host)` pair, filtered by type
//! - which distinct zones the table knows about
//!
//! Wildcard expansion, CNAME indirection and record validation all happen
//! above this layer, in the resolver.
//!
//! ## Backends
//!
//! - [`SqlRecordStore`]: sqlx connection pool over the relational table
//! - [`MemoryRecordStore`]: in-process rows, used by tests and embedders
//!
//! ## Table conventions
//!
//! `zone` holds the lowercase, fully-qualified zone name with its trailing
//! dot. `host` holds `@` for the apex, otherwise the owner name relative to
//! the zone (`www`, `*.dev`). `type` holds the record mnemonic.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tabula_proto::{Name, RecordType};
use thiserror::Error;

pub mod memory;
pub mod sql;

pub use memory::MemoryRecordStore;
pub use sql::{SqlRecordStore, StoreConfig};

/// Errors raised by a record store.
///
/// Every variant is fatal for the query that triggered it; a store never
/// hands back partial results.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database driver reported a failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The call did not complete within the query budget.
    #[error("store operation timed out")]
    Timeout,

    /// The configured table name is not a plain SQL identifier.
    #[error("invalid table name: {name:?}")]
    InvalidTable {
        /// The rejected name.
        name: String,
    },

    /// The backend is unreachable.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates a new unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// One row of the records table.
///
/// Which auxiliary columns matter depends on `rtype`: `priority` is the MX
/// preference or SRV priority, `weight`/`port`/`target` belong to SRV,
/// `flag`/`tag` to CAA, and the remaining numeric fields to SOA.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Owner relative to the zone, `@` for the apex.
    pub host: String,
    /// Owning zone.
    pub zone: Name,
    /// Record kind.
    pub rtype: RecordType,
    /// Type-dependent payload (address literal, hostname, text, CAA value).
    pub data: String,
    /// TTL in seconds, 0 for the configured default.
    pub ttl: u32,
    /// MX preference or SRV priority.
    pub priority: u16,
    /// SRV weight.
    pub weight: u16,
    /// SRV port.
    pub port: u16,
    /// SRV target host.
    pub target: String,
    /// CAA flags.
    pub flag: u8,
    /// CAA property tag.
    pub tag: String,
    /// SOA primary name server.
    pub primary_ns: String,
    /// SOA responsible mailbox.
    pub resp_person: String,
    /// SOA serial, 0 when unset.
    pub serial: u32,
    /// SOA refresh interval.
    pub refresh: u32,
    /// SOA retry interval.
    pub retry: u32,
    /// SOA expire time.
    pub expire: u32,
    /// SOA minimum TTL.
    pub minimum: u32,
}

impl RawRecord {
    /// Creates a row with the given identity and payload; every other
    /// column is empty.
    pub fn new(
        zone: Name,
        host: impl Into<String>,
        rtype: RecordType,
        data: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            zone,
            rtype,
            data: data.into(),
            ..Self::default()
        }
    }

    /// Sets the TTL.
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the MX preference / SRV priority.
    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the SRV columns.
    pub fn with_srv(mut self, priority: u16, weight: u16, port: u16, target: impl Into<String>) -> Self {
        self.priority = priority;
        self.weight = weight;
        self.port = port;
        self.target = target.into();
        self
    }

    /// Sets the CAA columns.
    pub fn with_caa(mut self, flag: u8, tag: impl Into<String>) -> Self {
        self.flag = flag;
        self.tag = tag.into();
        self
    }

    /// Sets the SOA columns.
    #[allow(clippy::too_many_arguments)]
    pub fn with_soa(
        mut self,
        primary_ns: impl Into<String>,
        resp_person: impl Into<String>,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    ) -> Self {
        self.primary_ns = primary_ns.into();
        self.resp_person = resp_person.into();
        self.serial = serial;
        self.refresh = refresh;
        self.retry = retry;
        self.expire = expire;
        self.minimum = minimum;
        self
    }

    /// Returns the owner name: the zone for `@`, otherwise `host.zone`.
    pub fn fqdn(&self) -> tabula_proto::Result<Name> {
        Name::from_relative(&self.host, &self.zone)
    }
}

/// A storage backend for the records table.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns every row stored at exactly `(zone, host)` whose type is one
    /// of `types`. No pattern matching is applied to `host`.
    async fn lookup(&self, zone: &Name, host: &str, types: &[RecordType])
        -> Result<Vec<RawRecord>>;

    /// Returns the distinct zones present in the table.
    async fn list_zones(&self) -> Result<Vec<Name>>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    async fn lookup(
        &self,
        zone: &Name,
        host: &str,
        types: &[RecordType],
    ) -> Result<Vec<RawRecord>> {
        (**self).lookup(zone, host, types).await
    }

    async fn list_zones(&self) -> Result<Vec<Name>> {
        (**self).list_zones().await
    }
}
