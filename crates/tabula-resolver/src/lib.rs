//! # Tabula Resolver
//!
//! Answers DNS questions from the records table.
//!
//! ## Pipeline
//!
//! 1. Questions for anything other than the nine stored kinds are refused as
//!    not implemented before any store or catalog access.
//! 2. The zone catalog is refreshed if stale and the longest owning zone is
//!    picked; no match means the question is [`Outcome::NotServed`].
//! 3. The [`Engine`] looks up the exact owner, follows CNAMEs for address
//!    questions and falls back to wildcard owners.
//! 4. Rows become typed records through the [`Materializer`]; rows that fail
//!    validation are dropped one by one.
//! 5. NS, MX and SRV answers pull address glue through the [`GlueResolver`].
//! 6. An empty answer is accompanied by the zone's SOA in the authority
//!    section.
//!
//! Every store call of one resolve shares a single deadline, and CNAME
//! chains are bounded by [`ResolverConfig::max_chain_depth`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

use serde::Serialize;
use std::time::Duration;
use tabula_proto::{Name, QueryType, Record, ResponseCode};
use tabula_store::StoreError;
use thiserror::Error;
use tokio::time::Instant;

pub mod engine;
pub mod glue;
pub mod materialize;
pub mod resolver;

pub use engine::{Engine, Found};
pub use glue::GlueResolver;
pub use materialize::{Dropped, Materializer};
pub use resolver::Resolver;

/// Default TTL for rows stored with `ttl = 0`.
pub const DEFAULT_TTL: u32 = 360;

/// Default bound on CNAME hops per query.
pub const DEFAULT_MAX_CHAIN_DEPTH: u8 = 8;

/// Resolver error.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The store failed or timed out.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    /// A CNAME chain ran past the configured bound.
    #[error("CNAME chain exceeds {limit} hops at {name}")]
    DepthExceeded {
        /// Name at which the bound was hit.
        name: Name,
        /// The configured bound.
        limit: u8,
    },

    /// The query type cannot be answered from the table.
    #[error("query type {qtype} is not implemented")]
    NotImplemented {
        /// The refused type.
        qtype: QueryType,
    },
}

impl ResolveError {
    /// Returns the response code the protocol layer should send.
    pub fn response_code(&self) -> ResponseCode {
        match self {
            Self::Storage(_) | Self::DepthExceeded { .. } => ResponseCode::ServFail,
            Self::NotImplemented { .. } => ResponseCode::NotImp,
        }
    }

    /// Returns the outcome label used in metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::Storage(_) | Self::DepthExceeded { .. } => "servfail",
            Self::NotImplemented { .. } => "notimp",
        }
    }
}

/// Result type for resolver operations.
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// TTL used for rows stored with `ttl = 0`.
    pub default_ttl: u32,

    /// How long a zone catalog snapshot stays fresh.
    pub zone_refresh_interval: Duration,

    /// Maximum number of CNAME hops per query.
    pub max_chain_depth: u8,

    /// Budget for all store calls of one query.
    pub query_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            zone_refresh_interval: Duration::from_secs(60),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            query_timeout: Duration::from_secs(5),
        }
    }
}

/// Per-query resolution state.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    /// CNAME hops taken so far.
    pub depth: u8,

    /// Maximum hops.
    pub max_depth: u8,

    /// Instant by which every store call must complete.
    pub deadline: Instant,
}

impl ResolutionContext {
    /// Creates a context for a query starting now.
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            depth: 0,
            max_depth: config.max_chain_depth,
            deadline: Instant::now() + config.query_timeout,
        }
    }

    /// Creates the context for following a CNAME to `target`.
    pub fn child(&self, target: &Name) -> Result<Self> {
        if self.depth >= self.max_depth {
            return Err(ResolveError::DepthExceeded {
                name: target.clone(),
                limit: self.max_depth,
            });
        }

        Ok(Self {
            depth: self.depth + 1,
            max_depth: self.max_depth,
            deadline: self.deadline,
        })
    }
}

/// A question to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    /// Query name.
    pub name: Name,

    /// Query type.
    pub qtype: QueryType,
}

impl Query {
    /// Creates a new query.
    pub fn new(name: Name, qtype: impl Into<QueryType>) -> Self {
        Self {
            name,
            qtype: qtype.into(),
        }
    }
}

/// The records produced for a served query.
///
/// An empty `answers` list with the zone SOA in `authority` means the name
/// has no data of the asked type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Zone that owns the query name.
    pub zone: Name,

    /// Answer section, in traversal order.
    pub answers: Vec<Record>,

    /// Authority section; holds the zone SOA when there are no answers.
    pub authority: Vec<Record>,

    /// Additional section: glue for NS, MX and SRV targets, without duplicates.
    pub additional: Vec<Record>,
}

impl Resolution {
    /// Creates an empty resolution for `zone`.
    pub fn new(zone: Name) -> Self {
        Self {
            zone,
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Always true; the table is the authority for its zones.
    #[inline]
    pub const fn is_authoritative(&self) -> bool {
        true
    }

    /// Always false; names outside the table are never chased.
    #[inline]
    pub const fn recursion_available(&self) -> bool {
        false
    }

    /// Returns true if no answer records were found.
    pub fn is_nodata(&self) -> bool {
        self.answers.is_empty()
    }

    /// Returns the response code for a served query.
    pub const fn response_code(&self) -> ResponseCode {
        ResponseCode::NoError
    }
}

/// Result of a successful resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The query name belongs to a known zone.
    Served(Resolution),

    /// No known zone owns the query name; the caller should hand the query on.
    NotServed,
}

impl Outcome {
    /// Returns the resolution if the query was served.
    pub fn served(&self) -> Option<&Resolution> {
        match self {
            Self::Served(resolution) => Some(resolution),
            Self::NotServed => None,
        }
    }

    /// Consumes the outcome, returning the resolution if served.
    pub fn into_served(self) -> Option<Resolution> {
        match self {
            Self::Served(resolution) => Some(resolution),
            Self::NotServed => None,
        }
    }

    /// Returns the outcome label used in metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::Served(resolution) if resolution.is_nodata() => "nodata",
            Self::Served(_) => "answer",
            Self::NotServed => "not_served",
        }
    }
}
