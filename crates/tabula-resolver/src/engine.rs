//! The lookup algorithm.
//!
//! For a name inside a known zone the engine tries, in order:
//!
//! 1. the exact owner, filtered by the asked types
//! 2. for address questions, CNAME rows at the owner, each followed into
//!    whichever known zone owns its target
//! 3. wildcard owners, from the closest enclosing `*.` name outward, each
//!    retried with steps 1 and 2, without leaving the zone
//!
//! Apex questions skip step 3. Answers found at a wildcard owner are returned
//! under the query name.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tabula_metrics::metrics;
use tabula_proto::{Name, RData, Record, RecordType, APEX};
use tabula_store::{RawRecord, RecordStore, StoreError};
use tabula_zone::ZoneCatalog;
use tokio::time::timeout_at;
use tracing::{debug, warn};

use crate::glue::GlueResolver;
use crate::materialize::Materializer;
use crate::{ResolutionContext, ResolveError, Result};

/// Records found for one name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Found {
    /// Answer records in traversal order.
    pub answers: Vec<Record>,

    /// Glue for NS, MX and SRV answers. May contain duplicates.
    pub additional: Vec<Record>,
}

impl Found {
    /// Returns true if nothing was answered.
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    fn append(&mut self, other: Found) {
        self.answers.extend(other.answers);
        self.additional.extend(other.additional);
    }
}

/// The resolution engine.
pub struct Engine {
    store: Arc<dyn RecordStore>,
    catalog: Arc<ZoneCatalog>,
    materializer: Materializer,
}

impl Engine {
    /// Creates an engine over `store`, resolving CNAME targets through `catalog`.
    pub fn new(store: Arc<dyn RecordStore>, catalog: Arc<ZoneCatalog>, materializer: Materializer) -> Self {
        Self {
            store,
            catalog,
            materializer,
        }
    }

    /// Returns the zone catalog.
    pub fn catalog(&self) -> &Arc<ZoneCatalog> {
        &self.catalog
    }

    /// Returns the materializer.
    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    /// Finds records of `types` for `qname` inside `zone`.
    ///
    /// Boxed because CNAME following and glue resolution re-enter it.
    pub fn find<'a>(
        &'a self,
        ctx: &'a ResolutionContext,
        zone: &'a Name,
        qname: &'a Name,
        types: &'a [RecordType],
    ) -> BoxFuture<'a, Result<Found>> {
        async move {
            let found = self.find_at(ctx, zone, qname, qname, types).await?;
            if !found.is_empty() || qname == zone {
                return Ok(found);
            }

            let mut candidate = qname.clone();
            while let Some(wildcard) = next_wildcard(&candidate, zone) {
                debug!(name = %qname, wildcard = %wildcard, "trying wildcard owner");
                let found = self.find_at(ctx, zone, &wildcard, qname, types).await?;
                if !found.is_empty() {
                    return Ok(found);
                }
                candidate = wildcard;
            }

            debug!(name = %qname, zone = %zone, "no records");
            Ok(Found::default())
        }
        .boxed()
    }

    /// Returns the zone apex SOA, used as authority for empty answers.
    pub async fn apex_soa(&self, ctx: &ResolutionContext, zone: &Name) -> Result<Vec<Record>> {
        let rows = self.lookup(ctx, zone, APEX, &[RecordType::SOA]).await?;
        Ok(self.materialize_all(&rows).collect())
    }

    /// Steps 1 and 2 at a single owner. Records are renamed to `qname`.
    async fn find_at(
        &self,
        ctx: &ResolutionContext,
        zone: &Name,
        owner: &Name,
        qname: &Name,
        types: &[RecordType],
    ) -> Result<Found> {
        let Some(host) = owner.relative_to(zone) else {
            return Ok(Found::default());
        };

        let mut found = Found::default();
        let rows = self.lookup(ctx, zone, &host, types).await?;
        for record in self.materialize_all(&rows) {
            self.push_answer(ctx, &mut found, rename(record, owner, qname)).await?;
        }

        if !found.is_empty() || !follows_cname(types) {
            return Ok(found);
        }

        let rows = self.lookup(ctx, zone, &host, &[RecordType::CNAME]).await?;
        for record in self.materialize_all(&rows) {
            let RData::CNAME(target) = record.data() else {
                continue;
            };
            let target = target.clone();
            let child = match ctx.child(&target) {
                Ok(child) => child,
                Err(e) => {
                    warn!(
                        name = %qname,
                        target = %target,
                        depth = ctx.depth,
                        "CNAME chain too deep, stored data likely contains a cycle"
                    );
                    return Err(e);
                }
            };
            found.answers.push(rename(record, owner, qname));

            let Some(target_zone) = self.catalog.matches(&target) else {
                debug!(target = %target, "CNAME target outside known zones");
                continue;
            };
            debug!(target = %target, zone = %target_zone, depth = child.depth, "following CNAME");
            found.append(self.find(&child, &target_zone, &target, types).await?);
        }

        Ok(found)
    }

    async fn push_answer(&self, ctx: &ResolutionContext, found: &mut Found, record: Record) -> Result<()> {
        if let Some(target) = record.data().glue_target() {
            let glue = GlueResolver::new(self).resolve(ctx, target).await?;
            found.additional.extend(glue);
        }
        found.answers.push(record);
        Ok(())
    }

    /// Store lookup bounded by the query deadline.
    async fn lookup(
        &self,
        ctx: &ResolutionContext,
        zone: &Name,
        host: &str,
        types: &[RecordType],
    ) -> Result<Vec<RawRecord>> {
        let rows = timeout_at(ctx.deadline, self.store.lookup(zone, host, types))
            .await
            .map_err(|_| ResolveError::Storage(StoreError::Timeout))??;
        Ok(rows)
    }

    fn materialize_all<'r>(&'r self, rows: &'r [RawRecord]) -> impl Iterator<Item = Record> + 'r {
        rows.iter().filter_map(|row| match self.materializer.materialize(row) {
            Ok(record) => Some(record),
            Err(reason) => {
                debug!(
                    zone = %row.zone,
                    host = %row.host,
                    rtype = %row.rtype,
                    %reason,
                    "dropping malformed record"
                );
                metrics().record_dropped_record(row.rtype.as_str());
                None
            }
        })
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("catalog", &self.catalog)
            .field("materializer", &self.materializer)
            .finish_non_exhaustive()
    }
}

/// Only address questions that do not already ask for CNAME follow aliases.
fn follows_cname(types: &[RecordType]) -> bool {
    types.iter().any(|t| t.is_address()) && !types.contains(&RecordType::CNAME)
}

fn rename(record: Record, owner: &Name, qname: &Name) -> Record {
    if owner == qname {
        record
    } else {
        record.with_name(qname.clone())
    }
}

/// Next wildcard owner to try after `candidate`, staying strictly inside `zone`.
///
/// `a.b.example.com.` gives `*.b.example.com.`, which gives `*.example.com.`,
/// after which there is nothing left in `example.com.`.
pub(crate) fn next_wildcard(candidate: &Name, zone: &Name) -> Option<Name> {
    let base = if candidate.is_wildcard() {
        candidate.parent()?.parent()?
    } else {
        candidate.parent()?
    };
    let wildcard = base.to_wildcard().ok()?;
    (wildcard != *zone && wildcard.is_subdomain_of(zone)).then_some(wildcard)
}
