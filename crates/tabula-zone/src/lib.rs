//! # Tabula Zone Catalog
//!
//! Keeps the set of zones the records table knows about and decides which
//! of them owns a query name.
//!
//! - [`ZoneSet`]: an immutable set of zone names with longest-suffix matching
//! - [`ZoneCatalog`]: the shared, periodically refreshed snapshot of a
//!   [`ZoneSet`], read without locks and replaced wholesale on refresh
//!
//! ## Refresh discipline
//!
//! Refreshes are lazy: the first query that finds the snapshot older than the
//! refresh interval reloads it. At most one reload runs at a time. Queries
//! arriving while a reload is in flight keep answering from the previous
//! snapshot; only when no snapshot was ever loaded do they wait for the
//! in-flight reload.
//!
//! A failed reload leaves the previous snapshot in place and returns the
//! error to the query that triggered it. The refresh timestamp only moves
//! on success, so while the store is down every query that observes the
//! stale snapshot attempts another reload. Expect one `list_zones` call per
//! query during a store outage.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tabula_proto::Name;
use tabula_store::{RecordStore, StoreError};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Default interval between zone reloads.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

// ============================================================================
// Zone Set
// ============================================================================

/// An immutable set of zone names.
///
/// Zones are kept ordered from most to fewest labels, so the first zone that
/// contains a name is also the longest match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneSet {
    zones: Vec<Name>,
}

impl ZoneSet {
    /// Builds a set from zone names, discarding duplicates.
    pub fn new(zones: impl IntoIterator<Item = Name>) -> Self {
        let mut zones: Vec<Name> = zones.into_iter().collect();
        zones.sort_by(|a, b| {
            b.label_count()
                .cmp(&a.label_count())
                .then_with(|| a.cmp(b))
        });
        zones.dedup();
        Self { zones }
    }

    /// Returns the zone with the most labels that contains `name` at a label
    /// boundary, or `None` if no zone does.
    pub fn matches(&self, name: &Name) -> Option<&Name> {
        self.zones.iter().find(|zone| name.is_subdomain_of(zone))
    }

    /// Returns true if `zone` is in the set.
    pub fn contains(&self, zone: &Name) -> bool {
        self.zones.contains(zone)
    }

    /// Returns the number of zones.
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Iterates zones from most to fewest labels.
    pub fn iter(&self) -> impl Iterator<Item = &Name> {
        self.zones.iter()
    }
}

impl FromIterator<Name> for ZoneSet {
    fn from_iter<I: IntoIterator<Item = Name>>(iter: I) -> Self {
        Self::new(iter)
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// One published view of the catalog.
#[derive(Debug, Clone, Default)]
pub struct ZoneSnapshot {
    zones: ZoneSet,
    refreshed_at: Option<Instant>,
    generation: u64,
}

impl ZoneSnapshot {
    /// Returns the zones in this snapshot.
    #[inline]
    pub fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    /// Returns when the snapshot was loaded, `None` before the first load.
    #[inline]
    pub fn refreshed_at(&self) -> Option<Instant> {
        self.refreshed_at
    }

    /// Returns how many successful reloads preceded this snapshot.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns true once the snapshot is older than `interval`.
    pub fn is_stale(&self, interval: Duration) -> bool {
        self.refreshed_at
            .map_or(true, |at| at.elapsed() > interval)
    }

    /// Longest-suffix match against this snapshot.
    pub fn matches(&self, name: &Name) -> Option<&Name> {
        self.zones.matches(name)
    }
}

// ============================================================================
// Zone Catalog
// ============================================================================

/// The shared zone catalog.
pub struct ZoneCatalog {
    store: Arc<dyn RecordStore>,
    snapshot: ArcSwap<ZoneSnapshot>,
    refresh_interval: Duration,
    refresh_gate: Mutex<()>,
}

impl ZoneCatalog {
    /// Creates an empty catalog; the first query triggers the initial load.
    pub fn new(store: Arc<dyn RecordStore>, refresh_interval: Duration) -> Self {
        Self {
            store,
            snapshot: ArcSwap::from_pointee(ZoneSnapshot::default()),
            refresh_interval,
            refresh_gate: Mutex::new(()),
        }
    }

    /// Returns the refresh interval.
    #[inline]
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Returns the current snapshot without refreshing.
    pub fn snapshot(&self) -> Arc<ZoneSnapshot> {
        self.snapshot.load_full()
    }

    /// Longest-suffix match against the current snapshot, without refreshing.
    pub fn matches(&self, name: &Name) -> Option<Name> {
        self.snapshot.load().matches(name).cloned()
    }

    /// Returns true if the current snapshot is due for a reload.
    pub fn is_stale(&self) -> bool {
        self.snapshot.load().is_stale(self.refresh_interval)
    }

    /// Reloads the zone list now.
    ///
    /// Callers that queue behind an in-flight reload receive its result
    /// instead of issuing their own.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Arc<ZoneSnapshot>, StoreError> {
        let seen = self.snapshot.load().generation;
        let _gate = self.refresh_gate.lock().await;

        let current = self.snapshot.load_full();
        if current.generation != seen {
            return Ok(current);
        }
        self.reload(&current).await
    }

    /// Returns a snapshot no older than the refresh interval, reloading first
    /// if needed.
    ///
    /// When another task is already reloading and a previous snapshot
    /// exists, the previous snapshot is returned immediately.
    pub async fn ensure_fresh(&self) -> Result<Arc<ZoneSnapshot>, StoreError> {
        let current = self.snapshot.load_full();
        if !current.is_stale(self.refresh_interval) {
            return Ok(current);
        }

        let _gate = match self.refresh_gate.try_lock() {
            Ok(gate) => gate,
            Err(_) if current.refreshed_at.is_some() => {
                debug!("zone reload in flight, serving previous snapshot");
                return Ok(current);
            }
            Err(_) => self.refresh_gate.lock().await,
        };

        let current = self.snapshot.load_full();
        if !current.is_stale(self.refresh_interval) {
            return Ok(current);
        }
        self.reload(&current).await
    }

    /// Loads the zone list and publishes it. Must be called with the gate held.
    async fn reload(&self, previous: &ZoneSnapshot) -> Result<Arc<ZoneSnapshot>, StoreError> {
        match self.store.list_zones().await {
            Ok(zones) => {
                let next = Arc::new(ZoneSnapshot {
                    zones: ZoneSet::new(zones),
                    refreshed_at: Some(Instant::now()),
                    generation: previous.generation + 1,
                });
                self.snapshot.store(Arc::clone(&next));
                info!(
                    zones = next.zones.len(),
                    generation = next.generation,
                    "zone catalog refreshed"
                );
                Ok(next)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    zones = previous.zones.len(),
                    "zone catalog refresh failed, keeping previous snapshot"
                );
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for ZoneCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneCatalog")
            .field("snapshot", &self.snapshot.load())
            .field("refresh_interval", &self.refresh_interval)
            .finish_non_exhaustive()
    }
}
