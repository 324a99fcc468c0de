//! In-process record store.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tabula_proto::{Name, RecordType};

use crate::{RawRecord, RecordStore, Result, StoreError};

/// A record store holding its rows in memory.
///
/// Matching follows the SQL backend exactly: `(zone, host)` equality plus a
/// type filter. Access counters and an availability switch make it suitable
/// for exercising the resolver's failure paths.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    rows: RwLock<Vec<RawRecord>>,
    lookups: AtomicU64,
    listings: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given rows.
    pub fn with_records(rows: impl IntoIterator<Item = RawRecord>) -> Self {
        let store = Self::new();
        store.extend(rows);
        store
    }

    /// Appends a row.
    pub fn insert(&self, row: RawRecord) {
        self.rows.write().push(row);
    }

    /// Appends several rows.
    pub fn extend(&self, rows: impl IntoIterator<Item = RawRecord>) {
        self.rows.write().extend(rows);
    }

    /// Removes every row belonging to `zone`.
    pub fn remove_zone(&self, zone: &Name) {
        self.rows.write().retain(|row| &row.zone != zone);
    }

    /// Makes every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `lookup` calls served so far.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of `list_zones` calls served so far.
    pub fn zone_listings(&self) -> u64 {
        self.listings.load(Ordering::SeqCst)
    }

    /// Total number of store accesses.
    pub fn accesses(&self) -> u64 {
        self.lookups() + self.zone_listings()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("memory store switched off"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn lookup(
        &self,
        zone: &Name,
        host: &str,
        types: &[RecordType],
    ) -> Result<Vec<RawRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        Ok(self
            .rows
            .read()
            .iter()
            .filter(|row| &row.zone == zone && row.host == host && types.contains(&row.rtype))
            .cloned()
            .collect())
    }

    async fn list_zones(&self) -> Result<Vec<Name>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut zones: Vec<Name> = self.rows.read().iter().map(|row| row.zone.clone()).collect();
        zones.sort();
        zones.dedup();
        Ok(zones)
    }
}
