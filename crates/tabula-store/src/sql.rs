//! SQL-backed record store.
//!
//! Rows live in a single table keyed by `(zone, host, type)`. Queries are
//! issued through a bounded sqlx connection pool configured once at startup.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tabula_proto::{Name, RecordType};
use tracing::{debug, info, warn};

use crate::{RawRecord, RecordStore, Result, StoreError};

/// Default records table name.
pub const DEFAULT_TABLE_NAME: &str = "coredns_records";

const COLUMNS: &str = "host, zone, type, data, ttl, \
     priority, weight, port, target, flag, tag, \
     primary_ns, resp_person, serial, refresh, retry, expire, minimum";

/// Connection parameters for [`SqlRecordStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database URL, e.g. `sqlite:///var/lib/tabula/records.db`.
    pub url: String,

    /// Records table name.
    pub table_name: String,

    /// Maximum number of open connections.
    pub max_open_connections: u32,

    /// Number of connections kept open while idle; capped at
    /// `max_open_connections`.
    pub min_idle_connections: u32,

    /// How long a connection above `min_idle_connections` may sit idle
    /// before the pool closes it.
    pub idle_timeout: Duration,

    /// Maximum lifetime of a pooled connection.
    pub max_lifetime: Duration,

    /// How long to wait for a free connection before failing.
    pub acquire_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://tabula.db".to_string(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            max_open_connections: 10,
            min_idle_connections: 0,
            idle_timeout: Duration::from_secs(10 * 60),
            max_lifetime: Duration::from_secs(24 * 60 * 60),
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Returns true if `name` can be interpolated into SQL as a table identifier.
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A record store over a relational table.
#[derive(Debug, Clone)]
pub struct SqlRecordStore {
    pool: SqlitePool,
    table: String,
}

impl SqlRecordStore {
    /// Opens the connection pool and verifies the database is reachable.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        if !is_valid_table_name(&config.table_name) {
            return Err(StoreError::InvalidTable {
                name: config.table_name.clone(),
            });
        }

        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_open_connections)
            .min_connections(config.min_idle_connections.min(config.max_open_connections))
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;

        info!(
            table = %config.table_name,
            max_open = config.max_open_connections,
            min_idle = config.min_idle_connections,
            idle_timeout_secs = config.idle_timeout.as_secs(),
            "connected to record store"
        );

        Ok(Self {
            pool,
            table: config.table_name.clone(),
        })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: SqlitePool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if !is_valid_table_name(&table) {
            return Err(StoreError::InvalidTable { name: table });
        }
        Ok(Self { pool, table })
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the records table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the records table and its lookup index if they do not exist.
    pub async fn create_schema(&self) -> Result<()> {
        let table = &self.table;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                zone TEXT NOT NULL,
                host TEXT NOT NULL,
                type TEXT NOT NULL,
                data TEXT NOT NULL DEFAULT '',
                ttl INTEGER NOT NULL DEFAULT 0,
                priority INTEGER,
                weight INTEGER,
                port INTEGER,
                target TEXT,
                flag INTEGER,
                tag TEXT,
                primary_ns TEXT,
                resp_person TEXT,
                serial INTEGER,
                refresh INTEGER,
                retry INTEGER,
                expire INTEGER,
                minimum INTEGER,
                remark TEXT
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_lookup ON {table}(zone, host, type)"
        ))
        .execute(&self.pool)
        .await?;

        info!(table = %table, "record table ready");
        Ok(())
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RecordStore for SqlRecordStore {
    async fn lookup(
        &self,
        zone: &Name,
        host: &str,
        types: &[RecordType],
    ) -> Result<Vec<RawRecord>> {
        if types.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; types.len()].join(", ");
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE zone = ? AND host = ? AND type IN ({placeholders})",
            self.table
        );

        let mut query = sqlx::query(&sql).bind(zone.as_str()).bind(host);
        for rtype in types {
            query = query.bind(rtype.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match decode_row(row) {
                Ok(record) => records.push(record),
                Err(RowError::Malformed { column, reason }) => {
                    warn!(
                        zone = %zone,
                        host = %host,
                        column,
                        reason = %reason,
                        "dropping malformed row"
                    );
                }
                Err(RowError::Sql(e)) => return Err(e.into()),
            }
        }

        debug!(zone = %zone, host = %host, rows = records.len(), "store lookup");
        Ok(records)
    }

    async fn list_zones(&self) -> Result<Vec<Name>> {
        let rows = sqlx::query(&format!("SELECT DISTINCT zone FROM {}", self.table))
            .fetch_all(&self.pool)
            .await?;

        let mut zones = Vec::with_capacity(rows.len());
        for row in &rows {
            let raw: String = row.try_get("zone")?;
            match Name::from_str(&raw) {
                // Lookups bind the canonical form, so any other spelling
                // would be listed but never matched.
                Ok(zone) if zone.as_str() == raw => zones.push(zone),
                Ok(zone) => warn!(
                    zone = %raw,
                    expected = %zone,
                    "ignoring zone not stored as a lowercase name with a trailing dot"
                ),
                Err(e) => warn!(zone = %raw, error = %e, "ignoring unparsable zone name"),
            }
        }
        zones.sort();
        zones.dedup();
        Ok(zones)
    }
}

/// Why a single row could not be decoded.
enum RowError {
    /// The driver failed; fatal for the whole query.
    Sql(sqlx::Error),
    /// The row holds values no record can carry; only this row is dropped.
    Malformed {
        column: &'static str,
        reason: String,
    },
}

impl From<sqlx::Error> for RowError {
    fn from(e: sqlx::Error) -> Self {
        Self::Sql(e)
    }
}

fn column_text(row: &SqliteRow, column: &'static str) -> std::result::Result<String, RowError> {
    Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
}

fn column_int<T>(row: &SqliteRow, column: &'static str) -> std::result::Result<T, RowError>
where
    T: TryFrom<i64> + Default,
{
    match row.try_get::<Option<i64>, _>(column)? {
        None => Ok(T::default()),
        Some(value) => T::try_from(value).map_err(|_| RowError::Malformed {
            column,
            reason: format!("{value} is out of range"),
        }),
    }
}

fn decode_row(row: &SqliteRow) -> std::result::Result<RawRecord, RowError> {
    let zone_raw = column_text(row, "zone")?;
    let zone = Name::from_str(&zone_raw).map_err(|e| RowError::Malformed {
        column: "zone",
        reason: e.to_string(),
    })?;
    let type_raw = column_text(row, "type")?;
    let rtype = RecordType::from_str(&type_raw).map_err(|e| RowError::Malformed {
        column: "type",
        reason: e.to_string(),
    })?;

    Ok(RawRecord {
        host: column_text(row, "host")?,
        zone,
        rtype,
        data: column_text(row, "data")?,
        ttl: column_int(row, "ttl")?,
        priority: column_int(row, "priority")?,
        weight: column_int(row, "weight")?,
        port: column_int(row, "port")?,
        target: column_text(row, "target")?,
        flag: column_int(row, "flag")?,
        tag: column_text(row, "tag")?,
        primary_ns: column_text(row, "primary_ns")?,
        resp_person: column_text(row, "resp_person")?,
        serial: column_int(row, "serial")?,
        refresh: column_int(row, "refresh")?,
        retry: column_int(row, "retry")?,
        expire: column_int(row, "expire")?,
        minimum: column_int(row, "minimum")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> SqlRecordStore {
        let config = StoreConfig {
            url: format!("sqlite://{}", dir.path().join("records.db").display()),
            max_open_connections: 2,
            min_idle_connections: 1,
            ..StoreConfig::default()
        };
        let store = SqlRecordStore::connect(&config).await.unwrap();
        store.create_schema().await.unwrap();
        store
    }

    async fn insert(store: &SqlRecordStore, zone: &str, host: &str, rtype: &str, data: &str, ttl: i64) {
        sqlx::query(&format!(
            "INSERT INTO {} (zone, host, type, data, ttl) VALUES (?, ?, ?, ?, ?)",
            store.table()
        ))
        .bind(zone)
        .bind(host)
        .bind(rtype)
        .bind(data)
        .bind(ttl)
        .execute(store.pool())
        .await
        .unwrap();
    }

    #[test]
    fn test_table_name_validation() {
        assert!(is_valid_table_name("coredns_records"));
        assert!(is_valid_table_name("_records2"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("2records"));
        assert!(!is_valid_table_name("records; DROP TABLE x"));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_table() {
        let config = StoreConfig {
            table_name: "bad-name".to_string(),
            ..StoreConfig::default()
        };
        assert!(matches!(
            SqlRecordStore::connect(&config).await,
            Err(StoreError::InvalidTable { .. })
        ));
    }

    #[tokio::test]
    async fn test_lookup_by_zone_host_and_types() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        insert(&store, "example.com.", "www", "A", "192.0.2.1", 300).await;
        insert(&store, "example.com.", "www", "AAAA", "2001:db8::1", 0).await;
        insert(&store, "example.com.", "mail", "A", "192.0.2.25", 0).await;
        insert(&store, "example.org.", "www", "A", "198.51.100.1", 0).await;

        let zone = Name::from_str("example.com.").unwrap();
        let rows = store.lookup(&zone, "www", &[RecordType::A]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].data, "192.0.2.1");
        assert_eq!(rows[0].ttl, 300);
        assert_eq!(rows[0].rtype, RecordType::A);
        assert_eq!(rows[0].priority, 0);
        assert!(rows[0].target.is_empty());

        let rows = store
            .lookup(&zone, "www", &[RecordType::A, RecordType::AAAA])
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        assert!(store.lookup(&zone, "www", &[]).await.unwrap().is_empty());
        assert!(store.lookup(&zone, "*", &[RecordType::A]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_row_is_dropped() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        insert(&store, "example.com.", "www", "A", "192.0.2.1", 60).await;
        insert(&store, "example.com.", "www", "A", "192.0.2.2", -5).await;

        let zone = Name::from_str("example.com.").unwrap();
        let rows = store.lookup(&zone, "www", &[RecordType::A]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].data, "192.0.2.1");
    }

    #[tokio::test]
    async fn test_list_zones_distinct() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        insert(&store, "example.com.", "@", "SOA", "", 0).await;
        insert(&store, "example.com.", "www", "A", "192.0.2.1", 0).await;
        insert(&store, "sub.example.com.", "@", "NS", "ns1.example.com.", 0).await;

        let zones = store.list_zones().await.unwrap();
        assert_eq!(
            zones,
            vec![
                Name::from_str("example.com.").unwrap(),
                Name::from_str("sub.example.com.").unwrap()
            ]
        );
    }

    #[tokio::test]
    async fn test_list_zones_skips_non_canonical_spellings() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        insert(&store, "Example.COM.", "www", "A", "192.0.2.1", 0).await;
        insert(&store, "example.org", "www", "A", "192.0.2.2", 0).await;
        insert(&store, "example.net.", "www", "A", "192.0.2.3", 0).await;

        let zones = store.list_zones().await.unwrap();
        assert_eq!(zones, vec![Name::from_str("example.net.").unwrap()]);
    }
}
