//! End-to-end tests for Tabula.
//!
//! These drive the resolver over a real SQLite records table and over the
//! in-memory store:
//! - configuration to store and resolver wiring
//! - exact, CNAME, wildcard and glue resolution
//! - SOA placement for empty answers
//! - malformed rows and store failures
//! - concurrent queries sharing one catalog

use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::Arc;

use tabula_config::Config;
use tabula_proto::{Name, QueryType, RData, RecordType, ResponseCode};
use tabula_resolver::{Outcome, Query, Resolution, ResolveError, Resolver};
use tabula_store::{MemoryRecordStore, RawRecord, RecordStore, SqlRecordStore};
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

fn name(s: &str) -> Name {
    Name::from_str(s).unwrap()
}

fn example() -> Name {
    name("example.com.")
}

fn row(host: &str, rtype: RecordType, data: &str) -> RawRecord {
    RawRecord::new(example(), host, rtype, data)
}

/// A small but complete zone.
fn example_zone() -> Vec<RawRecord> {
    vec![
        row("@", RecordType::SOA, "").with_ttl(3600).with_soa(
            "ns1.example.com.",
            "hostmaster@example.com",
            2024060101,
            7200,
            3600,
            1209600,
            300,
        ),
        row("@", RecordType::NS, "ns1.example.com."),
        row("@", RecordType::NS, "ns2.example.net."),
        row("@", RecordType::MX, "mail.example.com.").with_priority(10),
        row("@", RecordType::TXT, &"v".repeat(600)),
        row("@", RecordType::CAA, "letsencrypt.org").with_caa(0, "issue"),
        row("ns1", RecordType::A, "192.0.2.53"),
        row("mail", RecordType::A, "192.0.2.25").with_ttl(300),
        row("mail", RecordType::AAAA, "2001:db8::25"),
        row("www", RecordType::CNAME, "web.example.com."),
        row("web", RecordType::A, "192.0.2.80"),
        row("*.apps", RecordType::A, "192.0.2.100"),
        row("_imap._tcp", RecordType::SRV, "").with_srv(0, 1, 993, "mail.example.com."),
        RawRecord::new(name("example.net."), "ns2", RecordType::A, "198.51.100.53"),
    ]
}

async fn sqlite_store(dir: &TempDir) -> SqlRecordStore {
    let yaml = format!(
        "store:\n  url: \"sqlite://{}\"\n  max_open_connections: 4\n  min_idle_connections: 1\n  idle_timeout_secs: 30\n",
        dir.path().join("records.db").display()
    );
    let config = Config::from_yaml(&yaml).unwrap();
    config.validate().unwrap();

    let store = SqlRecordStore::connect(&config.store.to_store_config())
        .await
        .unwrap();
    store.create_schema().await.unwrap();
    store
}

async fn insert(store: &SqlRecordStore, row: &RawRecord) {
    let sql = format!(
        "INSERT INTO {} (zone, host, type, data, ttl, priority, weight, port, target, flag, tag, \
         primary_ns, resp_person, serial, refresh, retry, expire, minimum) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        store.table()
    );
    sqlx::query(&sql)
        .bind(row.zone.as_str())
        .bind(row.host.as_str())
        .bind(row.rtype.as_str())
        .bind(row.data.as_str())
        .bind(i64::from(row.ttl))
        .bind(i64::from(row.priority))
        .bind(i64::from(row.weight))
        .bind(i64::from(row.port))
        .bind(row.target.as_str())
        .bind(i64::from(row.flag))
        .bind(row.tag.as_str())
        .bind(row.primary_ns.as_str())
        .bind(row.resp_person.as_str())
        .bind(i64::from(row.serial))
        .bind(i64::from(row.refresh))
        .bind(i64::from(row.retry))
        .bind(i64::from(row.expire))
        .bind(i64::from(row.minimum))
        .execute(store.pool())
        .await
        .unwrap();
}

async fn seeded_sqlite(dir: &TempDir) -> Arc<SqlRecordStore> {
    let store = sqlite_store(dir).await;
    for row in example_zone() {
        insert(&store, &row).await;
    }
    Arc::new(store)
}

fn resolver_over(store: Arc<dyn RecordStore>) -> Resolver {
    Resolver::new(store, Config::default().resolver.to_resolver_config())
}

async fn resolve(resolver: &Resolver, qname: &str, qtype: RecordType) -> Resolution {
    resolver
        .resolve(&Query::new(name(qname), qtype))
        .await
        .unwrap()
        .into_served()
        .expect("query should be served")
}

// ============================================================================
// SQLite end to end
// ============================================================================

#[tokio::test]
async fn test_sqlite_exact_and_ttl() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver_over(seeded_sqlite(&dir).await);

    let resolution = resolve(&resolver, "mail.example.com.", RecordType::A).await;
    assert_eq!(resolution.answers.len(), 1);
    assert_eq!(resolution.answers[0].ttl(), 300);
    assert_eq!(
        resolution.answers[0].data(),
        &RData::A(Ipv4Addr::new(192, 0, 2, 25))
    );

    let resolution = resolve(&resolver, "mail.example.com.", RecordType::AAAA).await;
    assert_eq!(resolution.answers[0].ttl(), 360);
}

#[tokio::test]
async fn test_sqlite_cname_wildcard_and_nodata() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver_over(seeded_sqlite(&dir).await);

    let www = resolve(&resolver, "www.example.com.", RecordType::A).await;
    let types: Vec<RecordType> = www.answers.iter().map(|r| r.record_type()).collect();
    assert_eq!(types, vec![RecordType::CNAME, RecordType::A]);

    let app = resolve(&resolver, "billing.apps.example.com.", RecordType::A).await;
    assert_eq!(app.answers.len(), 1);
    assert_eq!(app.answers[0].name(), &name("billing.apps.example.com."));

    let nodata = resolve(&resolver, "web.example.com.", RecordType::MX).await;
    assert!(nodata.answers.is_empty());
    assert_eq!(nodata.authority.len(), 1);
    let RData::SOA(soa) = nodata.authority[0].data() else {
        panic!("expected SOA in authority");
    };
    assert_eq!(soa.serial(), 2024060101);
    assert_eq!(soa.rname(), &name("hostmaster.example.com."));
}

#[tokio::test]
async fn test_sqlite_glue_and_txt() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver_over(seeded_sqlite(&dir).await);

    let ns = resolve(&resolver, "example.com.", RecordType::NS).await;
    assert_eq!(ns.answers.len(), 2);
    let glue: Vec<&Name> = ns.additional.iter().map(|r| r.name()).collect();
    assert_eq!(glue, vec![&name("ns1.example.com."), &name("ns2.example.net.")]);

    let mx = resolve(&resolver, "example.com.", RecordType::MX).await;
    assert_eq!(mx.additional.len(), 2);

    let srv = resolve(&resolver, "_imap._tcp.example.com.", RecordType::SRV).await;
    assert_eq!(srv.additional.len(), 2);

    let txt = resolve(&resolver, "example.com.", RecordType::TXT).await;
    let RData::TXT(txt) = txt.answers[0].data() else {
        panic!("expected TXT");
    };
    let lengths: Vec<usize> = txt.strings().iter().map(Vec::len).collect();
    assert_eq!(lengths, vec![255, 255, 90]);
}

#[tokio::test]
async fn test_sqlite_axfr_is_refused_without_store_access() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver_over(seeded_sqlite(&dir).await);

    let err = resolver
        .resolve(&Query::new(example(), QueryType::Axfr))
        .await
        .unwrap_err();
    assert_eq!(err.response_code(), ResponseCode::NotImp);
    assert!(resolver.catalog().snapshot().refreshed_at().is_none());
}

#[tokio::test]
async fn test_sqlite_malformed_rows_are_skipped() {
    let dir = TempDir::new().unwrap();
    let store = seeded_sqlite(&dir).await;
    insert(&store, &row("broken", RecordType::A, "999.0.0.1")).await;
    insert(&store, &row("broken", RecordType::A, "192.0.2.9")).await;
    sqlx::query(&format!(
        "INSERT INTO {} (zone, host, type, data, ttl) VALUES ('example.com.', 'broken', 'A', '192.0.2.10', -5)",
        store.table()
    ))
    .execute(store.pool())
    .await
    .unwrap();

    let resolver = resolver_over(store);
    let resolution = resolve(&resolver, "broken.example.com.", RecordType::A).await;
    assert_eq!(resolution.answers.len(), 1);
    assert_eq!(
        resolution.answers[0].data(),
        &RData::A(Ipv4Addr::new(192, 0, 2, 9))
    );
}

#[tokio::test]
async fn test_sqlite_zone_listing_and_not_served() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver_over(seeded_sqlite(&dir).await);

    let snapshot = resolver.refresh_zones().await.unwrap();
    let zones: Vec<&Name> = snapshot.zones().iter().collect();
    assert_eq!(zones, vec![&name("example.com."), &name("example.net.")]);

    let outcome = resolver
        .resolve(&Query::new(name("www.example.org."), RecordType::A))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::NotServed);
}

// ============================================================================
// In-memory store
// ============================================================================

#[tokio::test]
async fn test_memory_cname_cycle_fails_cleanly() {
    let store = Arc::new(MemoryRecordStore::with_records([
        row("a", RecordType::CNAME, "b.example.com."),
        row("b", RecordType::CNAME, "a.example.com."),
    ]));
    let resolver = resolver_over(store);

    let err = resolver
        .resolve(&Query::new(name("a.example.com."), RecordType::A))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::DepthExceeded { limit: 8, .. }));
    assert_eq!(err.response_code(), ResponseCode::ServFail);
}

#[tokio::test]
async fn test_memory_concurrent_queries_share_one_zone_load() {
    let store = Arc::new(MemoryRecordStore::with_records(example_zone()));
    let resolver = Arc::new(resolver_over(store.clone()));

    let queries = (0..32).map(|i| {
        let resolver = Arc::clone(&resolver);
        let qname = if i % 2 == 0 { "web.example.com." } else { "mail.example.com." };
        tokio::spawn(async move {
            resolver
                .resolve(&Query::new(name(qname), RecordType::A))
                .await
                .map(|outcome| outcome.into_served().map(|r| r.answers.len()))
        })
    });

    for result in futures::future::join_all(queries).await {
        assert_eq!(result.unwrap().unwrap(), Some(1));
    }
    assert_eq!(store.zone_listings(), 1);
}

#[tokio::test]
async fn test_memory_store_outage_is_servfail() {
    let store = Arc::new(MemoryRecordStore::with_records(example_zone()));
    let resolver = resolver_over(store.clone());
    resolve(&resolver, "web.example.com.", RecordType::A).await;

    store.set_unavailable(true);
    let err = resolver
        .resolve(&Query::new(name("web.example.com."), RecordType::A))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::Storage(_)));
    assert_eq!(err.response_code(), ResponseCode::ServFail);

    store.set_unavailable(false);
    resolve(&resolver, "web.example.com.", RecordType::A).await;
}

#[tokio::test]
async fn test_sqlite_non_canonical_zone_is_not_served() {
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir).await;
    for zone in ["Example.COM.", "example.org"] {
        sqlx::query(&format!(
            "INSERT INTO {} (zone, host, type, data, ttl) VALUES (?, 'www', 'A', '192.0.2.1', 0)",
            store.table()
        ))
        .bind(zone)
        .execute(store.pool())
        .await
        .unwrap();
    }

    let resolver = resolver_over(Arc::new(store));
    for qname in ["www.example.com.", "www.example.org."] {
        let outcome = resolver
            .resolve(&Query::new(name(qname), RecordType::A))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::NotServed, "{qname}");
    }
}
