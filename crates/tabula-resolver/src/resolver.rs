//! The resolver entry point.

use std::collections::HashSet;
use std::sync::Arc;

use tabula_metrics::{metrics, QueryTimer};
use tabula_proto::Record;
use tabula_store::{RecordStore, StoreError};
use tabula_zone::{ZoneCatalog, ZoneSnapshot};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument};

use crate::engine::Engine;
use crate::materialize::Materializer;
use crate::{Outcome, Query, Resolution, ResolutionContext, ResolveError, ResolverConfig, Result};

/// Resolves queries against a record store.
///
/// Cheap to share behind an `Arc`; every query runs independently and the
/// only shared state is the zone catalog snapshot.
#[derive(Debug)]
pub struct Resolver {
    engine: Engine,
    catalog: Arc<ZoneCatalog>,
    config: ResolverConfig,
}

impl Resolver {
    /// Creates a resolver over `store`. The zone catalog loads on first use.
    pub fn new(store: Arc<dyn RecordStore>, config: ResolverConfig) -> Self {
        let catalog = Arc::new(ZoneCatalog::new(
            Arc::clone(&store),
            config.zone_refresh_interval,
        ));
        let engine = Engine::new(store, Arc::clone(&catalog), Materializer::new(config.default_ttl));
        Self {
            engine,
            catalog,
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Returns the zone catalog.
    pub fn catalog(&self) -> &Arc<ZoneCatalog> {
        &self.catalog
    }

    /// Reloads the zone catalog now, within the query timeout.
    pub async fn refresh_zones(&self) -> Result<Arc<ZoneSnapshot>> {
        let deadline = Instant::now() + self.config.query_timeout;
        let result = timeout_at(deadline, self.catalog.refresh())
            .await
            .unwrap_or(Err(StoreError::Timeout));
        metrics().record_zone_refresh(result.is_ok());
        Ok(result?)
    }

    /// Resolves one query.
    #[instrument(skip(self), fields(name = %query.name, qtype = %query.qtype))]
    pub async fn resolve(&self, query: &Query) -> Result<Outcome> {
        let timer = QueryTimer::start();
        metrics().record_query(&query.qtype.to_string());

        let result = self.resolve_inner(query).await;
        metrics().record_response(match &result {
            Ok(outcome) => outcome.outcome_label(),
            Err(e) => e.outcome_label(),
        });
        timer.finish();
        result
    }

    async fn resolve_inner(&self, query: &Query) -> Result<Outcome> {
        let Some(qtype) = query.qtype.record_type() else {
            debug!("refusing unsupported query type");
            return Err(ResolveError::NotImplemented { qtype: query.qtype });
        };

        let ctx = ResolutionContext::new(&self.config);
        let snapshot = self.fresh_snapshot(&ctx).await?;
        let Some(zone) = snapshot.matches(&query.name).cloned() else {
            debug!("name outside known zones");
            return Ok(Outcome::NotServed);
        };

        let found = self.engine.find(&ctx, &zone, &query.name, &[qtype]).await?;
        let mut resolution = Resolution::new(zone);
        resolution.answers = found.answers;
        resolution.additional = dedup(found.additional);
        if resolution.answers.is_empty() {
            resolution.authority = self.engine.apex_soa(&ctx, &resolution.zone).await?;
        }

        debug!(
            zone = %resolution.zone,
            answers = resolution.answers.len(),
            authority = resolution.authority.len(),
            additional = resolution.additional.len(),
            "resolved"
        );
        Ok(Outcome::Served(resolution))
    }

    async fn fresh_snapshot(&self, ctx: &ResolutionContext) -> Result<Arc<ZoneSnapshot>> {
        let before = self.catalog.snapshot().generation();
        let result = timeout_at(ctx.deadline, self.catalog.ensure_fresh())
            .await
            .unwrap_or(Err(StoreError::Timeout));
        match &result {
            Ok(snapshot) if snapshot.generation() != before => metrics().record_zone_refresh(true),
            Ok(_) => {}
            Err(_) => metrics().record_zone_refresh(false),
        }
        Ok(result?)
    }
}

/// Removes repeated records, keeping the first occurrence.
fn dedup(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| seen.insert(record.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::time::Duration;
    use tabula_proto::{Name, QueryType, RData, RecordType, ResponseCode};
    use tabula_store::{MemoryRecordStore, RawRecord};

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    fn zone() -> Name {
        name("example.com.")
    }

    fn row(host: &str, rtype: RecordType, data: &str) -> RawRecord {
        RawRecord::new(zone(), host, rtype, data)
    }

    fn setup(rows: Vec<RawRecord>) -> (Arc<MemoryRecordStore>, Resolver) {
        let store = Arc::new(MemoryRecordStore::with_records(rows));
        let resolver = Resolver::new(store.clone(), ResolverConfig::default());
        (store, resolver)
    }

    async fn served(resolver: &Resolver, qname: &str, qtype: RecordType) -> Resolution {
        resolver
            .resolve(&Query::new(name(qname), qtype))
            .await
            .unwrap()
            .into_served()
            .expect("query should be served")
    }

    fn owners(records: &[Record]) -> Vec<String> {
        records.iter().map(|r| r.name().to_string()).collect()
    }

    #[tokio::test]
    async fn test_exact_answer() {
        let (_, resolver) = setup(vec![
            row("@", RecordType::SOA, ""),
            row("www", RecordType::A, "192.0.2.1"),
            row("www", RecordType::A, "192.0.2.2"),
        ]);

        let resolution = served(&resolver, "WWW.example.com", RecordType::A).await;
        assert_eq!(resolution.zone, zone());
        assert_eq!(resolution.answers.len(), 2);
        assert!(resolution.authority.is_empty());
        assert_eq!(resolution.response_code(), ResponseCode::NoError);
    }

    #[tokio::test]
    async fn test_not_served() {
        let (_, resolver) = setup(vec![row("www", RecordType::A, "192.0.2.1")]);
        let outcome = resolver
            .resolve(&Query::new(name("www.example.org."), RecordType::A))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::NotServed);
    }

    #[tokio::test]
    async fn test_longest_zone_wins() {
        let sub = name("sub.example.com.");
        let (_, resolver) = setup(vec![
            row("www.sub", RecordType::A, "192.0.2.1"),
            RawRecord::new(sub.clone(), "www", RecordType::A, "192.0.2.2"),
        ]);

        let resolution = served(&resolver, "www.sub.example.com.", RecordType::A).await;
        assert_eq!(resolution.zone, sub);
        assert_eq!(
            resolution.answers[0].data(),
            &RData::A("192.0.2.2".parse().unwrap())
        );
    }

    #[tokio::test]
    async fn test_transfer_and_meta_types_are_not_implemented() {
        let (store, resolver) = setup(vec![row("@", RecordType::SOA, "")]);

        for qtype in [QueryType::Axfr, QueryType::Ixfr, QueryType::Any, QueryType::Other(12)] {
            let err = resolver
                .resolve(&Query::new(zone(), qtype))
                .await
                .unwrap_err();
            assert!(matches!(err, ResolveError::NotImplemented { .. }));
            assert_eq!(err.response_code(), ResponseCode::NotImp);
        }
        assert_eq!(store.accesses(), 0);
    }

    #[tokio::test]
    async fn test_cname_chain_in_traversal_order() {
        let (_, resolver) = setup(vec![
            row("a", RecordType::CNAME, "b.example.com."),
            row("b", RecordType::CNAME, "c.example.com."),
            row("c", RecordType::A, "192.0.2.3"),
        ]);

        let resolution = served(&resolver, "a.example.com.", RecordType::A).await;
        assert_eq!(
            owners(&resolution.answers),
            vec!["a.example.com.", "b.example.com.", "c.example.com."]
        );
        assert_eq!(resolution.answers[2].record_type(), RecordType::A);
    }

    #[tokio::test]
    async fn test_cname_chain_crosses_zones() {
        let other = name("example.net.");
        let (_, resolver) = setup(vec![
            row("www", RecordType::CNAME, "web.example.net."),
            RawRecord::new(other, "web", RecordType::AAAA, "2001:db8::80"),
        ]);

        let resolution = served(&resolver, "www.example.com.", RecordType::AAAA).await;
        assert_eq!(resolution.answers.len(), 2);
        assert_eq!(resolution.answers[1].name(), &name("web.example.net."));
    }

    #[tokio::test]
    async fn test_cname_not_followed_for_other_types() {
        let (_, resolver) = setup(vec![
            row("@", RecordType::SOA, ""),
            row("www", RecordType::CNAME, "web.example.com."),
            row("web", RecordType::MX, "mail.example.com."),
        ]);

        let resolution = served(&resolver, "www.example.com.", RecordType::MX).await;
        assert!(resolution.answers.is_empty());
        assert_eq!(resolution.authority.len(), 1);
    }

    #[tokio::test]
    async fn test_chain_at_depth_bound_resolves() {
        let mut rows: Vec<RawRecord> = (0..8)
            .map(|i| row(&format!("h{i}"), RecordType::CNAME, &format!("h{}.example.com.", i + 1)))
            .collect();
        rows.push(row("h8", RecordType::A, "192.0.2.8"));
        let (_, resolver) = setup(rows);

        let resolution = served(&resolver, "h0.example.com.", RecordType::A).await;
        assert_eq!(resolution.answers.len(), 9);
    }

    #[tokio::test]
    async fn test_chain_past_depth_bound_fails() {
        let mut rows: Vec<RawRecord> = (0..9)
            .map(|i| row(&format!("h{i}"), RecordType::CNAME, &format!("h{}.example.com.", i + 1)))
            .collect();
        rows.push(row("h9", RecordType::A, "192.0.2.9"));
        let (_, resolver) = setup(rows);

        let err = resolver
            .resolve(&Query::new(name("h0.example.com."), RecordType::A))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::DepthExceeded { limit: 8, .. }));
        assert_eq!(err.response_code(), ResponseCode::ServFail);
    }

    #[tokio::test]
    async fn test_cname_cycle_is_depth_exceeded() {
        let (_, resolver) = setup(vec![
            row("a", RecordType::CNAME, "b.example.com."),
            row("b", RecordType::CNAME, "a.example.com."),
        ]);

        let err = resolver
            .resolve(&Query::new(name("a.example.com."), RecordType::A))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::DepthExceeded { .. }));
    }

    #[tokio::test]
    async fn test_wildcard_fallback() {
        let (store, resolver) = setup(vec![
            row("@", RecordType::SOA, ""),
            row("*", RecordType::A, "192.0.2.99"),
        ]);

        let resolution = served(&resolver, "a.b.example.com.", RecordType::A).await;
        assert_eq!(resolution.answers.len(), 1);
        assert_eq!(resolution.answers[0].name(), &name("a.b.example.com."));

        // A and CNAME at a.b and at *.b, then A at *.
        assert_eq!(store.lookups(), 5);
    }

    #[tokio::test]
    async fn test_closest_wildcard_wins() {
        let (_, resolver) = setup(vec![
            row("*", RecordType::A, "192.0.2.1"),
            row("*.b", RecordType::A, "192.0.2.2"),
        ]);

        let resolution = served(&resolver, "a.b.example.com.", RecordType::A).await;
        assert_eq!(
            resolution.answers[0].data(),
            &RData::A("192.0.2.2".parse().unwrap())
        );
    }

    #[tokio::test]
    async fn test_no_wildcard_for_apex() {
        let (_, resolver) = setup(vec![
            row("@", RecordType::SOA, ""),
            row("*", RecordType::A, "192.0.2.99"),
        ]);

        let resolution = served(&resolver, "example.com.", RecordType::A).await;
        assert!(resolution.answers.is_empty());
        assert_eq!(resolution.authority[0].record_type(), RecordType::SOA);
    }

    #[tokio::test]
    async fn test_wildcard_cname() {
        let (_, resolver) = setup(vec![
            row("*", RecordType::CNAME, "www.example.com."),
            row("www", RecordType::A, "192.0.2.1"),
        ]);

        let resolution = served(&resolver, "anything.example.com.", RecordType::A).await;
        assert_eq!(
            owners(&resolution.answers),
            vec!["anything.example.com.", "www.example.com."]
        );
    }

    #[tokio::test]
    async fn test_nodata_carries_soa_authority() {
        let (_, resolver) = setup(vec![
            row("@", RecordType::SOA, "").with_ttl(3600),
            row("www", RecordType::A, "192.0.2.1"),
        ]);

        let resolution = served(&resolver, "www.example.com.", RecordType::TXT).await;
        assert!(resolution.is_nodata());
        assert_eq!(resolution.authority.len(), 1);
        assert_eq!(resolution.authority[0].name(), &zone());
        assert_eq!(resolution.authority[0].ttl(), 3600);
    }

    #[tokio::test]
    async fn test_malformed_rows_are_skipped() {
        let (_, resolver) = setup(vec![
            row("www", RecordType::A, "not-an-address"),
            row("www", RecordType::A, ""),
            row("www", RecordType::A, "192.0.2.1"),
        ]);

        let resolution = served(&resolver, "www.example.com.", RecordType::A).await;
        assert_eq!(resolution.answers.len(), 1);
    }

    #[tokio::test]
    async fn test_mx_glue_is_deduplicated() {
        let (_, resolver) = setup(vec![
            row("@", RecordType::MX, "mail.example.com.").with_priority(10),
            row("@", RecordType::MX, "mail.example.com.").with_priority(20),
            row("mail", RecordType::A, "192.0.2.25"),
        ]);

        let resolution = served(&resolver, "example.com.", RecordType::MX).await;
        assert_eq!(resolution.answers.len(), 2);
        assert_eq!(resolution.additional.len(), 1);
        assert_eq!(resolution.additional[0].name(), &name("mail.example.com."));
    }

    #[tokio::test]
    async fn test_ns_and_srv_glue() {
        let (_, resolver) = setup(vec![
            row("@", RecordType::NS, "ns1.example.com."),
            row("ns1", RecordType::A, "192.0.2.53"),
            row("ns1", RecordType::AAAA, "2001:db8::53"),
            row("_sip._tcp", RecordType::SRV, "").with_srv(10, 5, 5060, "sip.example.com."),
            row("sip", RecordType::A, "192.0.2.60"),
        ]);

        let ns = served(&resolver, "example.com.", RecordType::NS).await;
        assert_eq!(ns.additional.len(), 2);

        let srv = served(&resolver, "_sip._tcp.example.com.", RecordType::SRV).await;
        assert_eq!(srv.additional.len(), 1);
        assert_eq!(srv.additional[0].name(), &name("sip.example.com."));
    }

    #[tokio::test]
    async fn test_storage_failure_is_servfail() {
        let (store, resolver) = setup(vec![row("www", RecordType::A, "192.0.2.1")]);
        store.set_unavailable(true);

        let err = resolver
            .resolve(&Query::new(name("www.example.com."), RecordType::A))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Storage(_)));
        assert_eq!(err.response_code(), ResponseCode::ServFail);
    }

    #[tokio::test]
    async fn test_failed_refresh_serves_previous_zones() {
        let store = Arc::new(MemoryRecordStore::with_records([row("www", RecordType::A, "192.0.2.1")]));
        let resolver = Resolver::new(
            store.clone(),
            ResolverConfig {
                zone_refresh_interval: Duration::ZERO,
                ..Default::default()
            },
        );
        resolver.refresh_zones().await.unwrap();

        store.set_unavailable(true);
        assert!(resolver.refresh_zones().await.is_err());
        assert_eq!(resolver.catalog().matches(&name("www.example.com.")), Some(zone()));
    }
}
