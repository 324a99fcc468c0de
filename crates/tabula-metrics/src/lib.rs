//! # Tabula Metrics
//!
//! Observability for the resolution path:
//!
//! - **Counters and histograms** through the `metrics` facade; whichever
//!   recorder the embedding server installs receives them
//! - **Structured logging** setup in [`tracing_setup`]
//!
//! Without an installed recorder every `metrics` call is a no-op, so the
//! resolver crates record unconditionally.

#![warn(missing_docs)]
#![warn(clippy::all)]

use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, LogConfig, LogFormat, LogSetupError};

/// Global metrics instance.
static METRICS: OnceCell<ResolverMetrics> = OnceCell::new();

/// Gets or initializes the global metrics instance.
pub fn metrics() -> &'static ResolverMetrics {
    METRICS.get_or_init(ResolverMetrics::new)
}

/// Resolver metrics.
///
/// Catalog and store totals are also kept locally; `tabula query` prints them
/// after each answer.
pub struct ResolverMetrics {
    zone_refreshes_total: AtomicU64,
    zone_refresh_failures: AtomicU64,
    dropped_records_total: AtomicU64,
}

impl ResolverMetrics {
    /// Creates a new metrics instance.
    pub fn new() -> Self {
        Self {
            zone_refreshes_total: AtomicU64::new(0),
            zone_refresh_failures: AtomicU64::new(0),
            dropped_records_total: AtomicU64::new(0),
        }
    }

    // =========================================================================
    // Query metrics
    // =========================================================================

    /// Records a query of the given type.
    pub fn record_query(&self, qtype: &str) {
        counter!("tabula_queries_total", "type" => qtype.to_string()).increment(1);
    }

    /// Records how a query ended (`answer`, `nodata`, `not_served`, `servfail`, `notimp`).
    pub fn record_response(&self, outcome: &'static str) {
        counter!("tabula_responses_total", "outcome" => outcome).increment(1);
    }

    /// Records query latency.
    pub fn record_latency(&self, duration: Duration) {
        histogram!("tabula_query_duration_seconds").record(duration.as_secs_f64());
    }

    // =========================================================================
    // Catalog and store metrics
    // =========================================================================

    /// Records a zone catalog reload.
    pub fn record_zone_refresh(&self, success: bool) {
        let result = if success {
            self.zone_refreshes_total.fetch_add(1, Ordering::Relaxed);
            "success"
        } else {
            self.zone_refresh_failures.fetch_add(1, Ordering::Relaxed);
            "failure"
        };
        counter!("tabula_zone_refreshes_total", "result" => result).increment(1);
    }

    /// Records a stored row that failed validation and was skipped.
    pub fn record_dropped_record(&self, rtype: &str) {
        self.dropped_records_total.fetch_add(1, Ordering::Relaxed);
        counter!("tabula_dropped_records_total", "type" => rtype.to_string()).increment(1);
    }

    // =========================================================================
    // Readback
    // =========================================================================

    /// Returns the number of successful zone reloads.
    pub fn zone_refreshes_total(&self) -> u64 {
        self.zone_refreshes_total.load(Ordering::Relaxed)
    }

    /// Returns the number of failed zone reloads.
    pub fn zone_refresh_failures(&self) -> u64 {
        self.zone_refresh_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of dropped rows.
    pub fn dropped_records_total(&self) -> u64 {
        self.dropped_records_total.load(Ordering::Relaxed)
    }
}

impl Default for ResolverMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Query timing helper.
pub struct QueryTimer {
    start: Instant,
}

impl QueryTimer {
    /// Starts a new query timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Returns the elapsed duration.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Finishes timing and records the latency.
    pub fn finish(self) {
        metrics().record_latency(self.elapsed());
    }
}
