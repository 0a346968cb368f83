// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const SOURCES_DISCOVERED: &str = "research_sources_discovered_total";
pub const DISCOVERY_ATTEMPTS: &str = "research_discovery_attempts_total";
pub const CACHE_HITS: &str = "research_article_cache_hits_total";
pub const CACHE_MISSES: &str = "research_article_cache_misses_total";
pub const SOURCE_FAILURES: &str = "research_source_failures_total";
pub const SOURCE_TIMEOUTS: &str = "research_source_timeouts_total";
pub const REPORTS: &str = "research_reports_total";
pub const REPORT_FAILURES: &str = "research_report_failures_total";
pub const AGGREGATION_MS: &str = "research_aggregation_ms";

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(SOURCES_DISCOVERED, "Candidate sources returned by discovery.");
        describe_counter!(DISCOVERY_ATTEMPTS, "Discovery page loads, including retries.");
        describe_counter!(CACHE_HITS, "Articles served from the artifact store.");
        describe_counter!(CACHE_MISSES, "Articles derived from a transcript.");
        describe_counter!(SOURCE_FAILURES, "Sources dropped after a per-source failure.");
        describe_counter!(SOURCE_TIMEOUTS, "Sources abandoned at the aggregation deadline.");
        describe_counter!(REPORTS, "Reports returned to callers.");
        describe_counter!(REPORT_FAILURES, "Requests that ended without a report.");
        describe_histogram!(AGGREGATION_MS, "Aggregation wall-clock time in milliseconds.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once per process; later calls share its handle.
    pub fn init() -> anyhow::Result<Self> {
        static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();
        let handle = HANDLE.get_or_try_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))
        })?;
        ensure_described();
        Ok(Self {
            handle: handle.clone(),
        })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
