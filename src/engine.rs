//! # Research Engine
//! Query -> discovery -> bounded aggregation -> synthesis -> citation rewrite.
//!
//! Only `InvalidQuery`, `NoSources` and `Synthesis` leave this module; every
//! per-source failure has already been absorbed by the aggregator. No partial
//! report is returned once synthesis has been attempted.

use std::sync::Arc;
use std::time::Instant;

use metrics::counter;

use crate::aggregate::BoundedAggregator;
use crate::citations;
use crate::discovery::DynSourceDiscovery;
use crate::error::ResearchError;
use crate::logging::anon_hash;
use crate::metrics as m;
use crate::synth::ReportSynthesizer;
use crate::types::Report;

pub struct ResearchEngine {
    discovery: DynSourceDiscovery,
    aggregator: BoundedAggregator,
    synthesizer: ReportSynthesizer,
}

impl ResearchEngine {
    pub fn new(
        discovery: DynSourceDiscovery,
        aggregator: BoundedAggregator,
        synthesizer: ReportSynthesizer,
    ) -> Self {
        Self {
            discovery,
            aggregator,
            synthesizer,
        }
    }

    pub async fn run(&self, query: &str) -> Result<Report, ResearchError> {
        let res = self.run_inner(query).await;
        match &res {
            Ok(_) => counter!(m::REPORTS).increment(1),
            Err(e) => counter!(m::REPORT_FAILURES, "kind" => e.kind()).increment(1),
        }
        res
    }

    async fn run_inner(&self, query: &str) -> Result<Report, ResearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResearchError::InvalidQuery);
        }
        let q = anon_hash(query);

        // 1) Discovery
        let t = Instant::now();
        let sources = self.discovery.discover(query).await;
        tracing::info!(q = %q, sources = sources.len(), elapsed_ms = t.elapsed().as_millis() as u64, "phase: discovery");

        // 2) Aggregation
        let t = Instant::now();
        let articles = if sources.is_empty() {
            Vec::new()
        } else {
            self.aggregator.aggregate(&sources).await
        };
        tracing::info!(q = %q, articles = articles.len(), elapsed_ms = t.elapsed().as_millis() as u64, "phase: aggregation");
        if articles.is_empty() {
            tracing::warn!(q = %q, "no sources yielded content");
            return Err(ResearchError::NoSources);
        }

        // 3) Synthesis
        let t = Instant::now();
        let raw = self.synthesizer.synthesize(query, &articles).await;
        tracing::info!(q = %q, ok = raw.is_ok(), elapsed_ms = t.elapsed().as_millis() as u64, "phase: synthesis");
        let raw = raw?;

        // 4) Citations
        let report = citations::rewrite(&raw, &articles, query);
        tracing::info!(q = %q, title_len = report.title.len(), cited_sources = report.sources.len(), "report ready");
        Ok(report)
    }
}

pub type SharedEngine = Arc<ResearchEngine>;
