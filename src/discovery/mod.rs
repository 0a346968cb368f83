// src/discovery/mod.rs
//! Source discovery: query -> ranked candidate videos.
//!
//! One page load per attempt through a [`PageRenderer`], then extraction in
//! render order. Total failure (error or zero results) is retried with
//! exponential backoff; after the last attempt discovery degrades to an empty
//! list and the engine reports `NoSources`.

pub mod extract;
pub mod http;
pub mod webdriver;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use tokio::sync::Semaphore;

use crate::config::DiscoveryConfig;
use crate::error::ResearchError;
use crate::logging::anon_hash;
use crate::metrics as m;
use crate::store::{DynArtifactStore, CONTENT_TYPE_HTML};
use crate::types::SourceRef;

pub use extract::extract_sources;
pub use http::HttpPageRenderer;
pub use webdriver::WebDriverRenderer;

#[async_trait]
pub trait SourceDiscovery: Send + Sync {
    /// Never fails: an empty list means nothing usable was found.
    async fn discover(&self, query: &str) -> Vec<SourceRef>;
}

pub type DynSourceDiscovery = Arc<dyn SourceDiscovery>;

/// Loads a page and returns its final HTML.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}

pub struct DiscoveryService {
    renderer: Arc<dyn PageRenderer>,
    snapshots: Option<DynArtifactStore>,
    search_url: String,
    max_results: usize,
    max_attempts: u32,
    backoff: Duration,
    // caps concurrent browser sessions
    sessions: Semaphore,
}

impl DiscoveryService {
    pub fn new(renderer: Arc<dyn PageRenderer>, cfg: &DiscoveryConfig) -> Self {
        Self {
            renderer,
            snapshots: None,
            search_url: cfg.search_url.clone(),
            max_results: cfg.max_results,
            max_attempts: cfg.max_attempts.max(1),
            backoff: Duration::from_millis(cfg.backoff_ms),
            sessions: Semaphore::new(cfg.max_sessions.max(1)),
        }
    }

    /// Archive each successfully extracted results page.
    pub fn with_snapshots(mut self, store: DynArtifactStore) -> Self {
        self.snapshots = Some(store);
        self
    }

    pub fn search_page_url(&self, query: &str) -> Result<String> {
        let url = reqwest::Url::parse_with_params(&self.search_url, &[("search_query", query)])?;
        Ok(url.into())
    }

    async fn attempt(&self, query: &str) -> Result<(Vec<SourceRef>, String)> {
        let url = self.search_page_url(query)?;
        let html = self.renderer.render(&url).await?;
        Ok((extract_sources(&html, self.max_results), html))
    }

    async fn archive(&self, qhash: &str, attempt: u32, html: String) {
        let Some(store) = &self.snapshots else {
            return;
        };
        let key = format!("page_source:{qhash}_{attempt}");
        if let Err(e) = store.put(&key, html.into_bytes(), CONTENT_TYPE_HTML).await {
            tracing::warn!(key, error = %e, "page snapshot not stored");
        }
    }
}

#[async_trait]
impl SourceDiscovery for DiscoveryService {
    async fn discover(&self, query: &str) -> Vec<SourceRef> {
        let qhash = anon_hash(query);
        let Ok(_session) = self.sessions.acquire().await else {
            tracing::warn!(q = %qhash, "discovery sessions closed");
            return Vec::new();
        };
        let started = Instant::now();
        let mut last_failure = String::from("no attempt made");

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let wait = self.backoff * 2u32.saturating_pow(attempt - 1);
                tracing::debug!(q = %qhash, attempt, wait_ms = wait.as_millis() as u64, "retrying discovery");
                tokio::time::sleep(wait).await;
            }
            counter!(m::DISCOVERY_ATTEMPTS).increment(1);

            match self.attempt(query).await {
                Ok((sources, html)) if !sources.is_empty() => {
                    counter!(m::SOURCES_DISCOVERED).increment(sources.len() as u64);
                    tracing::info!(
                        q = %qhash,
                        renderer = self.renderer.name(),
                        attempt,
                        sources = sources.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "discovery done"
                    );
                    self.archive(&qhash, attempt, html).await;
                    return sources;
                }
                Ok(_) => last_failure = "no results extracted".to_string(),
                Err(e) => last_failure = format!("{e:#}"),
            }
        }

        let err = ResearchError::Discovery(last_failure);
        tracing::warn!(q = %qhash, kind = err.kind(), error = %err, "discovery gave up");
        Vec::new()
    }
}

/// Fixed results for tests and offline runs.
#[derive(Default)]
pub struct StaticDiscovery {
    sources: Vec<SourceRef>,
    calls: std::sync::atomic::AtomicUsize,
}

impl StaticDiscovery {
    pub fn new(sources: Vec<SourceRef>) -> Self {
        Self {
            sources,
            calls: Default::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceDiscovery for StaticDiscovery {
    async fn discover(&self, _query: &str) -> Vec<SourceRef> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.sources.clone()
    }
}
