// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod article;
pub mod bootstrap;
pub mod citations;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod llm;
pub mod logging;
pub mod metrics;
pub mod scrape;
pub mod store;
pub mod synth;
pub mod transcript;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::engine::ResearchEngine;
pub use crate::error::ResearchError;
pub use crate::types::{Article, Report, ReportSource, SourceRef, TranscriptSegment};

use shuttle_axum::axum::Router;

/// Full application router: research routes plus `/metrics`.
///
/// Builds the runtime from `ResearchConfig::load_default()`; the binary and the
/// HTTP tests share this.
pub async fn app() -> anyhow::Result<Router> {
    let runtime = bootstrap::ResearchRuntime::load_default()?;
    let metrics = metrics::Metrics::init()?;
    let state = api::AppState::new(
        runtime.engine.clone(),
        runtime.articles.clone(),
        runtime.tldrs.clone(),
    );
    Ok(router(state).merge(metrics.router()))
}
