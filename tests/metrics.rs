// tests/metrics.rs
use std::sync::Arc;
use std::time::Duration;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use video_research::aggregate::BoundedAggregator;
use video_research::article::ArticleCache;
use video_research::discovery::StaticDiscovery;
use video_research::llm::MockGenerator;
use video_research::metrics::{Metrics, REPORT_FAILURES};
use video_research::store::MemoryArtifactStore;
use video_research::synth::ReportSynthesizer;
use video_research::transcript::StaticTranscripts;
use video_research::ResearchEngine;

#[tokio::test]
async fn metrics_endpoint_exposes_report_failures() {
    let metrics = Metrics::init().expect("recorder");
    // a second init shares the installed recorder
    let again = Metrics::init().expect("second init");

    let llm = Arc::new(MockGenerator::silent());
    let cache = Arc::new(ArticleCache::new(
        Arc::new(MemoryArtifactStore::new()),
        Arc::new(StaticTranscripts::new()),
        llm.clone(),
    ));
    let engine = ResearchEngine::new(
        Arc::new(StaticDiscovery::new(Vec::new())),
        BoundedAggregator::new(cache, 25, Duration::from_secs(90)),
        ReportSynthesizer::new(llm),
    );
    assert!(engine.run("rust").await.is_err());

    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .expect("build request");
    let resp = metrics.router().oneshot(req).await.expect("oneshot /metrics");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    let text = String::from_utf8(bytes.to_vec()).expect("utf8");
    assert!(text.contains(REPORT_FAILURES), "missing series in:\n{text}");
    assert!(text.contains(r#"kind="no_sources""#));
    assert!(again.handle.render().contains(REPORT_FAILURES));
}
