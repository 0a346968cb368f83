use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use shuttle_axum::axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::article::ArticleCache;
use crate::engine::SharedEngine;
use crate::error::ResearchError;
use crate::logging::anon_hash;
use crate::types::{extract_video_id, watch_url, Report, SourceRef};

#[derive(Clone)]
pub struct AppState {
    engine: SharedEngine,
    articles: Arc<ArticleCache>,
    tldrs: Arc<ArticleCache>,
}

impl AppState {
    pub fn new(engine: SharedEngine, articles: Arc<ArticleCache>, tldrs: Arc<ArticleCache>) -> Self {
        Self {
            engine,
            articles,
            tldrs,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/deep_research", get(deep_research))
        .route("/generate_tutorial", post(generate_tutorial))
        .route("/generate_tldr", post(generate_tldr))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn error_json(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "error": msg }))).into_response()
}

#[derive(Deserialize)]
struct ResearchParams {
    #[serde(default)]
    search: String,
}

#[derive(Serialize)]
struct ReportResp {
    title: String,
    content: String,
    sources: Vec<crate::types::ReportSource>,
    generated_at: String,
}

impl From<Report> for ReportResp {
    fn from(r: Report) -> Self {
        Self {
            title: r.title,
            content: r.content,
            sources: r.sources,
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

async fn deep_research(
    State(state): State<AppState>,
    Query(params): Query<ResearchParams>,
) -> Response {
    let query = params.search.trim();
    if query.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "No search query provided");
    }
    match state.engine.run(query).await {
        Ok(report) => Json(ReportResp::from(report)).into_response(),
        Err(ResearchError::InvalidQuery) => {
            error_json(StatusCode::BAD_REQUEST, "No search query provided")
        }
        Err(e) => {
            tracing::warn!(q = %anon_hash(query), kind = e.kind(), error = %e, "deep_research failed");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate report")
        }
    }
}

#[derive(Deserialize)]
struct VideoReq {
    #[serde(default)]
    url: String,
}

/// Derive (or load) one kind of per-video text and return it as plain text.
async fn single_video(cache: &ArticleCache, url: &str, failure: &'static str) -> Response {
    let Some(id) = extract_video_id(url) else {
        return error_json(StatusCode::BAD_REQUEST, "Invalid YouTube URL");
    };
    let source = SourceRef {
        url: watch_url(&id),
        id,
        title: String::new(),
    };
    match cache.get_or_create(&source).await {
        Ok(article) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            article.content,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(source_id = %source.id, kind = e.kind(), error = %e, "{failure}");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, failure)
        }
    }
}

/// Single-video write-up; markdown body as plain text.
async fn generate_tutorial(State(state): State<AppState>, Json(body): Json<VideoReq>) -> Response {
    single_video(&state.articles, &body.url, "Failed to generate tutorial").await
}

/// Single-video TLDR; markdown body as plain text.
async fn generate_tldr(State(state): State<AppState>, Json(body): Json<VideoReq>) -> Response {
    single_video(&state.tldrs, &body.url, "Failed to generate TLDR").await
}
