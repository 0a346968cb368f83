//! Video research service: binary entrypoint.
//! Boots the Axum HTTP server on Shuttle with config, tracing and metrics wired in.

use shuttle_axum::ShuttleAxum;

use video_research::config::research::ENV_APP_ENV;
use video_research::logging::init_tracing;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    let development = std::env::var(ENV_APP_ENV)
        .map(|v| v.eq_ignore_ascii_case("development"))
        .unwrap_or(false);
    init_tracing(development);

    let router = video_research::app()
        .await
        .map_err(shuttle_runtime::Error::Custom)?;
    Ok(router.into())
}
