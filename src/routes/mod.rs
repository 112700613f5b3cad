pub mod error;
pub mod health;
pub mod jobs;
pub mod metrics;
pub mod producer;

use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::services::store::JobStore;

/// Build the API router with its middleware stack.
pub fn router<S: JobStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health::health_check::<S>))
        .route(
            "/api/v1/jobs",
            post(jobs::submit_job::<S>).get(jobs::list_jobs::<S>),
        )
        .route(
            "/api/v1/jobs/{job_id}",
            get(jobs::get_job::<S>).delete(jobs::purge_job::<S>),
        )
        .route(
            "/api/v1/jobs/{job_id}/download",
            get(jobs::download_artifact::<S>),
        )
        .route("/api/v1/producer", get(producer::producer_status::<S>))
        .route(
            "/api/v1/producer/initialize",
            post(producer::initialize_producer::<S>),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)) // 1 MB limit
}
