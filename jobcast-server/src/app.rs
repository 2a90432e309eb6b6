use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use jobcast_jobs::JobFilter;
use tower_http::trace::TraceLayer;

use crate::handlers::jobs;
use crate::state::AppState;

/// Build the primary axum router with the provided shared application state.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/jobs", get(jobs::list::list_jobs))
        .route("/jobs/cleanup", post(jobs::cleanup::cleanup_jobs))
        .route("/jobs/ws", get(jobs::ws::job_updates))
        .route("/jobs/{job_id}", get(jobs::get::get_job))
        .layer(Extension(state));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Ready once the content store answers queries.
async fn ready_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    match state.registry.count_jobs(&JobFilter::new()).await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(error) => {
            tracing::warn!(%error, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}
