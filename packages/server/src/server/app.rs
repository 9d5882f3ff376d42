//! Router assembly and shared request state.

use axum::routing::{get, post};
use axum::Router;

use jobscout_ingest::stores::JobStore;

use super::routes;

/// State shared by every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: JobStore,
    pub config_summary: serde_json::Value,
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/status", get(routes::health::status))
        .route("/api/jobs", get(routes::jobs::list))
        .route("/api/jobs/{id}", get(routes::jobs::detail))
        .route("/api/jobs/{id}/applied", post(routes::jobs::mark_applied))
        .route("/api/jobs/{id}/dismissed", post(routes::jobs::mark_dismissed))
        .route("/api/telegram/callback", post(routes::callback::telegram_callback))
        .route("/api/analytics/sources", get(routes::analytics::sources))
        .route("/api/analytics/weekly", get(routes::analytics::weekly))
        .with_state(state)
}
