//! Health and status endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::server::AppState;

/// Health check: process up plus a database round trip.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = sqlx::query("SELECT 1").execute(state.store.pool()).await.is_ok();

    let stats = match state.store.status_counts().await {
        Ok(counts) => {
            let map: serde_json::Map<String, serde_json::Value> = counts
                .into_iter()
                .map(|(status, count)| (status, json!(count)))
                .collect();
            json!(map)
        }
        Err(_) => json!({}),
    };

    let status_code = if db_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status_code,
        Json(json!({
            "status": if db_ok { "healthy" } else { "unhealthy" },
            "database": { "ok": db_ok, "stats": stats },
        })),
    )
}

/// Config summary plus job counts.
pub async fn status(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let stats = state.store.status_counts().await.unwrap_or_default();
    (
        StatusCode::OK,
        Json(json!({
            "config": state.config_summary,
            "jobs": stats.into_iter().collect::<std::collections::BTreeMap<_, _>>(),
        })),
    )
}
