//! Analytics endpoints over the daily source metrics.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct SourcesQuery {
    days: Option<i64>,
}

/// Per-source aggregation over the last N days (default 7).
pub async fn sources(
    State(state): State<AppState>,
    Query(query): Query<SourcesQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let days = query.days.unwrap_or(7).clamp(1, 90);
    let breakdown = state
        .store
        .source_breakdown(Utc::now(), days)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(json!({ "days": days, "sources": breakdown })))
}

/// Weekly summary counts.
pub async fn weekly(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let summary = state
        .store
        .weekly_summary(Utc::now())
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(json!(summary)))
}
