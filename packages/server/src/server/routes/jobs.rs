//! Job listing, detail, and status transition endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use jobscout_ingest::stores::JobFilter;
use jobscout_ingest::types::{JobStatus, ScoreBand, TitleBucket};

use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    band: Option<String>,
    bucket: Option<String>,
    status: Option<String>,
    since: Option<DateTime<Utc>>,
    #[serde(rename = "minScore")]
    min_score: Option<i64>,
    /// Comma-separated tier keys
    tiers: Option<String>,
}

/// Score-sorted job listing with filters.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<JobsQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let filter = JobFilter {
        limit: query.limit.unwrap_or(50).clamp(1, 200),
        offset: query.offset.unwrap_or(0),
        band: query.band.as_deref().map(ScoreBand::parse),
        bucket: query.bucket.as_deref().map(TitleBucket::parse),
        status: query.status.as_deref().map(JobStatus::parse),
        since: query.since,
        min_score: query.min_score,
        tiers: query
            .tiers
            .as_deref()
            .map(|t| t.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default(),
    };

    let jobs = state
        .store
        .list_jobs(&filter)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(json!({ "jobs": jobs, "count": jobs.len() })))
}

/// One job with its analysis and alternate URLs.
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let job = state
        .store
        .get_job(id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let analysis = state
        .store
        .get_fit_analysis(id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let alternates = state
        .store
        .list_alternate_urls(id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(json!({
        "job": job,
        "fitAnalysis": analysis,
        "alternateUrls": alternates,
    })))
}

pub async fn mark_applied(
    state: State<AppState>,
    path: Path<i64>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    transition(state, path, JobStatus::Applied).await
}

pub async fn mark_dismissed(
    state: State<AppState>,
    path: Path<i64>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    transition(state, path, JobStatus::Dismissed).await
}

/// Apply a monotone status transition; non-monotone moves report
/// `updated: false` rather than erroring.
async fn transition(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    next: JobStatus,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if state
        .store
        .get_job(id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .is_none()
    {
        return Err(StatusCode::NOT_FOUND);
    }

    let updated = state
        .store
        .update_status(id, next)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(json!({ "id": id, "status": next.as_str(), "updated": updated })))
}
