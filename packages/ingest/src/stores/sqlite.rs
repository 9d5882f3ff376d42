//! SQLite-backed job store.
//!
//! One file-based database owned by the pipeline (single writer,
//! concurrent readers). Row structs decode with `FromRow` and convert to
//! domain types; list columns are stored as JSON arrays.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder};

use crate::error::{StoreError, StoreResult};
use crate::types::{
    CanonicalJob, DiscoveredBoard, FitAnalysis, FitVerdict, JobStatus, NewCanonicalJob,
    PostedAtConfidence, RawJob, RunStatus, RunType, ScoreBand, Scores, SourceMetric, TitleBucket,
    WorkMode,
};

use super::migrations::run_migrations;

/// A secondary URL for a canonical job seen on another source.
#[derive(Debug, Clone, Serialize)]
pub struct AlternateUrl {
    pub canonical_job_id: i64,
    pub source: String,
    pub url: String,
}

/// A notification that failed to send and is awaiting retry.
#[derive(Debug, Clone)]
pub struct RetryQueueItem {
    pub id: i64,
    pub message: String,
    pub bot: String,
    pub retry_count: i64,
    pub next_retry_at: DateTime<Utc>,
}

/// Filters for the job listing API.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub limit: i64,
    pub offset: i64,
    pub band: Option<ScoreBand>,
    pub bucket: Option<TitleBucket>,
    pub status: Option<JobStatus>,
    pub since: Option<DateTime<Utc>>,
    pub min_score: Option<i64>,
    pub tiers: Vec<String>,
}

/// Per-source aggregate over a window, for analytics.
#[derive(Debug, Clone, Serialize)]
pub struct SourceBreakdown {
    pub source: String,
    pub jobs_found: i64,
    pub jobs_new: i64,
    pub jobs_duplicate: i64,
    pub parse_failures: i64,
    pub rate_limit_hits: i64,
    pub response_time_avg_ms: f64,
    pub success_rate: f64,
}

/// Weekly report counts.
#[derive(Debug, Clone, Serialize)]
pub struct WeeklySummary {
    pub jobs_new: i64,
    pub top_priority: i64,
    pub applied: i64,
    pub dismissed: i64,
    pub analyses: i64,
}

/// The embedded job store.
#[derive(Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    /// Open (or create) a file-backed store and apply migrations.
    pub async fn open(path: &str) -> StoreResult<Self> {
        let url = format!("sqlite://{path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory store for tests.
    pub async fn in_memory() -> StoreResult<Self> {
        // One connection: each SQLite :memory: connection is its own db
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// The underlying connection pool (read-only API handlers).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Run logs
    // =========================================================================

    pub async fn create_run(
        &self,
        run_type: RunType,
        dry_run: bool,
        started_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let result = sqlx::query(
            "INSERT INTO run_logs (run_type, status, dry_run, started_at) VALUES (?, 'running', ?, ?)",
        )
        .bind(run_type.as_str())
        .bind(dry_run)
        .bind(started_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        finished_at: DateTime<Utc>,
        jobs_found: i64,
        jobs_new: i64,
        jobs_duplicate: i64,
        jobs_rejected: i64,
        alerts_sent: i64,
        analyses_run: i64,
        errors: &[String],
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE run_logs SET status = ?, finished_at = ?, jobs_found = ?, jobs_new = ?,
             jobs_duplicate = ?, jobs_rejected = ?, alerts_sent = ?, analyses_run = ?, errors = ?
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(finished_at.to_rfc3339())
        .bind(jobs_found)
        .bind(jobs_new)
        .bind(jobs_duplicate)
        .bind(jobs_rejected)
        .bind(alerts_sent)
        .bind(analyses_run)
        .bind(serde_json::to_string(errors).unwrap_or_else(|_| "[]".to_string()))
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Finish time of the most recent completed run, for startup catch-up.
    pub async fn last_completed_run_at(&self) -> StoreResult<Option<DateTime<Utc>>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT finished_at FROM run_logs
             WHERE status = 'completed' AND finished_at IS NOT NULL
             ORDER BY finished_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some((text,)) => Ok(Some(parse_utc(&text)?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Raw jobs
    // =========================================================================

    pub async fn insert_raw_job(&self, raw: &RawJob, fetched_at: DateTime<Utc>) -> StoreResult<i64> {
        let result = sqlx::query(
            "INSERT INTO jobs_raw
             (source, source_job_id, title, company, url, location_raw, content, posted_at, raw_payload, fetched_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&raw.source)
        .bind(&raw.source_job_id)
        .bind(&raw.title)
        .bind(&raw.company)
        .bind(&raw.url)
        .bind(&raw.location_raw)
        .bind(&raw.content)
        .bind(&raw.posted_at)
        .bind(&raw.raw_payload)
        .bind(fetched_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Raw jobs fetched on a given local date from one source (replay).
    pub async fn raw_jobs_for_replay(&self, date: &str, source: &str) -> StoreResult<Vec<RawJob>> {
        let rows: Vec<RawRow> = sqlx::query_as(
            "SELECT source, source_job_id, title, company, url, location_raw, content, posted_at, raw_payload
             FROM jobs_raw WHERE source = ? AND date(fetched_at) = ? ORDER BY id",
        )
        .bind(source)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RawRow::into_raw_job).collect())
    }

    // =========================================================================
    // Canonical jobs
    // =========================================================================

    pub async fn insert_canonical(
        &self,
        job: &NewCanonicalJob,
        first_seen_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let result = sqlx::query(
            "INSERT INTO jobs_canonical
             (raw_job_id, source, title, company, url, url_hash, content_fingerprint,
              city, province, country, location_tier, work_mode, title_bucket,
              score, score_freshness, score_location, score_mode, score_band,
              posted_at, posted_at_confidence, first_seen_at, status,
              is_backfill, is_reposted, original_post_date)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'active', ?, ?, ?)",
        )
        .bind(job.raw_job_id)
        .bind(&job.source)
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.url)
        .bind(&job.url_hash)
        .bind(&job.content_fingerprint)
        .bind(&job.city)
        .bind(&job.province)
        .bind(&job.country)
        .bind(&job.location_tier)
        .bind(job.work_mode.as_str())
        .bind(job.title_bucket.as_str())
        .bind(job.score)
        .bind(job.score_freshness)
        .bind(job.score_location)
        .bind(job.score_mode)
        .bind(job.score_band.as_str())
        .bind(job.posted_at.map(|t| t.to_rfc3339()))
        .bind(job.posted_at_confidence.as_str())
        .bind(first_seen_at.to_rfc3339())
        .bind(job.is_backfill)
        .bind(job.is_reposted)
        .bind(job.original_post_date.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_job(&self, id: i64) -> StoreResult<Option<CanonicalJob>> {
        let row: Option<CanonicalRow> =
            sqlx::query_as("SELECT * FROM jobs_canonical WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(CanonicalRow::into_job).transpose()
    }

    pub async fn get_by_url_hash(&self, url_hash: &str) -> StoreResult<Option<CanonicalJob>> {
        let row: Option<CanonicalRow> =
            sqlx::query_as("SELECT * FROM jobs_canonical WHERE url_hash = ?")
                .bind(url_hash)
                .fetch_optional(&self.pool)
                .await?;
        row.map(CanonicalRow::into_job).transpose()
    }

    /// Oldest active job with a matching fingerprint (for repost checks).
    pub async fn get_active_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> StoreResult<Option<CanonicalJob>> {
        let row: Option<CanonicalRow> = sqlx::query_as(
            "SELECT * FROM jobs_canonical
             WHERE content_fingerprint = ? AND status = 'active'
             ORDER BY first_seen_at ASC LIMIT 1",
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;
        row.map(CanonicalRow::into_job).transpose()
    }

    pub async fn update_scores(&self, id: i64, scores: &Scores) -> StoreResult<()> {
        sqlx::query(
            "UPDATE jobs_canonical SET score = ?, score_freshness = ?, score_location = ?,
             score_mode = ?, score_band = ? WHERE id = ?",
        )
        .bind(scores.total)
        .bind(scores.freshness)
        .bind(scores.location)
        .bind(scores.mode)
        .bind(scores.band.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Apply a status transition; refuses non-monotone moves.
    /// Returns whether the update was applied.
    pub async fn update_status(&self, id: i64, next: JobStatus) -> StoreResult<bool> {
        let Some(job) = self.get_job(id).await? else {
            return Ok(false);
        };
        if !job.status.can_transition_to(next) {
            return Ok(false);
        }
        sqlx::query("UPDATE jobs_canonical SET status = ? WHERE id = ?")
            .bind(next.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(true)
    }

    /// Score-sorted listing for the API.
    pub async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<CanonicalJob>> {
        let mut builder = QueryBuilder::new("SELECT * FROM jobs_canonical WHERE 1=1");

        if let Some(band) = filter.band {
            builder.push(" AND score_band = ").push_bind(band.as_str());
        }
        if let Some(bucket) = filter.bucket {
            builder.push(" AND title_bucket = ").push_bind(bucket.as_str());
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(since) = filter.since {
            builder.push(" AND first_seen_at >= ").push_bind(since.to_rfc3339());
        }
        if let Some(min_score) = filter.min_score {
            builder.push(" AND score >= ").push_bind(min_score);
        }
        if !filter.tiers.is_empty() {
            builder.push(" AND location_tier IN (");
            let mut separated = builder.separated(", ");
            for tier in &filter.tiers {
                separated.push_bind(tier.as_str());
            }
            builder.push(")");
        }

        builder.push(" ORDER BY score DESC, first_seen_at DESC");
        builder.push(" LIMIT ").push_bind(filter.limit.max(1));
        builder.push(" OFFSET ").push_bind(filter.offset.max(0));

        let rows: Vec<CanonicalRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(CanonicalRow::into_job).collect()
    }

    /// Recent active jobs for the fuzzy dedup index.
    pub async fn recent_active_for_fuzzy(
        &self,
        now: DateTime<Utc>,
        window_days: i64,
    ) -> StoreResult<Vec<(i64, String, String, Option<String>)>> {
        let cutoff = now - Duration::days(window_days);
        let rows: Vec<(i64, String, String, Option<String>)> = sqlx::query_as(
            "SELECT id, company, title, city FROM jobs_canonical
             WHERE status = 'active' AND first_seen_at >= ?",
        )
        .bind(cutoff.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Active jobs first seen within a window, newest first (expiry probe).
    pub async fn recent_active_jobs(
        &self,
        now: DateTime<Utc>,
        window_days: i64,
        limit: i64,
    ) -> StoreResult<Vec<CanonicalJob>> {
        let cutoff = now - Duration::days(window_days);
        let rows: Vec<CanonicalRow> = sqlx::query_as(
            "SELECT * FROM jobs_canonical
             WHERE status = 'active' AND first_seen_at >= ?
             ORDER BY first_seen_at DESC LIMIT ?",
        )
        .bind(cutoff.to_rfc3339())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(CanonicalRow::into_job).collect()
    }

    /// Archive stale active jobs and purge old raw rows in one transaction.
    pub async fn archive_and_purge(&self, now: DateTime<Utc>) -> StoreResult<(u64, u64)> {
        let archive_cutoff = (now - Duration::days(30)).to_rfc3339();
        let purge_cutoff = (now - Duration::days(90)).to_rfc3339();

        let mut tx = self.pool.begin().await?;
        let archived = sqlx::query(
            "UPDATE jobs_canonical SET status = 'archived'
             WHERE status = 'active' AND first_seen_at < ?",
        )
        .bind(&archive_cutoff)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let purged = sqlx::query("DELETE FROM jobs_raw WHERE fetched_at < ?")
            .bind(&purge_cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        Ok((archived, purged))
    }

    /// Job counts by status, for health checks.
    pub async fn status_counts(&self) -> StoreResult<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM jobs_canonical GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // =========================================================================
    // Duplicates and alternate URLs
    // =========================================================================

    pub async fn insert_duplicate_link(
        &self,
        new_job_id: i64,
        existing_job_id: i64,
        method: &str,
        similarity: f64,
        is_potential: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO job_duplicates (new_job_id, existing_job_id, method, similarity, is_potential, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(new_job_id)
        .bind(existing_job_id)
        .bind(method)
        .bind(similarity)
        .bind(is_potential)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Best-effort alternate URL insert; conflicts on `(job, source)` are
    /// ignored.
    pub async fn insert_alternate_url(
        &self,
        canonical_job_id: i64,
        source: &str,
        url: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO alternate_urls (canonical_job_id, source, url, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(canonical_job_id)
        .bind(source)
        .bind(url)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_alternate_urls(&self, canonical_job_id: i64) -> StoreResult<Vec<AlternateUrl>> {
        let rows: Vec<(i64, String, String)> = sqlx::query_as(
            "SELECT canonical_job_id, source, url FROM alternate_urls
             WHERE canonical_job_id = ? ORDER BY id LIMIT 5",
        )
        .bind(canonical_job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(canonical_job_id, source, url)| AlternateUrl { canonical_job_id, source, url })
            .collect())
    }

    // =========================================================================
    // Discovered boards
    // =========================================================================

    pub async fn upsert_discovered_board(
        &self,
        platform: &str,
        board_url: &str,
        board_slug: &str,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO discovered_boards
             (platform, board_url, board_slug, confidence, status, first_seen_at, last_seen_at)
             VALUES (?, ?, ?, ?, 'active', ?, ?)
             ON CONFLICT(board_url) DO UPDATE SET
               confidence = MAX(confidence, excluded.confidence),
               status = 'active',
               last_seen_at = excluded.last_seen_at",
        )
        .bind(platform)
        .bind(board_url)
        .bind(board_slug)
        .bind(confidence)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn active_boards(&self, platform: &str) -> StoreResult<Vec<DiscoveredBoard>> {
        let rows: Vec<BoardRow> = sqlx::query_as(
            "SELECT * FROM discovered_boards WHERE platform = ? AND status = 'active' ORDER BY id",
        )
        .bind(platform)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(BoardRow::into_board).collect()
    }

    /// Track poll outcomes per board: yields reset the zero-run counter,
    /// empty polls bump it.
    pub async fn record_board_poll(
        &self,
        board_url: &str,
        yielded_jobs: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        if yielded_jobs {
            sqlx::query(
                "UPDATE discovered_boards
                 SET last_success_at = ?, consecutive_zero_runs = 0 WHERE board_url = ?",
            )
            .bind(now.to_rfc3339())
            .bind(board_url)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                "UPDATE discovered_boards
                 SET consecutive_zero_runs = consecutive_zero_runs + 1 WHERE board_url = ?",
            )
            .bind(board_url)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    // =========================================================================
    // Source metrics
    // =========================================================================

    /// Additive upsert on `(source, date)`; averages are sample-weighted.
    pub async fn upsert_source_metric(&self, metric: &SourceMetric) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO source_metrics
             (source, date, jobs_found, jobs_new, jobs_duplicate, parse_failures,
              rate_limit_hits, response_time_avg_ms, success_rate, sample_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(source, date) DO UPDATE SET
               jobs_found = source_metrics.jobs_found + excluded.jobs_found,
               jobs_new = source_metrics.jobs_new + excluded.jobs_new,
               jobs_duplicate = source_metrics.jobs_duplicate + excluded.jobs_duplicate,
               parse_failures = source_metrics.parse_failures + excluded.parse_failures,
               rate_limit_hits = source_metrics.rate_limit_hits + excluded.rate_limit_hits,
               response_time_avg_ms =
                 (source_metrics.response_time_avg_ms * source_metrics.sample_count
                  + excluded.response_time_avg_ms * excluded.sample_count)
                 / MAX(1, source_metrics.sample_count + excluded.sample_count),
               success_rate =
                 (source_metrics.success_rate * source_metrics.sample_count
                  + excluded.success_rate * excluded.sample_count)
                 / MAX(1, source_metrics.sample_count + excluded.sample_count),
               sample_count = source_metrics.sample_count + excluded.sample_count",
        )
        .bind(&metric.source)
        .bind(&metric.date)
        .bind(metric.jobs_found)
        .bind(metric.jobs_new)
        .bind(metric.jobs_duplicate)
        .bind(metric.parse_failures)
        .bind(metric.rate_limit_hits)
        .bind(metric.response_time_avg_ms)
        .bind(metric.success_rate)
        .bind(metric.sample_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_source_metric(&self, source: &str, date: &str) -> StoreResult<Option<SourceMetric>> {
        let row: Option<MetricRow> = sqlx::query_as(
            "SELECT source, date, jobs_found, jobs_new, jobs_duplicate, parse_failures,
                    rate_limit_hits, response_time_avg_ms, success_rate, sample_count
             FROM source_metrics WHERE source = ? AND date = ?",
        )
        .bind(source)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(MetricRow::into_metric))
    }

    /// Per-source aggregation over the last `days` days.
    pub async fn source_breakdown(&self, now: DateTime<Utc>, days: i64) -> StoreResult<Vec<SourceBreakdown>> {
        let cutoff = (now - Duration::days(days)).format("%Y-%m-%d").to_string();
        let rows: Vec<(String, i64, i64, i64, i64, i64, f64, f64)> = sqlx::query_as(
            "SELECT source, SUM(jobs_found), SUM(jobs_new), SUM(jobs_duplicate),
                    SUM(parse_failures), SUM(rate_limit_hits),
                    SUM(response_time_avg_ms * sample_count) / MAX(1, SUM(sample_count)),
                    SUM(success_rate * sample_count) / MAX(1, SUM(sample_count))
             FROM source_metrics WHERE date >= ? GROUP BY source ORDER BY source",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(source, found, new, dup, pf, rl, rt, sr)| SourceBreakdown {
                source,
                jobs_found: found,
                jobs_new: new,
                jobs_duplicate: dup,
                parse_failures: pf,
                rate_limit_hits: rl,
                response_time_avg_ms: rt,
                success_rate: sr,
            })
            .collect())
    }

    /// Counts for the weekly report.
    pub async fn weekly_summary(&self, now: DateTime<Utc>) -> StoreResult<WeeklySummary> {
        let cutoff = (now - Duration::days(7)).to_rfc3339();

        let (jobs_new,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM jobs_canonical WHERE first_seen_at >= ?")
                .bind(&cutoff)
                .fetch_one(&self.pool)
                .await?;
        let (top_priority,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM jobs_canonical WHERE first_seen_at >= ? AND score_band = 'topPriority'",
        )
        .bind(&cutoff)
        .fetch_one(&self.pool)
        .await?;
        let (applied,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM jobs_canonical WHERE status = 'applied'")
                .fetch_one(&self.pool)
                .await?;
        let (dismissed,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM jobs_canonical WHERE status = 'dismissed'")
                .fetch_one(&self.pool)
                .await?;
        let (analyses,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM fit_analysis WHERE created_at >= ?")
                .bind(&cutoff)
                .fetch_one(&self.pool)
                .await?;

        Ok(WeeklySummary { jobs_new, top_priority, applied, dismissed, analyses })
    }

    // =========================================================================
    // Connector checkpoints
    // =========================================================================

    /// Record a connector outcome and return the consecutive failure
    /// count after the update (0 after a success).
    pub async fn record_connector_result(
        &self,
        source: &str,
        company: &str,
        success: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let now_text = now.to_rfc3339();
        let row: (i64,) = if success {
            sqlx::query_as(
                "INSERT INTO connector_checkpoints (source, company, consecutive_failures, last_success_at)
                 VALUES (?, ?, 0, ?)
                 ON CONFLICT(source, company) DO UPDATE SET
                   consecutive_failures = 0, last_success_at = excluded.last_success_at
                 RETURNING consecutive_failures",
            )
            .bind(source)
            .bind(company)
            .bind(&now_text)
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_as(
                "INSERT INTO connector_checkpoints (source, company, consecutive_failures, last_failure_at)
                 VALUES (?, ?, 1, ?)
                 ON CONFLICT(source, company) DO UPDATE SET
                   consecutive_failures = connector_checkpoints.consecutive_failures + 1,
                   last_failure_at = excluded.last_failure_at
                 RETURNING consecutive_failures",
            )
            .bind(source)
            .bind(company)
            .bind(&now_text)
            .fetch_one(&self.pool)
            .await?
        };
        Ok(row.0)
    }

    // =========================================================================
    // Fit analysis
    // =========================================================================

    pub async fn upsert_fit_analysis(
        &self,
        analysis: &FitAnalysis,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO fit_analysis
             (canonical_job_id, fit_score, verdict, summary, strengths, gaps,
              matched_skills, missing_skills, bonus_skills, tailoring_tips, cover_letter_points,
              experience_level_match, domain_relevance, recommendation,
              provider, model_used, prompt_tokens, completion_tokens, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(analysis.canonical_job_id)
        .bind(analysis.fit_score)
        .bind(analysis.verdict.as_str())
        .bind(&analysis.summary)
        .bind(to_json(&analysis.strengths))
        .bind(to_json(&analysis.gaps))
        .bind(to_json(&analysis.matched_skills))
        .bind(to_json(&analysis.missing_skills))
        .bind(to_json(&analysis.bonus_skills))
        .bind(to_json(&analysis.tailoring_tips))
        .bind(to_json(&analysis.cover_letter_points))
        .bind(&analysis.experience_level_match)
        .bind(&analysis.domain_relevance)
        .bind(&analysis.recommendation)
        .bind(&analysis.provider)
        .bind(&analysis.model_used)
        .bind(analysis.prompt_tokens)
        .bind(analysis.completion_tokens)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_fit_analysis(&self, canonical_job_id: i64) -> StoreResult<Option<FitAnalysis>> {
        let row: Option<AnalysisRow> =
            sqlx::query_as("SELECT * FROM fit_analysis WHERE canonical_job_id = ?")
                .bind(canonical_job_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(AnalysisRow::into_analysis).transpose()
    }

    // =========================================================================
    // Retry queue
    // =========================================================================

    pub async fn enqueue_retry(
        &self,
        message: &str,
        bot: &str,
        next_retry_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let result = sqlx::query(
            "INSERT INTO retry_queue (message, bot, retry_count, next_retry_at, created_at)
             VALUES (?, ?, 0, ?, ?)",
        )
        .bind(message)
        .bind(bot)
        .bind(next_retry_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn due_retries(&self, now: DateTime<Utc>) -> StoreResult<Vec<RetryQueueItem>> {
        let rows: Vec<(i64, String, String, i64, String)> = sqlx::query_as(
            "SELECT id, message, bot, retry_count, next_retry_at FROM retry_queue
             WHERE next_retry_at <= ? ORDER BY next_retry_at",
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(id, message, bot, retry_count, next)| {
                Ok(RetryQueueItem {
                    id,
                    message,
                    bot,
                    retry_count,
                    next_retry_at: parse_utc(&next)?,
                })
            })
            .collect()
    }

    pub async fn bump_retry(&self, id: i64, next_retry_at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            "UPDATE retry_queue SET retry_count = retry_count + 1, next_retry_at = ? WHERE id = ?",
        )
        .bind(next_retry_at.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_retry(&self, id: i64) -> StoreResult<()> {
        sqlx::query("DELETE FROM retry_queue WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn to_json(list: &[String]) -> String {
    serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string())
}

fn from_json(text: &str) -> Vec<String> {
    serde_json::from_str(text).unwrap_or_default()
}

fn parse_utc(text: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Decode(format!("invalid timestamp {text:?}: {e}")))
}

fn parse_offset(text: &str) -> StoreResult<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text)
        .map_err(|e| StoreError::Decode(format!("invalid timestamp {text:?}: {e}")))
}

// =============================================================================
// Row types
// =============================================================================

#[derive(Debug, FromRow)]
struct RawRow {
    source: String,
    source_job_id: String,
    title: String,
    company: String,
    url: String,
    location_raw: String,
    content: String,
    posted_at: Option<String>,
    raw_payload: String,
}

impl RawRow {
    fn into_raw_job(self) -> RawJob {
        RawJob {
            source: self.source,
            source_job_id: self.source_job_id,
            title: self.title,
            company: self.company,
            url: self.url,
            location_raw: self.location_raw,
            content: self.content,
            posted_at: self.posted_at,
            raw_payload: self.raw_payload,
        }
    }
}

#[derive(Debug, FromRow)]
struct CanonicalRow {
    id: i64,
    raw_job_id: Option<i64>,
    source: String,
    title: String,
    company: String,
    url: String,
    url_hash: String,
    content_fingerprint: String,
    city: Option<String>,
    province: Option<String>,
    country: Option<String>,
    location_tier: Option<String>,
    work_mode: String,
    title_bucket: String,
    score: i64,
    score_freshness: i64,
    score_location: i64,
    score_mode: i64,
    score_band: String,
    posted_at: Option<String>,
    posted_at_confidence: String,
    first_seen_at: String,
    status: String,
    is_backfill: bool,
    is_reposted: bool,
    original_post_date: Option<String>,
}

impl CanonicalRow {
    fn into_job(self) -> StoreResult<CanonicalJob> {
        Ok(CanonicalJob {
            id: self.id,
            raw_job_id: self.raw_job_id,
            source: self.source,
            title: self.title,
            company: self.company,
            url: self.url,
            url_hash: self.url_hash,
            content_fingerprint: self.content_fingerprint,
            city: self.city,
            province: self.province,
            country: self.country,
            location_tier: self.location_tier,
            work_mode: WorkMode::parse(&self.work_mode),
            title_bucket: TitleBucket::parse(&self.title_bucket),
            score: self.score,
            score_freshness: self.score_freshness,
            score_location: self.score_location,
            score_mode: self.score_mode,
            score_band: ScoreBand::parse(&self.score_band),
            posted_at: self.posted_at.as_deref().map(parse_offset).transpose()?,
            posted_at_confidence: PostedAtConfidence::parse(&self.posted_at_confidence),
            first_seen_at: parse_utc(&self.first_seen_at)?,
            status: JobStatus::parse(&self.status),
            is_backfill: self.is_backfill,
            is_reposted: self.is_reposted,
            original_post_date: self.original_post_date.as_deref().map(parse_offset).transpose()?,
        })
    }
}

#[derive(Debug, FromRow)]
struct BoardRow {
    id: i64,
    platform: String,
    board_url: String,
    board_slug: String,
    confidence: f64,
    status: String,
    first_seen_at: String,
    last_seen_at: String,
    last_success_at: Option<String>,
    consecutive_zero_runs: i64,
}

impl BoardRow {
    fn into_board(self) -> StoreResult<DiscoveredBoard> {
        Ok(DiscoveredBoard {
            id: self.id,
            platform: self.platform,
            board_url: self.board_url,
            board_slug: self.board_slug,
            confidence: self.confidence,
            status: self.status,
            first_seen_at: parse_utc(&self.first_seen_at)?,
            last_seen_at: parse_utc(&self.last_seen_at)?,
            last_success_at: self
                .last_success_at
                .as_deref()
                .map(parse_utc)
                .transpose()?,
            consecutive_zero_runs: self.consecutive_zero_runs,
        })
    }
}

#[derive(Debug, FromRow)]
struct MetricRow {
    source: String,
    date: String,
    jobs_found: i64,
    jobs_new: i64,
    jobs_duplicate: i64,
    parse_failures: i64,
    rate_limit_hits: i64,
    response_time_avg_ms: f64,
    success_rate: f64,
    sample_count: i64,
}

impl MetricRow {
    fn into_metric(self) -> SourceMetric {
        SourceMetric {
            source: self.source,
            date: self.date,
            jobs_found: self.jobs_found,
            jobs_new: self.jobs_new,
            jobs_duplicate: self.jobs_duplicate,
            parse_failures: self.parse_failures,
            rate_limit_hits: self.rate_limit_hits,
            response_time_avg_ms: self.response_time_avg_ms,
            success_rate: self.success_rate,
            sample_count: self.sample_count,
        }
    }
}

#[derive(Debug, FromRow)]
struct AnalysisRow {
    canonical_job_id: i64,
    fit_score: i64,
    verdict: String,
    summary: String,
    strengths: String,
    gaps: String,
    matched_skills: String,
    missing_skills: String,
    bonus_skills: String,
    tailoring_tips: String,
    cover_letter_points: String,
    experience_level_match: String,
    domain_relevance: String,
    recommendation: String,
    provider: String,
    model_used: String,
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
    #[allow(dead_code)]
    created_at: String,
}

impl AnalysisRow {
    fn into_analysis(self) -> StoreResult<FitAnalysis> {
        Ok(FitAnalysis {
            canonical_job_id: self.canonical_job_id,
            fit_score: self.fit_score,
            verdict: FitVerdict::parse(&self.verdict),
            summary: self.summary,
            strengths: from_json(&self.strengths),
            gaps: from_json(&self.gaps),
            matched_skills: from_json(&self.matched_skills),
            missing_skills: from_json(&self.missing_skills),
            bonus_skills: from_json(&self.bonus_skills),
            tailoring_tips: from_json(&self.tailoring_tips),
            cover_letter_points: from_json(&self.cover_letter_points),
            experience_level_match: self.experience_level_match,
            domain_relevance: self.domain_relevance,
            recommendation: self.recommendation,
            provider: self.provider,
            model_used: self.model_used,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 15, 12, 0, 0).unwrap()
    }

    fn new_job(url_hash: &str, fingerprint: &str) -> NewCanonicalJob {
        NewCanonicalJob {
            raw_job_id: None,
            source: "lever".into(),
            title: "Software Engineer".into(),
            company: "Acme".into(),
            url: format!("https://jobs.example.com/{url_hash}"),
            url_hash: url_hash.into(),
            content_fingerprint: fingerprint.into(),
            city: Some("Toronto".into()),
            province: Some("Ontario".into()),
            country: Some("Canada".into()),
            location_tier: Some("L1".into()),
            work_mode: WorkMode::Hybrid,
            title_bucket: TitleBucket::Include,
            score: 100,
            score_freshness: 50,
            score_location: 25,
            score_mode: 25,
            score_band: ScoreBand::GoodMatch,
            posted_at: Some(now().fixed_offset()),
            posted_at_confidence: PostedAtConfidence::High,
            is_backfill: false,
            is_reposted: false,
            original_post_date: None,
        }
    }

    #[tokio::test]
    async fn test_canonical_round_trip() {
        let store = JobStore::in_memory().await.unwrap();
        let id = store.insert_canonical(&new_job("h1", "f1"), now()).await.unwrap();

        let job = store.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.url_hash, "h1");
        assert_eq!(job.work_mode, WorkMode::Hybrid);
        assert_eq!(job.status, JobStatus::Active);
        assert_eq!(job.first_seen_at, now());
        assert_eq!(job.posted_at.unwrap().timestamp(), now().timestamp());

        let by_hash = store.get_by_url_hash("h1").await.unwrap().unwrap();
        assert_eq!(by_hash.id, id);
        assert!(store.get_by_url_hash("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fingerprint_lookup_oldest_active() {
        let store = JobStore::in_memory().await.unwrap();
        let old = store
            .insert_canonical(&new_job("h1", "same"), now() - Duration::days(10))
            .await
            .unwrap();
        store
            .insert_canonical(&new_job("h2", "same"), now() - Duration::days(2))
            .await
            .unwrap();

        let found = store.get_active_by_fingerprint("same").await.unwrap().unwrap();
        assert_eq!(found.id, old);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let store = JobStore::in_memory().await.unwrap();
        let id = store.insert_canonical(&new_job("h1", "f1"), now()).await.unwrap();

        assert!(store.update_status(id, JobStatus::Applied).await.unwrap());
        // Monotone: no way back, no second transition
        assert!(!store.update_status(id, JobStatus::Dismissed).await.unwrap());
        let job = store.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Applied);
    }

    #[tokio::test]
    async fn test_list_jobs_filters_and_order() {
        let store = JobStore::in_memory().await.unwrap();
        let mut low = new_job("h1", "f1");
        low.score = 30;
        low.score_band = ScoreBand::WorthALook;
        let mut high = new_job("h2", "f2");
        high.score = 150;
        high.score_band = ScoreBand::TopPriority;
        store.insert_canonical(&low, now()).await.unwrap();
        store.insert_canonical(&high, now()).await.unwrap();

        let all = store
            .list_jobs(&JobFilter { limit: 10, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].score, 150);

        let top = store
            .list_jobs(&JobFilter {
                limit: 10,
                band: Some(ScoreBand::TopPriority),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(top.len(), 1);

        let scored = store
            .list_jobs(&JobFilter { limit: 10, min_score: Some(100), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(scored.len(), 1);

        let tiered = store
            .list_jobs(&JobFilter { limit: 10, tiers: vec!["L1".into()], ..Default::default() })
            .await
            .unwrap();
        assert_eq!(tiered.len(), 2);
    }

    #[tokio::test]
    async fn test_alternate_urls_unique_per_source() {
        let store = JobStore::in_memory().await.unwrap();
        let id = store.insert_canonical(&new_job("h1", "f1"), now()).await.unwrap();

        store.insert_alternate_url(id, "search", "https://a.com/1", now()).await.unwrap();
        // Second insert for the same source is silently ignored
        store.insert_alternate_url(id, "search", "https://a.com/2", now()).await.unwrap();
        store.insert_alternate_url(id, "lever", "https://b.com/1", now()).await.unwrap();

        let urls = store.list_alternate_urls(id).await.unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].url, "https://a.com/1");
    }

    #[tokio::test]
    async fn test_board_upsert_confidence_max() {
        let store = JobStore::in_memory().await.unwrap();
        store
            .upsert_discovered_board("lever", "https://jobs.lever.co/acme", "acme", 0.9, now())
            .await
            .unwrap();
        // Lower confidence resight must not lower the stored value
        store
            .upsert_discovered_board("lever", "https://jobs.lever.co/acme", "acme", 0.75, now())
            .await
            .unwrap();

        let boards = store.active_boards("lever").await.unwrap();
        assert_eq!(boards.len(), 1);
        assert!((boards[0].confidence - 0.9).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_board_poll_state() {
        let store = JobStore::in_memory().await.unwrap();
        store
            .upsert_discovered_board("lever", "https://jobs.lever.co/acme", "acme", 0.75, now())
            .await
            .unwrap();

        store.record_board_poll("https://jobs.lever.co/acme", false, now()).await.unwrap();
        store.record_board_poll("https://jobs.lever.co/acme", false, now()).await.unwrap();
        let boards = store.active_boards("lever").await.unwrap();
        assert_eq!(boards[0].consecutive_zero_runs, 2);

        store.record_board_poll("https://jobs.lever.co/acme", true, now()).await.unwrap();
        let boards = store.active_boards("lever").await.unwrap();
        assert_eq!(boards[0].consecutive_zero_runs, 0);
        assert!(boards[0].last_success_at.is_some());
    }

    #[tokio::test]
    async fn test_source_metric_additive_upsert() {
        let store = JobStore::in_memory().await.unwrap();
        let mut metric = SourceMetric::new("lever", "2026-07-15");
        metric.jobs_found = 10;
        metric.jobs_new = 4;
        metric.response_time_avg_ms = 100.0;
        metric.success_rate = 1.0;
        metric.sample_count = 2;
        store.upsert_source_metric(&metric).await.unwrap();

        let mut second = SourceMetric::new("lever", "2026-07-15");
        second.jobs_found = 5;
        second.jobs_duplicate = 3;
        second.response_time_avg_ms = 300.0;
        second.success_rate = 0.5;
        second.sample_count = 2;
        store.upsert_source_metric(&second).await.unwrap();

        let merged = store.get_source_metric("lever", "2026-07-15").await.unwrap().unwrap();
        assert_eq!(merged.jobs_found, 15);
        assert_eq!(merged.jobs_new, 4);
        assert_eq!(merged.jobs_duplicate, 3);
        assert_eq!(merged.sample_count, 4);
        assert!((merged.response_time_avg_ms - 200.0).abs() < 0.001);
        assert!((merged.success_rate - 0.75).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_connector_checkpoints() {
        let store = JobStore::in_memory().await.unwrap();
        assert_eq!(store.record_connector_result("lever", "acme", false, now()).await.unwrap(), 1);
        assert_eq!(store.record_connector_result("lever", "acme", false, now()).await.unwrap(), 2);
        assert_eq!(store.record_connector_result("lever", "acme", true, now()).await.unwrap(), 0);
        assert_eq!(store.record_connector_result("lever", "acme", false, now()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fit_analysis_insert_or_replace() {
        let store = JobStore::in_memory().await.unwrap();
        let id = store.insert_canonical(&new_job("h1", "f1"), now()).await.unwrap();

        let mut analysis = FitAnalysis {
            canonical_job_id: id,
            fit_score: 70,
            verdict: FitVerdict::Moderate,
            summary: "decent".into(),
            strengths: vec!["rust".into()],
            gaps: vec![],
            matched_skills: vec![],
            missing_skills: vec![],
            bonus_skills: vec![],
            tailoring_tips: vec![],
            cover_letter_points: vec![],
            experience_level_match: "unknown".into(),
            domain_relevance: String::new(),
            recommendation: String::new(),
            provider: "primary".into(),
            model_used: "m".into(),
            prompt_tokens: Some(100),
            completion_tokens: Some(50),
        };
        store.upsert_fit_analysis(&analysis, now()).await.unwrap();

        analysis.fit_score = 85;
        analysis.verdict = FitVerdict::Strong;
        store.upsert_fit_analysis(&analysis, now()).await.unwrap();

        let stored = store.get_fit_analysis(id).await.unwrap().unwrap();
        assert_eq!(stored.fit_score, 85);
        assert_eq!(stored.verdict, FitVerdict::Strong);
        assert_eq!(stored.strengths, vec!["rust".to_string()]);
    }

    #[tokio::test]
    async fn test_retry_queue_lifecycle() {
        let store = JobStore::in_memory().await.unwrap();
        let due_at = now() - Duration::minutes(1);
        let later = now() + Duration::hours(1);

        let id = store.enqueue_retry("hello", "jobs", due_at, now()).await.unwrap();
        store.enqueue_retry("later", "logs", later, now()).await.unwrap();

        let due = store.due_retries(now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].message, "hello");

        store.bump_retry(id, later).await.unwrap();
        assert!(store.due_retries(now()).await.unwrap().is_empty());

        store.remove_retry(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_archive_and_purge() {
        let store = JobStore::in_memory().await.unwrap();
        store
            .insert_canonical(&new_job("old", "f1"), now() - Duration::days(45))
            .await
            .unwrap();
        store.insert_canonical(&new_job("new", "f2"), now()).await.unwrap();

        let raw = RawJob::new("lever", "1", "t", "c", "https://x.com/1");
        store.insert_raw_job(&raw, now() - Duration::days(120)).await.unwrap();
        store.insert_raw_job(&raw, now()).await.unwrap();

        let (archived, purged) = store.archive_and_purge(now()).await.unwrap();
        assert_eq!(archived, 1);
        assert_eq!(purged, 1);

        let counts = store.status_counts().await.unwrap();
        assert!(counts.contains(&("active".to_string(), 1)));
        assert!(counts.contains(&("archived".to_string(), 1)));
    }

    #[tokio::test]
    async fn test_run_log_lifecycle() {
        let store = JobStore::in_memory().await.unwrap();
        assert!(store.last_completed_run_at().await.unwrap().is_none());

        let run_id = store.create_run(RunType::Ingest, false, now()).await.unwrap();
        store
            .finish_run(run_id, RunStatus::Completed, now(), 10, 4, 3, 3, 1, 2, &["err".into()])
            .await
            .unwrap();

        let last = store.last_completed_run_at().await.unwrap().unwrap();
        assert_eq!(last, now());
    }

    #[tokio::test]
    async fn test_recent_active_for_fuzzy_window() {
        let store = JobStore::in_memory().await.unwrap();
        store
            .insert_canonical(&new_job("in", "f1"), now() - Duration::days(3))
            .await
            .unwrap();
        store
            .insert_canonical(&new_job("out", "f2"), now() - Duration::days(10))
            .await
            .unwrap();

        let entries = store.recent_active_for_fuzzy(now(), 7).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1, "Acme");
    }
}
