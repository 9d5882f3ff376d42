//! Schema migrations.
//!
//! Migrations are applied in declaration order inside one transaction per
//! pending migration, with applied ids recorded in `_migrations`. A
//! failure rolls the current migration back and aborts startup.

use sqlx::SqlitePool;

use crate::error::{StoreError, StoreResult};

/// Ordered list of `(id, sql)` migrations. Append only.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_raw_jobs",
        r#"
        CREATE TABLE jobs_raw (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            source_job_id TEXT NOT NULL,
            title TEXT NOT NULL,
            company TEXT NOT NULL,
            url TEXT NOT NULL,
            location_raw TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL DEFAULT '',
            posted_at TEXT,
            raw_payload TEXT NOT NULL DEFAULT '',
            fetched_at TEXT NOT NULL
        );
        CREATE INDEX idx_jobs_raw_source ON jobs_raw(source);
        CREATE INDEX idx_jobs_raw_fetched_at ON jobs_raw(fetched_at);
        "#,
    ),
    (
        "0002_canonical_jobs",
        r#"
        CREATE TABLE jobs_canonical (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            raw_job_id INTEGER REFERENCES jobs_raw(id) ON DELETE SET NULL,
            source TEXT NOT NULL,
            title TEXT NOT NULL,
            company TEXT NOT NULL,
            url TEXT NOT NULL,
            url_hash TEXT NOT NULL UNIQUE,
            content_fingerprint TEXT NOT NULL,
            city TEXT,
            province TEXT,
            country TEXT,
            location_tier TEXT,
            work_mode TEXT NOT NULL,
            title_bucket TEXT NOT NULL,
            score INTEGER NOT NULL DEFAULT 0,
            score_freshness INTEGER NOT NULL DEFAULT 0,
            score_location INTEGER NOT NULL DEFAULT 0,
            score_mode INTEGER NOT NULL DEFAULT 0,
            score_band TEXT NOT NULL,
            posted_at TEXT,
            posted_at_confidence TEXT NOT NULL,
            first_seen_at TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            is_backfill INTEGER NOT NULL DEFAULT 0,
            is_reposted INTEGER NOT NULL DEFAULT 0,
            original_post_date TEXT
        );
        CREATE INDEX idx_canonical_fingerprint ON jobs_canonical(content_fingerprint);
        CREATE INDEX idx_canonical_status ON jobs_canonical(status);
        CREATE INDEX idx_canonical_first_seen ON jobs_canonical(first_seen_at);
        CREATE INDEX idx_canonical_score ON jobs_canonical(score);
        "#,
    ),
    (
        "0003_fit_analysis",
        r#"
        CREATE TABLE fit_analysis (
            canonical_job_id INTEGER PRIMARY KEY
                REFERENCES jobs_canonical(id) ON DELETE CASCADE,
            fit_score INTEGER NOT NULL,
            verdict TEXT NOT NULL,
            summary TEXT NOT NULL,
            strengths TEXT NOT NULL DEFAULT '[]',
            gaps TEXT NOT NULL DEFAULT '[]',
            matched_skills TEXT NOT NULL DEFAULT '[]',
            missing_skills TEXT NOT NULL DEFAULT '[]',
            bonus_skills TEXT NOT NULL DEFAULT '[]',
            tailoring_tips TEXT NOT NULL DEFAULT '[]',
            cover_letter_points TEXT NOT NULL DEFAULT '[]',
            experience_level_match TEXT NOT NULL DEFAULT 'unknown',
            domain_relevance TEXT NOT NULL DEFAULT '',
            recommendation TEXT NOT NULL DEFAULT '',
            provider TEXT NOT NULL,
            model_used TEXT NOT NULL,
            prompt_tokens INTEGER,
            completion_tokens INTEGER,
            created_at TEXT NOT NULL
        );
        "#,
    ),
    (
        "0004_discovered_boards",
        r#"
        CREATE TABLE discovered_boards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            platform TEXT NOT NULL,
            board_url TEXT NOT NULL UNIQUE,
            board_slug TEXT NOT NULL,
            confidence REAL NOT NULL DEFAULT 0.75,
            status TEXT NOT NULL DEFAULT 'active',
            first_seen_at TEXT NOT NULL,
            last_seen_at TEXT NOT NULL,
            last_success_at TEXT,
            consecutive_zero_runs INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX idx_boards_platform ON discovered_boards(platform, status);
        "#,
    ),
    (
        "0005_duplicates_and_alternates",
        r#"
        CREATE TABLE job_duplicates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            new_job_id INTEGER NOT NULL,
            existing_job_id INTEGER NOT NULL
                REFERENCES jobs_canonical(id) ON DELETE CASCADE,
            method TEXT NOT NULL,
            similarity REAL NOT NULL DEFAULT 1.0,
            is_potential INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE alternate_urls (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            canonical_job_id INTEGER NOT NULL
                REFERENCES jobs_canonical(id) ON DELETE CASCADE,
            source TEXT NOT NULL,
            url TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(canonical_job_id, source)
        );
        "#,
    ),
    (
        "0006_runs_and_metrics",
        r#"
        CREATE TABLE run_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'running',
            dry_run INTEGER NOT NULL DEFAULT 0,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            jobs_found INTEGER NOT NULL DEFAULT 0,
            jobs_new INTEGER NOT NULL DEFAULT 0,
            jobs_duplicate INTEGER NOT NULL DEFAULT 0,
            jobs_rejected INTEGER NOT NULL DEFAULT 0,
            alerts_sent INTEGER NOT NULL DEFAULT 0,
            analyses_run INTEGER NOT NULL DEFAULT 0,
            errors TEXT NOT NULL DEFAULT '[]'
        );

        CREATE TABLE source_metrics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            date TEXT NOT NULL,
            jobs_found INTEGER NOT NULL DEFAULT 0,
            jobs_new INTEGER NOT NULL DEFAULT 0,
            jobs_duplicate INTEGER NOT NULL DEFAULT 0,
            parse_failures INTEGER NOT NULL DEFAULT 0,
            rate_limit_hits INTEGER NOT NULL DEFAULT 0,
            response_time_avg_ms REAL NOT NULL DEFAULT 0,
            success_rate REAL NOT NULL DEFAULT 0,
            sample_count INTEGER NOT NULL DEFAULT 0,
            UNIQUE(source, date)
        );
        "#,
    ),
    (
        "0007_checkpoints_and_retry_queue",
        r#"
        CREATE TABLE connector_checkpoints (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            company TEXT NOT NULL,
            consecutive_failures INTEGER NOT NULL DEFAULT 0,
            last_success_at TEXT,
            last_failure_at TEXT,
            UNIQUE(source, company)
        );

        CREATE TABLE retry_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message TEXT NOT NULL,
            bot TEXT NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            next_retry_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    ),
];

/// Apply all pending migrations.
pub async fn run_migrations(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    for (id, sql) in MIGRATIONS {
        let applied: Option<(String,)> = sqlx::query_as("SELECT id FROM _migrations WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        if applied.is_some() {
            continue;
        }

        let mut tx = pool.begin().await?;

        // SQLite executes one statement at a time; split on ';'
        for statement in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await.map_err(|e| {
                StoreError::Migration { id: id.to_string(), reason: e.to_string() }
            })?;
        }

        sqlx::query("INSERT INTO _migrations (id, applied_at) VALUES (?, ?)")
            .bind(id)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(migration = id, "applied migration");
    }

    Ok(())
}
