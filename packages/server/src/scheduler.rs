//! Cron scheduling with a single-flight pipeline guard.
//!
//! At most one pipeline run exists at a time. A tick that fires during a
//! run is skipped (counted, never queued). On startup, a catch-up run
//! fires when the most recent completed run is more than four hours old.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use jobscout_ingest::pipeline::RunConnectorOptions;
use jobscout_ingest::types::RunType;

use crate::maintenance;
use crate::notify::digest::{self, DigestKind};
use crate::App;

/// Catch-up fires when the last completed run is older than this.
const CATCH_UP_AFTER_HOURS: i64 = 4;

/// Single-flight guard over the pipeline.
#[derive(Default)]
pub struct PipelineGuard {
    lock: Mutex<()>,
    skipped: AtomicU64,
}

impl PipelineGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticks refused because a run was in progress.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Run `task` unless a run is already in flight; a busy guard skips
    /// the tick entirely.
    pub async fn run_exclusive<F, Fut>(&self, label: &str, task: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        match self.lock.try_lock() {
            Ok(_guard) => {
                task().await;
                true
            }
            Err(_) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                warn!(tick = label, "pipeline already running, tick skipped");
                false
            }
        }
    }
}

/// One guarded pipeline invocation; failures are logged, never fatal to
/// the scheduler.
pub async fn run_guarded(
    app: &App,
    guard: &PipelineGuard,
    label: &str,
    run_type: RunType,
    options: RunConnectorOptions,
) {
    guard
        .run_exclusive(label, || async {
            if let Err(e) = app.pipeline.run(run_type, options).await {
                error!(tick = label, error = %e, "pipeline run failed");
            }
        })
        .await;
}

/// On startup, enqueue an ATS-only catch-up run if we have been down for
/// a while.
pub async fn catch_up_if_stale(app: &App, guard: &PipelineGuard) -> Result<()> {
    let last = app.store.last_completed_run_at().await?;
    let stale = match last {
        Some(finished_at) => Utc::now() - finished_at > Duration::hours(CATCH_UP_AFTER_HOURS),
        None => true,
    };
    if stale {
        info!(?last, "last completed run is stale, running catch-up");
        run_guarded(app, guard, "catch-up", RunType::CatchUp, RunConnectorOptions::ats_only()).await;
    }
    Ok(())
}

/// Start every scheduled task.
pub async fn start_scheduler(app: Arc<App>, guard: Arc<PipelineGuard>) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let tz = app.config.timezone;

    // ATS sweep every three hours
    {
        let (app, guard) = (Arc::clone(&app), Arc::clone(&guard));
        scheduler
            .add(Job::new_async_tz("0 0 */3 * * *", tz, move |_uuid, _lock| {
                let (app, guard) = (Arc::clone(&app), Arc::clone(&guard));
                Box::pin(async move {
                    run_guarded(&app, &guard, "ats-sweep", RunType::Ingest, RunConnectorOptions::ats_only())
                        .await;
                })
            })?)
            .await?;
    }

    // Web-search aggregators, morning and evening
    {
        let (app, guard) = (Arc::clone(&app), Arc::clone(&guard));
        scheduler
            .add(Job::new_async_tz("0 0 8,20 * * *", tz, move |_uuid, _lock| {
                let (app, guard) = (Arc::clone(&app), Arc::clone(&guard));
                Box::pin(async move {
                    run_guarded(
                        &app,
                        &guard,
                        "aggregators",
                        RunType::Ingest,
                        RunConnectorOptions::aggregators_only(),
                    )
                    .await;
                })
            })?)
            .await?;
    }

    // Web-search underground boards, same slots
    {
        let (app, guard) = (Arc::clone(&app), Arc::clone(&guard));
        scheduler
            .add(Job::new_async_tz("0 0 8,20 * * *", tz, move |_uuid, _lock| {
                let (app, guard) = (Arc::clone(&app), Arc::clone(&guard));
                Box::pin(async move {
                    run_guarded(
                        &app,
                        &guard,
                        "underground",
                        RunType::Ingest,
                        RunConnectorOptions::underground_only(),
                    )
                    .await;
                })
            })?)
            .await?;
    }

    // Pre-morning: discovery then an ATS ingest
    {
        let (app, guard) = (Arc::clone(&app), Arc::clone(&guard));
        scheduler
            .add(Job::new_async_tz("0 5 8 * * *", tz, move |_uuid, _lock| {
                let (app, guard) = (Arc::clone(&app), Arc::clone(&guard));
                Box::pin(async move {
                    if let Err(e) = app.run_discovery().await {
                        error!(error = %e, "discovery failed");
                    }
                    run_guarded(&app, &guard, "pre-morning", RunType::Ingest, RunConnectorOptions::ats_only())
                        .await;
                })
            })?)
            .await?;
    }

    // Morning digest (plus a retry-queue flush)
    {
        let app = Arc::clone(&app);
        scheduler
            .add(Job::new_async_tz("0 30 8 * * *", tz, move |_uuid, _lock| {
                let app = Arc::clone(&app);
                Box::pin(async move {
                    if let Err(e) = app.notifier.flush_retries().await {
                        error!(error = %e, "retry flush failed");
                    }
                    if let Err(e) =
                        digest::send_digest(&app.store, app.notifier.jobs_bot(), DigestKind::Morning, false)
                            .await
                    {
                        error!(error = %e, "morning digest failed");
                    }
                })
            })?)
            .await?;
    }

    // Pre-evening ATS ingest
    {
        let (app, guard) = (Arc::clone(&app), Arc::clone(&guard));
        scheduler
            .add(Job::new_async_tz("0 30 17 * * *", tz, move |_uuid, _lock| {
                let (app, guard) = (Arc::clone(&app), Arc::clone(&guard));
                Box::pin(async move {
                    run_guarded(&app, &guard, "pre-evening", RunType::Ingest, RunConnectorOptions::ats_only())
                        .await;
                })
            })?)
            .await?;
    }

    // Evening digest (plus a retry-queue flush)
    {
        let app = Arc::clone(&app);
        scheduler
            .add(Job::new_async_tz("0 0 18 * * *", tz, move |_uuid, _lock| {
                let app = Arc::clone(&app);
                Box::pin(async move {
                    if let Err(e) = app.notifier.flush_retries().await {
                        error!(error = %e, "retry flush failed");
                    }
                    if let Err(e) =
                        digest::send_digest(&app.store, app.notifier.jobs_bot(), DigestKind::Evening, false)
                            .await
                    {
                        error!(error = %e, "evening digest failed");
                    }
                })
            })?)
            .await?;
    }

    // Weekly report, Sunday evening
    {
        let app = Arc::clone(&app);
        scheduler
            .add(Job::new_async_tz("0 0 19 * * Sun", tz, move |_uuid, _lock| {
                let app = Arc::clone(&app);
                Box::pin(async move {
                    if let Err(e) = digest::send_weekly_report(&app.store, app.notifier.logs_bot()).await {
                        error!(error = %e, "weekly report failed");
                    }
                })
            })?)
            .await?;
    }

    // Archive and purge, Sunday overnight
    {
        let app = Arc::clone(&app);
        scheduler
            .add(Job::new_async_tz("0 0 3 * * Sun", tz, move |_uuid, _lock| {
                let app = Arc::clone(&app);
                Box::pin(async move {
                    match maintenance::archive_old_jobs(&app.store).await {
                        Ok((archived, purged)) => info!(archived, purged, "archive/purge done"),
                        Err(e) => error!(error = %e, "archive/purge failed"),
                    }
                })
            })?)
            .await?;
    }

    scheduler.start().await?;
    info!("scheduler started with 9 slots");
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn test_guard_refuses_reentry_and_counts_skips() {
        let guard = Arc::new(PipelineGuard::new());

        let g = Arc::clone(&guard);
        let long_run = tokio::spawn(async move {
            g.run_exclusive("first", || async {
                tokio::time::sleep(StdDuration::from_millis(100)).await;
            })
            .await
        });

        tokio::time::sleep(StdDuration::from_millis(20)).await;
        // Tick while a run is in progress: skipped, not queued
        let ran = guard.run_exclusive("second", || async {}).await;
        assert!(!ran);
        assert_eq!(guard.skipped(), 1);

        assert!(long_run.await.unwrap());

        // Free again afterwards
        assert!(guard.run_exclusive("third", || async {}).await);
        assert_eq!(guard.skipped(), 1);
    }
}
