//! One-shot pipeline commands.
//!
//! Each subcommand runs once and exits 0 on success, 1 on hard failure.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jobscout_ingest::pipeline::RunConnectorOptions;
use jobscout_ingest::types::RunType;
use jobscout_server::config::Config;
use jobscout_server::notify::digest::{self, DigestKind};
use jobscout_server::{build_app, maintenance};

#[derive(Parser)]
#[command(name = "jobscout")]
#[command(about = "Job-search pipeline - discover boards, ingest postings, send digests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run ATS board discovery once
    Discover,

    /// Run the ingest pipeline with all connector families
    Ingest,

    /// Bulk ingest without alerts or analyses
    Backfill,

    /// Render and send a digest
    Digest {
        /// Which digest (morning or evening)
        #[arg(default_value = "morning")]
        which: String,

        /// Include everything from the last week
        #[arg(long)]
        force_all: bool,
    },

    /// Re-normalize stored raw jobs for one date and source
    Replay {
        /// Date the raw jobs were fetched (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// Source name to replay
        #[arg(long)]
        source: String,
    },

    /// Probe recent active jobs and mark dead links expired
    CleanupExpired,

    /// Archive stale jobs and purge old raw rows
    ArchiveOldJobs,

    /// Check database and configuration health
    HealthCheck,

    /// Print configuration and job counts
    Status,

    /// Flush the notification retry queue
    RetryAlerts,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let app = build_app(config).await?;

    match cli.command {
        Commands::Discover => {
            let stats = app.run_discovery().await?;
            println!(
                "Discovery: {} queries, {} results, {} boards upserted",
                stats.queries_run, stats.results_seen, stats.boards_upserted
            );
        }

        Commands::Ingest => {
            let summary = app.pipeline.run(RunType::Ingest, RunConnectorOptions::all()).await?;
            println!(
                "Ingest run {}: {} found, {} new, {} duplicate, {} rejected, {} alerts",
                summary.run_id,
                summary.jobs_found,
                summary.jobs_new,
                summary.jobs_duplicate,
                summary.jobs_rejected,
                summary.alerts_sent
            );
            if !summary.errors.is_empty() {
                eprintln!("{} job(s) failed; see run log", summary.errors.len());
            }
        }

        Commands::Backfill => {
            let summary = app
                .pipeline
                .run(RunType::Backfill, RunConnectorOptions::backfill())
                .await?;
            println!(
                "Backfill run {}: {} found, {} new, {} duplicate",
                summary.run_id, summary.jobs_found, summary.jobs_new, summary.jobs_duplicate
            );
        }

        Commands::Digest { which, force_all } => {
            let kind = match which.as_str() {
                "morning" => DigestKind::Morning,
                "evening" => DigestKind::Evening,
                other => bail!("unknown digest '{other}' (expected morning or evening)"),
            };
            let count =
                digest::send_digest(&app.store, app.notifier.jobs_bot(), kind, force_all).await?;
            println!("{} digest sent with {} job(s)", kind.as_str(), count);
        }

        Commands::Replay { date, source } => {
            let count = app.replay(&date, &source).await?;
            println!("Replayed {count} raw job(s) from {source} on {date}");
        }

        Commands::CleanupExpired => {
            let expired = maintenance::cleanup_expired(&app.store).await?;
            println!("Marked {expired} job(s) expired");
        }

        Commands::ArchiveOldJobs => {
            let (archived, purged) = maintenance::archive_old_jobs(&app.store).await?;
            println!("Archived {archived} job(s), purged {purged} raw row(s)");
        }

        Commands::HealthCheck => {
            sqlx::query("SELECT 1").execute(app.store.pool()).await?;
            let counts = app.store.status_counts().await?;
            println!("Database OK ({} status group(s))", counts.len());
        }

        Commands::Status => {
            println!("{}", serde_json::to_string_pretty(&app.config.summary())?);
            for (status, count) in app.store.status_counts().await? {
                println!("{status:>10}: {count}");
            }
            if let Some(last) = app.store.last_completed_run_at().await? {
                println!("Last completed run: {last}");
            } else {
                println!("No completed runs yet");
            }
        }

        Commands::RetryAlerts => {
            let (sent, dropped) = app.notifier.flush_retries().await?;
            println!("Retry queue: {sent} sent, {dropped} dropped");
        }
    }

    Ok(())
}
