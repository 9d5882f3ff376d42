//! Long-running server: scheduler plus HTTP API.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use jobscout_server::config::Config;
use jobscout_server::scheduler::{self, PipelineGuard};
use jobscout_server::server::{build_router, AppState};
use jobscout_server::{build_app, App};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    let port = config.port;
    let app: Arc<App> = Arc::new(build_app(config).await?);
    let guard = Arc::new(PipelineGuard::new());

    // Catch up before the cron slots take over
    scheduler::catch_up_if_stale(&app, &guard).await?;
    let _scheduler = scheduler::start_scheduler(Arc::clone(&app), Arc::clone(&guard)).await?;

    let state = AppState {
        store: app.store.clone(),
        config_summary: app.config.summary(),
    };
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "HTTP API listening");
    axum::serve(listener, router).await?;

    Ok(())
}
