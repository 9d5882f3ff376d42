//! Server crate: configuration, notifications, scheduling, HTTP API, and
//! the shared application context the binaries build on.

pub mod config;
pub mod maintenance;
pub mod notify;
pub mod scheduler;
pub mod server;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use jobscout_ingest::ai::{resume, AnalyzerConfig, FitAnalyzer, KeyPool};
use jobscout_ingest::discovery::{BoardDiscovery, DiscoveryStats};
use jobscout_ingest::fetch::Fetcher;
use jobscout_ingest::pipeline::{Pipeline, PipelineOptions, RunConnectorOptions};
use jobscout_ingest::search_api::SearchApiClient;
use jobscout_ingest::stores::JobStore;
use jobscout_ingest::types::RunType;
use jobscout_ingest::{Normalizer, RulesConfig};

use crate::config::Config;
use crate::notify::TelegramNotifier;

/// Default key-acquisition timeout for the analyzer pool.
const KEY_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the binaries and scheduler share.
pub struct App {
    pub config: Config,
    pub store: JobStore,
    pub pipeline: Arc<Pipeline>,
    pub notifier: Arc<TelegramNotifier>,
    pub search: SearchApiClient,
}

/// Build the application from env config and the rules directory.
///
/// A store that fails to open or migrate aborts startup with the
/// diagnostic; nothing is auto-repaired.
pub async fn build_app(config: Config) -> Result<App> {
    let rules = RulesConfig::load(&config.config_dir)
        .with_context(|| format!("loading rules from {}", config.config_dir))?;

    let store = JobStore::open(&config.database_path)
        .await
        .with_context(|| format!("opening database {}", config.database_path))?;

    let notifier = Arc::new(TelegramNotifier::new(&config, store.clone()));
    let search = SearchApiClient::new(&config.search_api_endpoint, config.search_api_keys.clone());
    let analyzer = build_analyzer(&config)?;
    let normalizer = Normalizer::new(rules, config.timezone);

    let options = PipelineOptions {
        ai_min_score: config.ai_analysis_min_score,
        max_job_age_days: config.max_job_age_days,
        dry_run: config.dry_run,
        use_discovered_boards: config.use_discovered_boards,
        ..Default::default()
    };

    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        normalizer,
        Fetcher::new(),
        search.clone(),
        analyzer,
        Arc::clone(&notifier) as Arc<dyn jobscout_ingest::Notifier>,
        options,
    ));

    Ok(App { config, store, pipeline, notifier, search })
}

/// Wire up the fit analyzer when a resume and at least one key exist.
fn build_analyzer(config: &Config) -> Result<Option<Arc<FitAnalyzer>>> {
    let Some(resume_path) = &config.resume_path else {
        return Ok(None);
    };
    if config.llm_api_keys.is_empty() && config.llm_fallback_key.is_none() {
        return Ok(None);
    }

    let resume_text = resume::load(resume_path)?;
    let pool = KeyPool::new(config.llm_api_keys.clone(), KEY_ACQUIRE_TIMEOUT);
    let analyzer_config = AnalyzerConfig {
        primary_base_url: config.llm_base_url.clone(),
        model: config.llm_model.clone(),
        fallback_base_url: config.llm_fallback_base_url.clone(),
        fallback_model: config.llm_fallback_model.clone(),
        fallback_key: config.llm_fallback_key.clone(),
        ..Default::default()
    };

    info!(
        keys = config.llm_api_keys.len(),
        fallback = config.llm_fallback_key.is_some(),
        model = %config.llm_model,
        "fit analyzer enabled"
    );
    Ok(Some(Arc::new(FitAnalyzer::new(pool, analyzer_config, resume_text))))
}

impl App {
    /// Run one board-discovery sweep.
    pub async fn run_discovery(&self) -> Result<DiscoveryStats> {
        let stats = BoardDiscovery::new()
            .run(&self.search, &self.store, &self.config.discovery_queries, Utc::now())
            .await?;
        Ok(stats)
    }

    /// Re-normalize stored raw jobs for one date and source.
    pub async fn replay(&self, date: &str, source: &str) -> Result<usize> {
        let raws = self.store.raw_jobs_for_replay(date, source).await?;
        let count = raws.len();
        if count == 0 {
            info!(date, source, "nothing to replay");
            return Ok(0);
        }

        let result = jobscout_ingest::connectors::ConnectorResult::ok(
            source,
            "replay",
            raws,
            0,
        );
        self.pipeline
            .run_with_results(
                RunType::Replay,
                vec![result],
                &RunConnectorOptions::ats_only(),
                Utc::now(),
            )
            .await?;
        Ok(count)
    }
}
