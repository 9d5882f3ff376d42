//! Pipeline orchestrator.
//!
//! One invocation = one run log. Connectors are driven source by source
//! (parallel within a source via the batch fetcher), raw jobs are then
//! processed sequentially through normalize → dedup → score → persist,
//! qualifying jobs fan out to the fit analyzer, alerts dispatch, and
//! per-source metrics commit at run end. A failure in any single job is
//! recorded and skipped, never fatal to the run.

pub mod metrics;

pub use metrics::MetricsAccumulator;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ai::FitAnalyzer;
use crate::config::SourceType;
use crate::connectors::{connector_for, ConnectorResult, SearchConnector};
use crate::dedup::{DedupEngine, DedupOutcome, DedupThresholds};
use crate::error::Result;
use crate::fetch::{batch_fetch, BatchOptions, Fetcher};
use crate::normalize::Normalizer;
use crate::scoring::score_job;
use crate::search_api::SearchApiClient;
use crate::stores::JobStore;
use crate::types::{
    CanonicalJob, FitAnalysis, NewCanonicalJob, RawJob, RunStatus, RunType, ScoreBand, TitleBucket,
};

/// Consecutive-failure thresholds that trigger a system alert (3, 6, 9…).
const FAILURE_ALERT_INTERVAL: i64 = 3;

/// Downstream notification seam, implemented by the server crate.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a job alert; returns whether the send succeeded.
    async fn send_job_alert(&self, job: &CanonicalJob, analysis: Option<&FitAnalysis>) -> bool;

    /// Send an operational alert via the logs channel.
    async fn send_system_alert(&self, message: &str) -> bool;
}

/// Which connector families a run drives.
#[derive(Debug, Clone, Copy)]
pub struct RunConnectorOptions {
    pub include_ats: bool,
    pub include_aggregators: bool,
    pub include_underground: bool,

    /// Backfill runs insert with `is_backfill` and suppress alerts and
    /// analyses
    pub backfill: bool,
}

impl RunConnectorOptions {
    pub fn all() -> Self {
        Self { include_ats: true, include_aggregators: true, include_underground: true, backfill: false }
    }

    pub fn ats_only() -> Self {
        Self { include_ats: true, include_aggregators: false, include_underground: false, backfill: false }
    }

    pub fn aggregators_only() -> Self {
        Self { include_ats: false, include_aggregators: true, include_underground: false, backfill: false }
    }

    pub fn underground_only() -> Self {
        Self { include_ats: false, include_aggregators: false, include_underground: true, backfill: false }
    }

    pub fn backfill() -> Self {
        Self { backfill: true, ..Self::all() }
    }
}

/// Tuning knobs resolved from env by the caller.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Jobs scoring at or above this are analyzed
    pub ai_min_score: i64,

    /// Skip postings older than this many days, when known
    pub max_job_age_days: Option<i64>,

    /// Recorded on the run log; the notifier decides what dry-run means
    pub dry_run: bool,

    /// Merge discovered boards into connector company lists
    pub use_discovered_boards: bool,

    pub dedup: DedupThresholds,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            ai_min_score: 50,
            max_job_age_days: None,
            dry_run: false,
            use_discovered_boards: true,
            dedup: DedupThresholds::default(),
        }
    }
}

/// Counts for one finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: i64,
    pub status: RunStatus,
    pub jobs_found: i64,
    pub jobs_new: i64,
    pub jobs_duplicate: i64,
    pub jobs_rejected: i64,
    pub alerts_sent: i64,
    pub analyses_run: i64,
    pub errors: Vec<String>,
}

/// The pipeline and its collaborators.
pub struct Pipeline {
    store: JobStore,
    normalizer: Normalizer,
    fetcher: Fetcher,
    search: SearchApiClient,
    analyzer: Option<Arc<FitAnalyzer>>,
    notifier: Arc<dyn Notifier>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        store: JobStore,
        normalizer: Normalizer,
        fetcher: Fetcher,
        search: SearchApiClient,
        analyzer: Option<Arc<FitAnalyzer>>,
        notifier: Arc<dyn Notifier>,
        options: PipelineOptions,
    ) -> Self {
        Self { store, normalizer, fetcher, search, analyzer, notifier, options }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Drive the configured connectors and process everything they found.
    pub async fn run(&self, run_type: RunType, connectors: RunConnectorOptions) -> Result<RunSummary> {
        let now = Utc::now();
        let results = self.collect_connector_results(&connectors, now).await?;
        self.run_with_results(run_type, results, &connectors, now).await
    }

    /// Process pre-collected connector results (tests, replay).
    pub async fn run_with_results(
        &self,
        run_type: RunType,
        results: Vec<ConnectorResult>,
        connectors: &RunConnectorOptions,
        now: DateTime<Utc>,
    ) -> Result<RunSummary> {
        let run_id = self.store.create_run(run_type, self.options.dry_run, now).await?;
        info!(run_id, run_type = run_type.as_str(), results = results.len(), "run started");

        match self.process(run_id, results, connectors, now).await {
            Ok(summary) => {
                self.finish(run_id, &summary, now).await?;
                info!(
                    run_id,
                    new = summary.jobs_new,
                    duplicates = summary.jobs_duplicate,
                    rejected = summary.jobs_rejected,
                    alerts = summary.alerts_sent,
                    "run completed"
                );
                Ok(summary)
            }
            Err(e) => {
                let summary = RunSummary {
                    run_id,
                    status: RunStatus::Failed,
                    jobs_found: 0,
                    jobs_new: 0,
                    jobs_duplicate: 0,
                    jobs_rejected: 0,
                    alerts_sent: 0,
                    analyses_run: 0,
                    errors: vec![e.to_string()],
                };
                // Best effort; the original error is the one that matters
                let _ = self.finish(run_id, &summary, Utc::now()).await;
                Err(e)
            }
        }
    }

    async fn finish(&self, run_id: i64, summary: &RunSummary, finished_at: DateTime<Utc>) -> Result<()> {
        self.store
            .finish_run(
                run_id,
                summary.status,
                finished_at,
                summary.jobs_found,
                summary.jobs_new,
                summary.jobs_duplicate,
                summary.jobs_rejected,
                summary.alerts_sent,
                summary.analyses_run,
                &summary.errors,
            )
            .await?;
        Ok(())
    }

    /// Phase 2: drive every enabled connector in the selected families.
    pub async fn collect_connector_results(
        &self,
        options: &RunConnectorOptions,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConnectorResult>> {
        let rules = self.normalizer.rules();
        let mut all = Vec::new();

        if options.include_ats {
            for (name, def) in &rules.sources {
                if !def.enabled || def.source_type == SourceType::Search {
                    continue;
                }
                let Some(connector) = connector_for(name, def) else {
                    warn!(source = %name, "no connector implementation for source");
                    continue;
                };

                // Seed companies plus discovered boards on this platform
                let mut companies = rules.companies.get(name).cloned().unwrap_or_default();
                let mut board_urls: HashMap<String, String> = HashMap::new();
                if self.options.use_discovered_boards {
                    for board in self.store.active_boards(name).await? {
                        board_urls.insert(board.board_slug.clone(), board.board_url.clone());
                        if !companies.contains(&board.board_slug) {
                            companies.push(board.board_slug);
                        }
                    }
                }
                if companies.is_empty() {
                    continue;
                }

                debug!(source = %name, companies = companies.len(), "dispatching connector");
                let batch_options = BatchOptions::from(&def.rate_limiting);
                let connector = connector.as_ref();
                let fetcher = &self.fetcher;
                let results = batch_fetch(
                    companies,
                    |company: String| async move {
                        Ok::<ConnectorResult, std::convert::Infallible>(
                            connector.fetch(fetcher, &company, def).await,
                        )
                    },
                    &batch_options,
                    |done, total| debug!(source = %name, done, total, "connector progress"),
                )
                .await;

                for result in results {
                    let result = match result {
                        Ok(result) => result,
                        Err(never) => match never {},
                    };
                    if let Some(board_url) = board_urls.get(&result.company) {
                        self.store
                            .record_board_poll(board_url, result.success && !result.jobs.is_empty(), now)
                            .await?;
                    }
                    all.push(result);
                }
            }
        }

        for (name, def) in &rules.sources {
            if !def.enabled || def.source_type != SourceType::Search {
                continue;
            }
            let underground = name.contains("underground");
            let included = if underground { options.include_underground } else { options.include_aggregators };
            if !included {
                continue;
            }
            let connector = SearchConnector::new(name.clone());
            all.push(connector.run(&self.search, def, now).await);
        }

        Ok(all)
    }

    /// Phases 3–9.
    async fn process(
        &self,
        run_id: i64,
        results: Vec<ConnectorResult>,
        connectors: &RunConnectorOptions,
        now: DateTime<Utc>,
    ) -> Result<RunSummary> {
        let date = now
            .with_timezone(&self.normalizer.timezone())
            .format("%Y-%m-%d")
            .to_string();
        let mut acc = MetricsAccumulator::new(date);
        let mut errors: Vec<String> = Vec::new();

        // Phase 3: per-source accumulation, checkpoints, failure alerts
        for result in &results {
            acc.record_result(result);
            let failures = self
                .store
                .record_connector_result(&result.source, &result.company, result.success, now)
                .await?;
            if !result.success
                && failures >= FAILURE_ALERT_INTERVAL
                && failures % FAILURE_ALERT_INTERVAL == 0
            {
                let message = format!(
                    "{}/{} has failed {} consecutive polls: {}",
                    result.source,
                    result.company,
                    failures,
                    result.error.as_deref().unwrap_or("unknown error")
                );
                self.notifier.send_system_alert(&message).await;
            }
        }

        // Phase 4: fuzzy index for this run only
        let engine = DedupEngine::load(&self.store, now, self.options.dedup).await?;

        let mut jobs_found = 0i64;
        let mut jobs_new = 0i64;
        let mut jobs_duplicate = 0i64;
        let mut jobs_rejected = 0i64;
        let mut ai_queue: Vec<(i64, String, String, String)> = Vec::new();
        let mut alert_queue: Vec<i64> = Vec::new();

        // Phase 5: sequential per-job processing (single writer)
        for result in &results {
            for raw in &result.jobs {
                jobs_found += 1;
                match self
                    .process_raw_job(raw, &engine, connectors.backfill, now)
                    .await
                {
                    Ok(JobOutcome::Rejected) => jobs_rejected += 1,
                    Ok(JobOutcome::Duplicate) => {
                        jobs_duplicate += 1;
                        acc.record_duplicate(&raw.source);
                    }
                    Ok(JobOutcome::Inserted { id, score, band, bucket }) => {
                        jobs_new += 1;
                        acc.record_new(&raw.source);
                        if !connectors.backfill {
                            if score >= self.options.ai_min_score {
                                ai_queue.push((
                                    id,
                                    raw.title.clone(),
                                    raw.company.clone(),
                                    raw.content.clone(),
                                ));
                            }
                            if band == ScoreBand::TopPriority && bucket == TitleBucket::Include {
                                alert_queue.push(id);
                            }
                        }
                    }
                    Err(e) => {
                        warn!(run_id, url = %raw.url, error = %e, "job processing failed");
                        errors.push(format!("{}: {e}", raw.url));
                        acc.record_parse_failure(&raw.source);
                    }
                }
            }
        }

        // Phase 6: the index dies with the engine
        drop(engine);

        // Phase 7: fit analyses, bounded by the key pool
        let mut analyses: HashMap<i64, FitAnalysis> = HashMap::new();
        if let Some(analyzer) = &self.analyzer {
            let concurrency = analyzer.concurrency();
            let outcomes: Vec<(i64, Option<crate::ai::AnalysisOutcome>)> =
                futures::stream::iter(ai_queue.into_iter().map(|(id, title, company, content)| {
                    let analyzer = Arc::clone(analyzer);
                    async move {
                        let outcome = analyzer.analyze(&title, &company, &content).await;
                        (id, outcome)
                    }
                }))
                .buffer_unordered(concurrency)
                .collect()
                .await;

            for (id, outcome) in outcomes {
                let Some(outcome) = outcome else { continue };
                let analysis = FitAnalysis {
                    canonical_job_id: id,
                    fit_score: outcome.parsed.fit_score,
                    verdict: outcome.parsed.verdict,
                    summary: outcome.parsed.summary,
                    strengths: outcome.parsed.strengths,
                    gaps: outcome.parsed.gaps,
                    matched_skills: outcome.parsed.matched_skills,
                    missing_skills: outcome.parsed.missing_skills,
                    bonus_skills: outcome.parsed.bonus_skills,
                    tailoring_tips: outcome.parsed.tailoring_tips,
                    cover_letter_points: outcome.parsed.cover_letter_points,
                    experience_level_match: outcome.parsed.experience_level_match,
                    domain_relevance: outcome.parsed.domain_relevance,
                    recommendation: outcome.parsed.recommendation,
                    provider: outcome.provider,
                    model_used: outcome.model_used,
                    prompt_tokens: outcome.prompt_tokens,
                    completion_tokens: outcome.completion_tokens,
                };
                self.store.upsert_fit_analysis(&analysis, now).await?;
                analyses.insert(id, analysis);
            }
        }
        let analyses_run = analyses.len() as i64;

        // Phase 8: alerts, after their canonical rows are durable
        let mut alerts_sent = 0i64;
        for id in alert_queue {
            let Some(job) = self.store.get_job(id).await? else { continue };
            if self.notifier.send_job_alert(&job, analyses.get(&id)).await {
                alerts_sent += 1;
            }
        }

        // Phase 9: commit daily metrics
        let total_parse_failures = acc.total_parse_failures();
        for metric in acc.into_metrics() {
            self.store.upsert_source_metric(&metric).await?;
        }
        debug!(run_id, parse_failures = total_parse_failures, "metrics committed");

        Ok(RunSummary {
            run_id,
            status: RunStatus::Completed,
            jobs_found,
            jobs_new,
            jobs_duplicate,
            jobs_rejected,
            alerts_sent,
            analyses_run,
            errors,
        })
    }

    /// Phase 5 body for one raw job.
    async fn process_raw_job(
        &self,
        raw: &RawJob,
        engine: &DedupEngine,
        backfill: bool,
        now: DateTime<Utc>,
    ) -> Result<JobOutcome> {
        let raw_id = self.store.insert_raw_job(raw, now).await?;
        let normalized = self.normalizer.normalize(raw, now);

        if normalized.title_bucket == TitleBucket::Reject {
            return Ok(JobOutcome::Rejected);
        }

        if let (Some(max_days), Some(posted_at)) =
            (self.options.max_job_age_days, normalized.posted_at)
        {
            if (now - posted_at.with_timezone(&Utc)).num_days() > max_days {
                return Ok(JobOutcome::Rejected);
            }
        }

        let mut is_reposted = false;
        let mut original_post_date = None;
        let mut potential_link: Option<(i64, f64)> = None;

        match engine.check(&self.store, &normalized, now).await? {
            DedupOutcome::Duplicate { method, existing_id, .. } => {
                // A second source for the same posting is worth keeping
                if let Some(existing) = self.store.get_job(existing_id).await? {
                    if existing.source != raw.source {
                        self.store
                            .insert_alternate_url(existing_id, &raw.source, &raw.url, now)
                            .await?;
                    }
                }
                debug!(url = %raw.url, method = method.as_str(), "duplicate");
                return Ok(JobOutcome::Duplicate);
            }
            DedupOutcome::PotentialDuplicate { existing_id, similarity } => {
                potential_link = Some((existing_id, similarity));
            }
            DedupOutcome::Repost { original_id, original_post_date: original } => {
                debug!(url = %raw.url, original_id, "repost detected");
                is_reposted = true;
                original_post_date = original;
            }
            DedupOutcome::Unique => {}
        }

        let scores = score_job(
            &normalized,
            &self.normalizer.rules().scoring,
            &self.normalizer.rules().modes,
            now,
            now,
        );

        let new_job = NewCanonicalJob {
            raw_job_id: Some(raw_id),
            source: raw.source.clone(),
            title: normalized.title.clone(),
            company: normalized.company.clone(),
            url: raw.url.clone(),
            url_hash: normalized.url_hash.clone(),
            content_fingerprint: normalized.content_fingerprint.clone(),
            city: normalized.city.clone(),
            province: normalized.province.clone(),
            country: normalized.country.clone(),
            location_tier: normalized.location_tier.clone(),
            work_mode: normalized.work_mode,
            title_bucket: normalized.title_bucket,
            score: scores.total,
            score_freshness: scores.freshness,
            score_location: scores.location,
            score_mode: scores.mode,
            score_band: scores.band,
            posted_at: normalized.posted_at,
            posted_at_confidence: normalized.posted_at_confidence,
            is_backfill: backfill,
            is_reposted,
            original_post_date,
        };

        let id = self.store.insert_canonical(&new_job, now).await?;

        if let Some((existing_id, _similarity)) = potential_link {
            self.store
                .insert_duplicate_link(id, existing_id, "fuzzy_key", 0.75, true, now)
                .await?;
        }

        Ok(JobOutcome::Inserted {
            id,
            score: scores.total,
            band: scores.band,
            bucket: normalized.title_bucket,
        })
    }
}

enum JobOutcome {
    Rejected,
    Duplicate,
    Inserted {
        id: i64,
        score: i64,
        band: ScoreBand,
        bucket: TitleBucket,
    },
}
