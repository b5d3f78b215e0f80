use chrono::Utc;
use futures::future::join_all;
use sn_core::config::PipelineConfig;
use sn_core::normalize::normalize;
use sn_core::{
    Article, ArticleDraft, ArticleStorage, EnrichmentModel, EnrichmentStatus, RawRecord, Result,
    RunState, RunSummary, SourceConfig, SourceError, Trigger, TriggerAction, UpsertOutcome,
};
use sn_inference::{CircuitBreaker, EnrichOutcome, ResilientEnricher, RetryPolicy};
use sn_scrapers::ScraperRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::dedup::filter_new;
use crate::state::RunStateMachine;

/// Extra time granted on top of a source's own timeout before the
/// orchestrator gives up on an adapter that ignores it.
const FETCH_GRACE: Duration = Duration::from_secs(2);

enum EnrichResult {
    Enriched(Article),
    Failed(Article),
    ShortCircuited(Article),
    /// Not started before the deadline.
    Omitted,
}

/// Runs one end-to-end aggregation per trigger.
///
/// Per-source and per-article failures are counted in the returned
/// [`RunSummary`]; only configuration errors are returned as `Err`.
pub struct Orchestrator {
    config: PipelineConfig,
    registry: ScraperRegistry,
    model: Arc<dyn EnrichmentModel>,
    storage: Arc<dyn ArticleStorage>,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        registry: ScraperRegistry,
        model: Arc<dyn EnrichmentModel>,
        storage: Arc<dyn ArticleStorage>,
    ) -> Self {
        Self {
            config,
            registry,
            model,
            storage,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn storage(&self) -> Arc<dyn ArticleStorage> {
        self.storage.clone()
    }

    pub fn registry(&self) -> &ScraperRegistry {
        &self.registry
    }

    #[instrument(skip_all, fields(action = ?trigger.action))]
    pub async fn run(&self, trigger: &Trigger) -> Result<RunSummary> {
        self.config.validate(&self.registry.ids())?;

        let mut machine = RunStateMachine::new();
        let mut summary = RunSummary::new(Utc::now());
        let deadline = Instant::now() + self.config.run.deadline();
        info!(run_id = %summary.run_id, "🚀 Starting run");
        self.record_run(&summary).await;

        let breaker = Arc::new(CircuitBreaker::new(self.config.enrichment.breaker_threshold));
        let enricher = Arc::new(ResilientEnricher::new(
            self.model.clone(),
            RetryPolicy::from_config(&self.config.enrichment),
            breaker,
        ));

        if trigger.action == TriggerAction::Reconcile || self.config.run.reconcile_failed {
            self.advance(&mut machine, &mut summary, RunState::Reconciling);
            self.reconcile(&enricher, &mut summary, deadline).await;
        }

        if trigger.action == TriggerAction::Aggregate {
            self.advance(&mut machine, &mut summary, RunState::FetchingSources);
            let records = self.fetch_sources(&mut summary).await;

            self.advance(&mut machine, &mut summary, RunState::Normalizing);
            let drafts = self.normalize_records(&records, &mut summary);

            self.advance(&mut machine, &mut summary, RunState::Deduping);
            let dedup = filter_new(self.storage.as_ref(), drafts).await;
            summary.duplicates_filtered += dedup.duplicates;
            info!(
                fresh = dedup.fresh.len(),
                duplicates = dedup.duplicates,
                "🔍 Filtered already stored articles"
            );

            self.advance(&mut machine, &mut summary, RunState::Enriching);
            let articles = self
                .enrich_drafts(&enricher, dedup.fresh, &mut summary, deadline)
                .await;

            self.advance(&mut machine, &mut summary, RunState::Committing);
            self.commit(articles, &mut summary, deadline).await;
        }

        self.advance(&mut machine, &mut summary, RunState::Done);
        summary.finish(Utc::now());
        self.record_run(&summary).await;

        info!(
            run_id = %summary.run_id,
            status = summary.status.as_str(),
            sources_attempted = summary.sources_attempted,
            sources_failed = summary.sources_failed,
            drafts_produced = summary.drafts_produced,
            records_rejected = summary.records_rejected,
            duplicates_filtered = summary.duplicates_filtered,
            articles_new = summary.articles_new,
            articles_updated = summary.articles_updated,
            enrichment_failed = summary.enrichment_failed,
            enrichment_short_circuited = summary.enrichment_short_circuited,
            commit_failed = summary.commit_failed,
            articles_omitted = summary.articles_omitted,
            reconciled = summary.reconciled,
            reconcile_failed = summary.reconcile_failed,
            "✅ Run finished"
        );
        Ok(summary)
    }

    fn advance(&self, machine: &mut RunStateMachine, summary: &mut RunSummary, next: RunState) {
        machine.advance(next);
        summary.state = machine.state();
    }

    async fn record_run(&self, summary: &RunSummary) {
        if let Err(e) = self.storage.record_run(&summary.to_record()).await {
            warn!(run_id = %summary.run_id, error = %e, "Failed to record run");
        }
    }

    /// Retries enrichment of previously failed articles. Only enrichment fields change.
    async fn reconcile(&self, enricher: &Arc<ResilientEnricher>, summary: &mut RunSummary, deadline: Instant) {
        let failed = match self
            .storage
            .list_by_status(EnrichmentStatus::Failed, self.config.run.reconcile_limit)
            .await
        {
            Ok(failed) => failed,
            Err(e) => {
                warn!(error = %e, "Could not load failed articles; skipping reconciliation");
                return;
            }
        };
        if failed.is_empty() {
            debug!("Nothing to reconcile");
            return;
        }
        info!(count = failed.len(), "♻️ Reconciling failed enrichments");

        for result in self.enrich_concurrently(enricher, failed, deadline).await {
            match result {
                EnrichResult::Enriched(article) => match self.storage.upsert_article(&article).await {
                    Ok(UpsertOutcome::Updated) => summary.reconciled += 1,
                    Ok(outcome) => debug!(fingerprint = %article.fingerprint, ?outcome, "Reconciled article not rewritten"),
                    Err(e) => {
                        error!(fingerprint = %article.fingerprint, error = %e, "Failed to store reconciled article");
                        summary.reconcile_failed += 1;
                    }
                },
                EnrichResult::Failed(_) | EnrichResult::ShortCircuited(_) => summary.reconcile_failed += 1,
                EnrichResult::Omitted => {}
            }
        }
    }

    async fn fetch_sources(&self, summary: &mut RunSummary) -> Vec<RawRecord> {
        let sources: Vec<&SourceConfig> = self.config.enabled_sources().collect();
        summary.sources_attempted = sources.len();
        info!(count = sources.len(), "🌐 Fetching sources");

        let fetches = sources.into_iter().map(|source| self.fetch_source(source));
        let mut records = Vec::new();
        for result in join_all(fetches).await {
            match result {
                Ok(mut batch) => records.append(&mut batch),
                Err(e) => {
                    summary.sources_failed += 1;
                    summary.failed_sources.push(e.source_id().to_string());
                }
            }
        }
        records
    }

    async fn fetch_source(&self, source: &SourceConfig) -> std::result::Result<Vec<RawRecord>, SourceError> {
        let scraper = self
            .registry
            .get(&source.id)
            .ok_or_else(|| SourceError::unavailable(&source.id, "no adapter registered"))?;

        let result = match timeout(source.timeout() + FETCH_GRACE, scraper.fetch(source)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::unavailable(
                &source.id,
                format!("timed out after {}s", source.timeout_secs),
            )),
        };

        match &result {
            Ok(records) => info!(source = %source.id, count = records.len(), "📰 Fetched listing"),
            Err(e) => warn!(source = %source.id, error = %e, "❌ Source failed"),
        }
        result
    }

    fn normalize_records(&self, records: &[RawRecord], summary: &mut RunSummary) -> Vec<ArticleDraft> {
        let ingested_at = Utc::now();
        let mut drafts = Vec::with_capacity(records.len());
        for record in records {
            match normalize(record, ingested_at) {
                Ok(draft) => drafts.push(draft),
                Err(e) => {
                    debug!(source = %record.source_id, error = %e, "Dropping record");
                    summary.records_rejected += 1;
                }
            }
        }
        summary.drafts_produced = drafts.len();
        drafts
    }

    async fn enrich_drafts(
        &self,
        enricher: &Arc<ResilientEnricher>,
        drafts: Vec<ArticleDraft>,
        summary: &mut RunSummary,
        deadline: Instant,
    ) -> Vec<Article> {
        if drafts.is_empty() {
            return Vec::new();
        }
        info!(count = drafts.len(), "🤖 Enriching new articles");
        let pending = drafts.into_iter().map(Article::pending).collect();

        let mut articles = Vec::new();
        for result in self.enrich_concurrently(enricher, pending, deadline).await {
            match result {
                EnrichResult::Enriched(article) => articles.push(article),
                EnrichResult::Failed(article) => {
                    summary.enrichment_failed += 1;
                    articles.push(article);
                }
                EnrichResult::ShortCircuited(article) => {
                    summary.enrichment_failed += 1;
                    summary.enrichment_short_circuited += 1;
                    articles.push(article);
                }
                EnrichResult::Omitted => summary.articles_omitted += 1,
            }
        }
        articles
    }

    /// Enriches with at most `enrichment.concurrency` calls in flight.
    async fn enrich_concurrently(
        &self,
        enricher: &Arc<ResilientEnricher>,
        articles: Vec<Article>,
        deadline: Instant,
    ) -> Vec<EnrichResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.enrichment.concurrency.max(1)));
        let tasks = articles.into_iter().map(|mut article| {
            let semaphore = semaphore.clone();
            let enricher = enricher.clone();
            async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return EnrichResult::Omitted,
                };
                if Instant::now() >= deadline {
                    debug!(fingerprint = %article.fingerprint, "Deadline reached; not enriching");
                    return EnrichResult::Omitted;
                }
                match enricher.enrich(&article.enrichment_request()).await {
                    EnrichOutcome::Enriched(enrichment) => {
                        article.apply_enrichment(enrichment, Utc::now());
                        EnrichResult::Enriched(article)
                    }
                    EnrichOutcome::Failed { attempts, error } => {
                        warn!(fingerprint = %article.fingerprint, attempts, error = %error, "Persisting as failed");
                        article.mark_failed();
                        EnrichResult::Failed(article)
                    }
                    EnrichOutcome::ShortCircuited => {
                        article.mark_failed();
                        EnrichResult::ShortCircuited(article)
                    }
                }
            }
        });
        join_all(tasks).await
    }

    async fn commit(&self, articles: Vec<Article>, summary: &mut RunSummary, deadline: Instant) {
        for article in articles {
            if Instant::now() >= deadline {
                summary.articles_omitted += 1;
                continue;
            }
            match self.storage.upsert_article(&article).await {
                Ok(UpsertOutcome::Inserted) => {
                    debug!(fingerprint = %article.fingerprint, status = %article.enrichment_status, "💾 Stored");
                    summary.articles_new += 1;
                }
                Ok(UpsertOutcome::Updated) => summary.articles_updated += 1,
                Ok(UpsertOutcome::Unchanged) => summary.duplicates_filtered += 1,
                Err(e) => {
                    error!(fingerprint = %article.fingerprint, error = %e, "Failed to commit article");
                    summary.commit_failed += 1;
                }
            }
        }
    }
}
