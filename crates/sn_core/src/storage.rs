use async_trait::async_trait;
use std::collections::HashSet;

use crate::types::{Article, EnrichmentStatus, RunRecord, UpsertOutcome};
use crate::Result;

#[async_trait]
pub trait ArticleStorage: Send + Sync {
    /// Returns the subset of `fingerprints` already stored, in one lookup.
    async fn existing_fingerprints(&self, fingerprints: &[String]) -> Result<HashSet<String>>;

    /// Conditional write keyed by fingerprint. Inserts a new article, or
    /// overwrites only the enrichment fields of an existing one. An
    /// `enriched` article is never downgraded.
    async fn upsert_article(&self, article: &Article) -> Result<UpsertOutcome>;

    /// Get a single article
    async fn get_article(&self, fingerprint: &str) -> Result<Option<Article>>;

    /// Newest `published_at` first
    async fn list_recent(&self, limit: usize) -> Result<Vec<Article>>;

    /// Get all articles from a specific source
    async fn get_by_source(&self, source_id: &str) -> Result<Vec<Article>>;

    /// Oldest ingestion first, so a reconciliation pass retries the longest waiting articles.
    async fn list_by_status(&self, status: EnrichmentStatus, limit: usize) -> Result<Vec<Article>>;

    /// Insert or replace a run record keyed by `run_id`.
    async fn record_run(&self, run: &RunRecord) -> Result<()>;

    /// Most recent first
    async fn list_runs(&self, limit: usize) -> Result<Vec<RunRecord>>;
}

/// Whether an incoming write may replace the stored enrichment fields.
pub fn should_overwrite(stored: EnrichmentStatus, incoming: EnrichmentStatus) -> bool {
    match (stored, incoming) {
        (EnrichmentStatus::Enriched, EnrichmentStatus::Enriched) => true,
        (EnrichmentStatus::Enriched, _) => false,
        (EnrichmentStatus::Failed, EnrichmentStatus::Pending) => false,
        _ => true,
    }
}
