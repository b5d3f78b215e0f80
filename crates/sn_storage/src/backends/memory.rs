use async_trait::async_trait;
use sn_core::storage::should_overwrite;
use sn_core::{Article, ArticleStorage, EnrichmentStatus, Result, RunRecord, UpsertOutcome};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    articles: HashMap<String, Article>,
    runs: HashMap<String, RunRecord>,
}

fn same_enrichment(a: &Article, b: &Article) -> bool {
    a.enrichment_status == b.enrichment_status
        && a.summary == b.summary
        && a.category == b.category
        && a.entities == b.entities
        && a.relevance_score == b.relevance_score
}

impl MemoryStore {
    pub fn upsert_article(&mut self, article: &Article) -> UpsertOutcome {
        match self.articles.get_mut(&article.fingerprint) {
            None => {
                self.articles.insert(article.fingerprint.clone(), article.clone());
                UpsertOutcome::Inserted
            }
            Some(stored) => {
                if !should_overwrite(stored.enrichment_status, article.enrichment_status)
                    || same_enrichment(stored, article)
                {
                    return UpsertOutcome::Unchanged;
                }
                stored.summary = article.summary.clone();
                stored.category = article.category.clone();
                stored.entities = article.entities.clone();
                stored.relevance_score = article.relevance_score;
                stored.enriched_at = article.enriched_at;
                stored.enrichment_status = article.enrichment_status;
                UpsertOutcome::Updated
            }
        }
    }

    fn sorted<F>(&self, mut keep: F) -> Vec<Article>
    where
        F: FnMut(&Article) -> bool,
    {
        let mut articles: Vec<Article> = self.articles.values().filter(|a| keep(a)).cloned().collect();
        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at).then_with(|| a.fingerprint.cmp(&b.fingerprint)));
        articles
    }
}

/// Process-local backend with the same conditional-write semantics as SQLite.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.articles.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ArticleStorage for InMemoryStorage {
    async fn existing_fingerprints(&self, fingerprints: &[String]) -> Result<HashSet<String>> {
        let store = self.store.read().await;
        Ok(fingerprints
            .iter()
            .filter(|fp| store.articles.contains_key(*fp))
            .cloned()
            .collect())
    }

    async fn upsert_article(&self, article: &Article) -> Result<UpsertOutcome> {
        let mut store = self.store.write().await;
        Ok(store.upsert_article(article))
    }

    async fn get_article(&self, fingerprint: &str) -> Result<Option<Article>> {
        let store = self.store.read().await;
        Ok(store.articles.get(fingerprint).cloned())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        Ok(store.sorted(|_| true).into_iter().take(limit).collect())
    }

    async fn get_by_source(&self, source_id: &str) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        Ok(store.sorted(|a| a.source_id == source_id))
    }

    async fn list_by_status(&self, status: EnrichmentStatus, limit: usize) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        let mut articles: Vec<Article> = store
            .articles
            .values()
            .filter(|a| a.enrichment_status == status)
            .cloned()
            .collect();
        articles.sort_by(|a, b| a.ingested_at.cmp(&b.ingested_at).then_with(|| a.fingerprint.cmp(&b.fingerprint)));
        articles.truncate(limit);
        Ok(articles)
    }

    async fn record_run(&self, run: &RunRecord) -> Result<()> {
        let mut store = self.store.write().await;
        store.runs.insert(run.run_id.clone(), run.clone());
        Ok(())
    }

    async fn list_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let store = self.store.read().await;
        let mut runs: Vec<RunRecord> = store.runs.values().cloned().collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }
}
