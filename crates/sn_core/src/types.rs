use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{Error, Result};

/// A listing entry as extracted by one source adapter. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source_id: String,
    pub url: Option<String>,
    pub title: Option<String>,
    /// Best-effort; sites rarely expose a reliable date on listing pages.
    pub published_at: Option<DateTime<Utc>>,
    pub body_excerpt: String,
}

/// Output of the normalizer: identity and canonical fields, no enrichment yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDraft {
    pub fingerprint: String,
    pub source_id: String,
    pub url: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub body_excerpt: String,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentStatus {
    Pending,
    Enriched,
    Failed,
}

impl EnrichmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Enriched => "enriched",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for EnrichmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrichmentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "enriched" => Ok(Self::Enriched),
            "failed" => Ok(Self::Failed),
            other => Err(Error::Storage(format!("Unknown enrichment status: {}", other))),
        }
    }
}

/// What the AI service returns for one article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub summary: String,
    pub category: String,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub relevance_score: Option<u8>,
}

/// The canonical, persisted article. Keyed by `fingerprint`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub fingerprint: String,
    pub source_id: String,
    pub url: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub body_excerpt: String,
    pub summary: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    pub relevance_score: Option<u8>,
    pub ingested_at: DateTime<Utc>,
    pub enriched_at: Option<DateTime<Utc>>,
    pub enrichment_status: EnrichmentStatus,
}

impl Article {
    pub fn pending(draft: ArticleDraft) -> Self {
        Self {
            fingerprint: draft.fingerprint,
            source_id: draft.source_id,
            url: draft.url,
            title: draft.title,
            published_at: draft.published_at,
            body_excerpt: draft.body_excerpt,
            summary: None,
            category: None,
            entities: Vec::new(),
            relevance_score: None,
            ingested_at: draft.ingested_at,
            enriched_at: None,
            enrichment_status: EnrichmentStatus::Pending,
        }
    }

    pub fn apply_enrichment(&mut self, enrichment: Enrichment, at: DateTime<Utc>) {
        self.summary = Some(enrichment.summary);
        self.category = Some(enrichment.category);
        self.entities = enrichment.entities;
        self.relevance_score = enrichment.relevance_score;
        self.enriched_at = Some(at);
        self.enrichment_status = EnrichmentStatus::Enriched;
    }

    pub fn mark_failed(&mut self) {
        self.enrichment_status = EnrichmentStatus::Failed;
    }

    pub fn enrichment_request(&self) -> EnrichmentRequest {
        EnrichmentRequest {
            title: self.title.clone(),
            body_excerpt: self.body_excerpt.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    pub title: String,
    pub body_excerpt: String,
}

/// Result of an idempotent write keyed by fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No article with this fingerprint existed.
    Inserted,
    /// Enrichment fields of an existing article were overwritten.
    Updated,
    /// The stored article already carried a better or equal enrichment.
    Unchanged,
}

/// Pipeline states. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Reconciling,
    FetchingSources,
    Normalizing,
    Deduping,
    Enriching,
    Committing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    PartialFailure,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialFailure => "partial_failure",
            Self::Failed => "failed",
        }
    }
}

/// Counts reported to the invoking environment at `Done`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub state: RunState,
    pub partial_failure: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub sources_attempted: usize,
    pub sources_failed: usize,
    pub failed_sources: Vec<String>,
    pub drafts_produced: usize,
    pub records_rejected: usize,
    pub duplicates_filtered: usize,
    pub articles_new: usize,
    pub articles_updated: usize,
    pub enrichment_failed: usize,
    pub enrichment_short_circuited: usize,
    pub commit_failed: usize,
    pub articles_omitted: usize,
    pub reconciled: usize,
    pub reconcile_failed: usize,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            status: RunStatus::Success,
            state: RunState::Idle,
            partial_failure: false,
            started_at,
            finished_at: None,
            sources_attempted: 0,
            sources_failed: 0,
            failed_sources: Vec::new(),
            drafts_produced: 0,
            records_rejected: 0,
            duplicates_filtered: 0,
            articles_new: 0,
            articles_updated: 0,
            enrichment_failed: 0,
            enrichment_short_circuited: 0,
            commit_failed: 0,
            articles_omitted: 0,
            reconciled: 0,
            reconcile_failed: 0,
        }
    }

    /// Seals the summary. A run where every attempted source failed is `Failed`.
    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_at = Some(at);
        self.state = RunState::Done;
        self.partial_failure = self.sources_failed > 0
            || self.enrichment_failed > 0
            || self.commit_failed > 0
            || self.articles_omitted > 0
            || self.reconcile_failed > 0;
        self.status = if self.sources_attempted > 0 && self.sources_failed == self.sources_attempted {
            RunStatus::Failed
        } else if self.partial_failure {
            RunStatus::PartialFailure
        } else {
            RunStatus::Success
        };
    }

    pub fn to_record(&self) -> RunRecord {
        RunRecord {
            run_id: self.run_id.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            status: self.finished_at.map(|_| self.status),
            sources_attempted: self.sources_attempted,
            sources_failed: self.sources_failed,
            articles_new: self.articles_new,
            articles_enrichment_failed: self.enrichment_failed,
        }
    }
}

/// Persisted per-run bookkeeping. Written at start and at `Done`, never read by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: Option<RunStatus>,
    pub sources_attempted: usize,
    pub sources_failed: usize,
    pub articles_new: usize,
    pub articles_enrichment_failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerAction {
    /// Reconcile failed enrichments (if enabled), then fetch every source.
    Aggregate,
    /// Only retry enrichment of previously failed articles.
    Reconcile,
}

/// "Run requested" signal. Delivery is at-least-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub action: TriggerAction,
}

impl Trigger {
    pub fn aggregate() -> Self {
        Self {
            action: TriggerAction::Aggregate,
        }
    }

    /// Parses a trigger payload. Fields other than `action` are ignored.
    pub fn parse(payload: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct RawTrigger {
            action: Option<String>,
        }

        let raw: RawTrigger = serde_json::from_str(payload)
            .map_err(|e| Error::InvalidTrigger(format!("payload is not a JSON object: {}", e)))?;
        let action = raw
            .action
            .ok_or_else(|| Error::InvalidTrigger("missing `action`".to_string()))?;
        let action = match action.trim().to_lowercase().as_str() {
            "aggregate" => TriggerAction::Aggregate,
            "reconcile" => TriggerAction::Reconcile,
            other => return Err(Error::InvalidTrigger(format!("unknown action `{}`", other))),
        };
        Ok(Self { action })
    }
}
