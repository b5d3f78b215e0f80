use async_trait::async_trait;
use sn_core::{Enrichment, EnrichmentError, EnrichmentModel, EnrichmentRequest};
use std::fmt;

use crate::prompt::DEFAULT_CATEGORY;

/// Offline model: the summary is the opening words of the excerpt.
pub struct DummyModel;

impl DummyModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").finish()
    }
}

#[async_trait]
impl EnrichmentModel for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<Enrichment, EnrichmentError> {
        let source = if request.body_excerpt.trim().is_empty() {
            &request.title
        } else {
            &request.body_excerpt
        };
        // Take first 30 words and join them
        let summary = source.split_whitespace().take(30).collect::<Vec<_>>().join(" ");
        if summary.is_empty() {
            return Err(EnrichmentError::Permanent("nothing to summarize".to_string()));
        }
        Ok(Enrichment {
            summary,
            category: DEFAULT_CATEGORY.to_string(),
            entities: Vec::new(),
            relevance_score: None,
        })
    }
}
