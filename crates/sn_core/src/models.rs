use async_trait::async_trait;

use crate::error::EnrichmentError;
use crate::types::{Enrichment, EnrichmentRequest};

#[async_trait]
pub trait EnrichmentModel: Send + Sync {
    /// Name of the provider, for logs
    fn name(&self) -> &str;

    /// Summarize and categorize one article
    async fn enrich(&self, request: &EnrichmentRequest) -> Result<Enrichment, EnrichmentError>;
}
