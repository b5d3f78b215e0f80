use reqwest::Client;
use sn_core::{SourceConfig, SourceError};
use tracing::debug;

pub const USER_AGENT: &str = "Mozilla/5.0 (Startup News Aggregator)";

pub fn build_client() -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Downloads the listing page of a source. The whole exchange, body
/// included, is bounded by the source's timeout.
pub async fn fetch_listing(client: &Client, config: &SourceConfig) -> Result<String, SourceError> {
    let request = async {
        let response = client
            .get(&config.url)
            .timeout(config.timeout())
            .send()
            .await
            .map_err(|e| SourceError::unavailable(&config.id, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::unavailable(&config.id, format!("HTTP {}", status)));
        }
        response
            .text()
            .await
            .map_err(|e| SourceError::unavailable(&config.id, e))
    };

    let body = tokio::time::timeout(config.timeout(), request)
        .await
        .map_err(|_| {
            SourceError::unavailable(&config.id, format!("timed out after {}s", config.timeout_secs))
        })??;
    debug!(source = %config.id, bytes = body.len(), "Fetched listing page");
    Ok(body)
}
