use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use sn_core::config::{EnrichmentConfig, EnrichmentProvider};
use sn_core::error::is_transient_status;
use sn_core::{EnrichmentError, EnrichmentModel, Error, Result};
use std::sync::Arc;
use std::time::Duration;

pub mod dummy;
pub mod gemini;
pub mod openai;

pub use dummy::DummyModel;
pub use gemini::GeminiModel;
pub use openai::OpenAiModel;

pub async fn create_model(config: &EnrichmentConfig) -> Result<Arc<dyn EnrichmentModel>> {
    config.validate()?;
    let model: Arc<dyn EnrichmentModel> = match config.provider {
        EnrichmentProvider::Gemini => Arc::new(GeminiModel::new(config)?),
        EnrichmentProvider::OpenAi => Arc::new(OpenAiModel::new(config)?),
        EnrichmentProvider::Dummy => Arc::new(DummyModel::new()),
    };
    Ok(model)
}

pub(crate) fn http_client(config: &EnrichmentConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(Error::Http)
}

pub(crate) fn api_key(config: &EnrichmentConfig) -> Result<String> {
    config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| Error::Configuration(format!("Missing API key for {:?}", config.provider)))
}

/// Sends the request and decodes the JSON body, classifying failures by status.
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> std::result::Result<T, EnrichmentError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = format!("HTTP {}: {}", status, body.chars().take(300).collect::<String>());
        return Err(if is_transient_status(status.as_u16()) {
            EnrichmentError::Transient(message)
        } else {
            EnrichmentError::Permanent(message)
        });
    }
    Ok(response.json::<T>().await?)
}
