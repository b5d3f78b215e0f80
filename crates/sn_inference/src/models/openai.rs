use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sn_core::config::EnrichmentConfig;
use sn_core::{Enrichment, EnrichmentError, EnrichmentModel, EnrichmentRequest, Result};
use std::fmt;

use crate::prompt::{build_prompt, parse_enrichment};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

/// Any endpoint speaking the `/chat/completions` protocol.
pub struct OpenAiModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    language: String,
}

impl OpenAiModel {
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        Ok(Self {
            client: super::http_client(config)?,
            api_key: super::api_key(config)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            language: config.language.clone(),
        })
    }
}

impl fmt::Debug for OpenAiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiModel")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl EnrichmentModel for OpenAiModel {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> std::result::Result<Enrichment, EnrichmentError> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "You are a startup news editor. Reply with JSON only.".to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(request, &self.language),
                },
            ],
        };

        let response: ChatResponse = super::send_json(
            self.client
                .post(format!("{}/chat/completions", self.base_url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body),
        )
        .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EnrichmentError::Transient("response has no choices".to_string()))?;
        parse_enrichment(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EnrichmentConfig {
            api_key: Some("sk-test".to_string()),
            base_url: Some("http://localhost:11434/v1/".to_string()),
            ..EnrichmentConfig::default()
        };
        let model = OpenAiModel::new(&config).unwrap();
        assert_eq!(model.base_url, "http://localhost:11434/v1");
        assert_eq!(model.model, DEFAULT_MODEL);
        assert!(!format!("{:?}", model).contains("sk-test"));
    }

    #[test]
    fn test_requires_key() {
        assert!(OpenAiModel::new(&EnrichmentConfig::default()).is_err());
    }
}
