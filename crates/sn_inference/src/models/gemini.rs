use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sn_core::config::EnrichmentConfig;
use sn_core::{Enrichment, EnrichmentError, EnrichmentModel, EnrichmentRequest, Result};
use std::fmt;

use crate::prompt::{build_prompt, parse_enrichment};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-pro";
/// Finish reasons meaning the model refused the content; retrying won't help.
const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT"];

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

pub struct GeminiModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    language: String,
}

impl GeminiModel {
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

impl fmt::Debug for GeminiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiModel")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

fn candidate_text(response: GenerateResponse) -> std::result::Result<String, EnrichmentError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(EnrichmentError::Permanent(format!("prompt blocked: {}", reason)));
    }
    let (text, finish_reason) = match response.candidates.into_iter().next() {
        Some(candidate) => (
            candidate
                .content
                .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
                .unwrap_or_default(),
            candidate.finish_reason,
        ),
        None => (String::new(), None),
    };
    if text.trim().is_empty() {
        if let Some(reason) = finish_reason.filter(|r| BLOCKING_FINISH_REASONS.contains(&r.as_str())) {
            return Err(EnrichmentError::Permanent(format!("candidate blocked: {}", reason)));
        }
        return Err(EnrichmentError::Transient("empty candidate".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl EnrichmentModel for GeminiModel {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> std::result::Result<Enrichment, EnrichmentError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(request, &self.language),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response: GenerateResponse = super::send_json(
            self.client
                .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
                .header("x-goog-api-key", &self.api_key)
                .json(&body),
        )
        .await?;

        parse_enrichment(&candidate_text(response)?)
    }
}
