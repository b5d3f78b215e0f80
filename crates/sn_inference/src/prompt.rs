use serde_json::Value;
use sn_core::{Enrichment, EnrichmentError, EnrichmentRequest};

pub const DEFAULT_CATEGORY: &str = "Other";

pub fn build_prompt(request: &EnrichmentRequest, language: &str) -> String {
    format!(
        "Summarize and categorize the following startup news article in {language}.\n\n\
         Title: {title}\n\
         Content: {content}\n\n\
         Respond with a single JSON object with these keys:\n\
         \"summary\": a brief summary (2-3 sentences),\n\
         \"category\": one of Funding, Product Launch, Collaboration, Event, Other,\n\
         \"entities\": an array of key entity names mentioned,\n\
         \"relevance_score\": an integer from 1 to 10.",
        language = language,
        title = request.title,
        content = request.body_excerpt,
    )
}

/// Models like to wrap JSON in markdown fences or add a sentence around it.
fn json_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Parses model output into an `Enrichment`. Unusable output is transient:
/// generation is not deterministic and a retry can succeed.
pub fn parse_enrichment(text: &str) -> Result<Enrichment, EnrichmentError> {
    let slice = json_slice(text)
        .ok_or_else(|| EnrichmentError::Transient("model output contains no JSON object".to_string()))?;
    let value: Value = serde_json::from_str(slice)
        .map_err(|e| EnrichmentError::Transient(format!("model output is not valid JSON: {}", e)))?;

    let summary = value
        .get("summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EnrichmentError::Transient("model output has no summary".to_string()))?
        .to_string();

    let category = value
        .get("category")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string();

    let entities = match value.get("entities") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(|s| s.trim().to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    let relevance_score = match value.get("relevance_score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|score| score.is_finite())
    .map(|score| score.round().clamp(1.0, 10.0) as u8);

    Ok(Enrichment {
        summary,
        category,
        entities,
        relevance_score,
    })
}
