use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashMap;

use super::utils::parse_datetime;

/// Collects `datePublished` of every JSON-LD node that names its URL,
/// including nodes nested in an `@graph` array (the WordPress/Yoast layout).
pub fn published_dates(document: &Html) -> HashMap<String, DateTime<Utc>> {
    let mut dates = HashMap::new();

    if let Ok(script_selector) = Selector::parse("script[type='application/ld+json']") {
        for script in document.select(&script_selector) {
            if let Ok(json) = serde_json::from_str::<Value>(script.text().collect::<String>().trim()) {
                collect(&json, &mut dates);
            }
        }
    }

    dates
}

fn collect(node: &Value, dates: &mut HashMap<String, DateTime<Utc>>) {
    match node {
        Value::Array(items) => {
            for item in items {
                collect(item, dates);
            }
        }
        Value::Object(obj) => {
            if let Some(graph) = obj.get("@graph") {
                collect(graph, dates);
            }
            let published = obj
                .get("datePublished")
                .and_then(Value::as_str)
                .and_then(parse_datetime);
            let url = obj.get("url").and_then(Value::as_str).or_else(|| {
                match obj.get("mainEntityOfPage") {
                    Some(Value::String(s)) => Some(s.as_str()),
                    Some(Value::Object(page)) => page.get("@id").and_then(Value::as_str),
                    _ => None,
                }
            });
            if let (Some(url), Some(published)) = (url, published) {
                dates.insert(url.trim_end_matches('/').to_string(), published);
            }
        }
        _ => {}
    }
}
