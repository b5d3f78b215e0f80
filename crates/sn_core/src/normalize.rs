//! Turns adapter output into canonical drafts and computes fingerprints.
//!
//! The fingerprint only depends on the canonical URL and the normalized
//! title, so the same listing entry hashes identically across runs no matter
//! what its excerpt or fetch time was.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::NormalizationError;
use crate::types::{ArticleDraft, RawRecord};

const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "msclkid", "mc_cid", "mc_eid", "igshid", "yclid", "_ga", "_hsenc",
    "_hsmi", "ref_src",
];

fn is_tracking_param(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name.as_str())
}

/// Lowercases scheme and host, drops tracking parameters, the fragment and any trailing slash.
/// Returns `None` for input that is not an absolute URL.
pub fn canonicalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if url.cannot_be_a_base() {
        return None;
    }
    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let trimmed = url.path().trim_end_matches('/').to_string();
    url.set_path(&trimmed);

    let mut canonical = url.to_string();
    // The url crate always renders an empty path as "/".
    if url.query().is_none() && canonical.ends_with('/') {
        canonical.pop();
    }
    Some(canonical)
}

/// Trimmed, lowercased, internal whitespace collapsed.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn fingerprint(canonical_url: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_url.as_bytes());
    hasher.update(b"\n");
    hasher.update(normalize_title(title).as_bytes());
    format!("{:x}", hasher.finalize())
}

fn clean(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pure conversion of one raw record. `ingested_at` doubles as the fallback publish time.
pub fn normalize(record: &RawRecord, ingested_at: DateTime<Utc>) -> Result<ArticleDraft, NormalizationError> {
    let url = record.url.as_deref().and_then(canonicalize_url);
    let title = record
        .title
        .as_deref()
        .map(clean)
        .filter(|t| !t.is_empty());

    if url.is_none() && title.is_none() {
        return Err(match record.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            Some(raw) => NormalizationError::InvalidUrl {
                source_id: record.source_id.clone(),
                url: raw.to_string(),
            },
            None => NormalizationError::MissingIdentity(record.source_id.clone()),
        });
    }
    let url = url.unwrap_or_default();
    let title = title.unwrap_or_default();

    Ok(ArticleDraft {
        fingerprint: fingerprint(&url, &title),
        source_id: record.source_id.clone(),
        url,
        title,
        published_at: record.published_at.unwrap_or(ingested_at),
        body_excerpt: clean(&record.body_excerpt),
        ingested_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(url: Option<&str>, title: Option<&str>, excerpt: &str) -> RawRecord {
        RawRecord {
            source_id: "startup101".to_string(),
            url: url.map(str::to_string),
            title: title.map(str::to_string),
            published_at: None,
            body_excerpt: excerpt.to_string(),
        }
    }

    #[test]
    fn test_canonicalize_strips_tracking_and_case() {
        assert_eq!(
            canonicalize_url("https://Example.com/a?utm_source=x").as_deref(),
            Some("https://example.com/a")
        );
        assert_eq!(
            canonicalize_url("https://example.com/a").as_deref(),
            Some("https://example.com/a")
        );
        assert_eq!(
            canonicalize_url("HTTPS://EXAMPLE.COM/a/?fbclid=1&id=7#comments").as_deref(),
            Some("https://example.com/a?id=7")
        );
    }

    #[test]
    fn test_canonicalize_trailing_slash() {
        assert_eq!(canonicalize_url("https://500.co/").as_deref(), Some("https://500.co"));
        assert_eq!(canonicalize_url("https://500.co").as_deref(), Some("https://500.co"));
        assert_eq!(
            canonicalize_url("https://appworks.tw/news/demo-day/").as_deref(),
            Some("https://appworks.tw/news/demo-day")
        );
    }

    #[test]
    fn test_canonicalize_rejects_relative() {
        assert!(canonicalize_url("/news/1").is_none());
        assert!(canonicalize_url("mailto:team@500.co").is_none());
    }

    #[test]
    fn test_fingerprint_is_stable_across_runs() {
        let first = normalize(
            &record(Some("https://Startup101.biz/post/1?utm_medium=rss"), Some("  Seed Round  Closed "), "v1"),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let second = normalize(
            &record(Some("https://startup101.biz/post/1/"), Some("seed round closed"), "a different excerpt"),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        )
        .unwrap();
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(first.fingerprint.len(), 64);
    }

    #[test]
    fn test_fingerprint_differs_by_title() {
        assert_ne!(
            fingerprint("https://500.co/a", "Batch 33"),
            fingerprint("https://500.co/a", "Batch 34")
        );
    }

    #[test]
    fn test_published_at_falls_back_to_ingestion() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        let draft = normalize(&record(Some("https://500.co/a"), Some("A"), ""), now).unwrap();
        assert_eq!(draft.published_at, now);
        assert_eq!(draft.ingested_at, now);
    }

    #[test]
    fn test_rejects_records_without_identity() {
        let err = normalize(&record(None, Some("   "), "text"), Utc::now()).unwrap_err();
        assert_eq!(err, NormalizationError::MissingIdentity("startup101".to_string()));
        let err = normalize(&record(Some("not a url"), None, "text"), Utc::now()).unwrap_err();
        assert!(matches!(err, NormalizationError::InvalidUrl { ref url, .. } if url == "not a url"));
    }

    #[test]
    fn test_accepts_partial_identity() {
        let draft = normalize(&record(None, Some("Only a title"), ""), Utc::now()).unwrap();
        assert_eq!(draft.url, "");
        assert_eq!(draft.title, "Only a title");

        let draft = normalize(&record(Some("https://500.co/x"), None, ""), Utc::now()).unwrap();
        assert_eq!(draft.title, "");
    }
}
