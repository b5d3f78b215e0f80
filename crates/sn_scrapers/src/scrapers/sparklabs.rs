use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use sn_core::{RawRecord, SourceConfig, SourceError};
use tracing::{info, instrument};

use super::utils::{self, CardExtractor};
use super::{Scraper, SourceMetadata};
use crate::http;

#[derive(Debug, Clone)]
pub struct SparkLabsScraper {
    client: Client,
}

impl SparkLabsScraper {
    pub fn new() -> Self {
        Self {
            client: http::build_client(),
        }
    }

    const DEFAULT_SELECTOR: &'static str = r#"article, .post, [class*="news"]"#;

    pub fn parse(&self, html: &str, config: &SourceConfig) -> Result<Vec<RawRecord>, SourceError> {
        let document = Html::parse_document(html);
        let base = utils::listing_url(config)?;
        let card = utils::selector(&config.id, utils::card_selector(config, Self::DEFAULT_SELECTOR))?;
        let extractor = CardExtractor::standard(&config.id)?;
        let time = utils::selector(&config.id, "time")?;
        let date_text = utils::selector(&config.id, ".date, .post-date")?;

        let records = utils::cards(&document, config, &card)?
            .into_iter()
            .filter_map(|el| {
                let mut record = extractor.record(&config.id, el, &base)?;
                record.published_at = utils::time_attr(el, &time)
                    .or_else(|| utils::first_text(el, &date_text).and_then(|t| utils::parse_datetime(&t)));
                Some(record)
            })
            .collect();

        Ok(utils::finish(records, config.max_items))
    }
}

impl Default for SparkLabsScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scraper for SparkLabsScraper {
    fn source_metadata(&self) -> SourceMetadata {
        SourceMetadata {
            id: "sparklabs-taiwan",
            name: "SparkLabs Taiwan",
            emoji: "✨",
            region: "Taiwan",
        }
    }

    fn default_selector(&self) -> &'static str {
        Self::DEFAULT_SELECTOR
    }

    #[instrument(level = "info", skip_all, fields(source = %config.id))]
    async fn fetch(&self, config: &SourceConfig) -> Result<Vec<RawRecord>, SourceError> {
        let html = http::fetch_listing(&self.client, config).await?;
        let records = self.parse(&html, config)?;
        info!(count = records.len(), "Extracted SparkLabs Taiwan records");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const FIXTURE: &str = r#"
        <html><body>
          <section class="news-list">
            <article>
              <h2><a href="/news/demo-day-2024">SparkLabs Taiwan Demo Day 2024</a></h2>
              <time datetime="2024-05-20T10:00:00+08:00">May 20</time>
              <p>Twelve startups from the fifth cohort pitched to investors.</p>
            </article>
            <article>
              <h2>Applications open for Batch 6</h2>
              <span class="date">2024-06-01</span>
            </article>
            <article><p>A card with no heading is skipped.</p></article>
          </section>
        </body></html>"#;

    fn config() -> SourceConfig {
        SourceConfig::new("sparklabs-taiwan", "SparkLabs Taiwan", "https://www.sparklabstaiwan.com")
    }

    #[test]
    fn test_parse_listing() {
        let scraper = SparkLabsScraper::new();
        let records = scraper.parse(FIXTURE, &config()).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].title.as_deref(), Some("SparkLabs Taiwan Demo Day 2024"));
        assert_eq!(records[0].url.as_deref(), Some("https://www.sparklabstaiwan.com/news/demo-day-2024"));
        assert_eq!(records[0].published_at, Some(Utc.with_ymd_and_hms(2024, 5, 20, 2, 0, 0).unwrap()));
        assert!(records[0].body_excerpt.starts_with("Twelve startups"));

        // no link in the card: falls back to the listing page, no excerpt
        assert_eq!(records[1].url.as_deref(), Some("https://www.sparklabstaiwan.com/"));
        assert_eq!(records[1].body_excerpt, "");
        assert_eq!(records[1].published_at, Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_parse_respects_max_items() {
        let mut config = config();
        config.max_items = 1;
        let records = SparkLabsScraper::new().parse(FIXTURE, &config).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_changed_markup_is_parse_error() {
        let err = SparkLabsScraper::new()
            .parse("<html><body><div>maintenance</div></body></html>", &config())
            .unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
    }
}
