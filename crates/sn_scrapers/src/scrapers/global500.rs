use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use sn_core::{RawRecord, SourceConfig, SourceError};
use tracing::{debug, info, instrument};

use super::utils::{self, CardExtractor};
use super::{Scraper, SourceMetadata};
use crate::http;

#[derive(Debug, Clone)]
pub struct Global500Scraper {
    client: Client,
}

impl Global500Scraper {
    pub fn new() -> Self {
        Self {
            client: http::build_client(),
        }
    }

    const DEFAULT_SELECTOR: &'static str = r#"article, .news, [class*="post"]"#;

    pub fn parse(&self, html: &str, config: &SourceConfig) -> Result<Vec<RawRecord>, SourceError> {
        let document = Html::parse_document(html);
        let base = utils::listing_url(config)?;
        let card = utils::selector(&config.id, utils::card_selector(config, Self::DEFAULT_SELECTOR))?;
        let extractor = CardExtractor::standard(&config.id)?;
        let time = utils::selector(&config.id, "time, meta[itemprop='datePublished']")?;
        let date_text = utils::selector(&config.id, ".date, .post-date, .published")?;

        // `[class*="post"]` also hits fragments such as `post-title` or
        // `post-meta`; those have no heading of their own and drop out here.
        let mut skipped = 0usize;
        let records = utils::cards(&document, config, &card)?
            .into_iter()
            .filter_map(|el| {
                let Some(mut record) = extractor.record(&config.id, el, &base) else {
                    skipped += 1;
                    return None;
                };
                record.published_at = utils::time_attr(el, &time)
                    .or_else(|| utils::first_text(el, &date_text).and_then(|t| utils::parse_datetime(&t)));
                Some(record)
            })
            .collect();
        debug!(skipped, "Skipped 500 Global fragments without a title");

        Ok(utils::finish(records, config.max_items))
    }
}

impl Default for Global500Scraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scraper for Global500Scraper {
    fn source_metadata(&self) -> SourceMetadata {
        SourceMetadata {
            id: "500-global",
            name: "500 Global",
            emoji: "🌏",
            region: "Global",
        }
    }

    fn default_selector(&self) -> &'static str {
        Self::DEFAULT_SELECTOR
    }

    #[instrument(level = "info", skip_all, fields(source = %config.id))]
    async fn fetch(&self, config: &SourceConfig) -> Result<Vec<RawRecord>, SourceError> {
        let html = http::fetch_listing(&self.client, config).await?;
        let records = self.parse(&html, config)?;
        info!(count = records.len(), "Extracted 500 Global records");
        Ok(records)
    }
}
