use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use sn_core::{RawRecord, SourceConfig, SourceError};
use tracing::{info, instrument};

use super::utils::{self, CardExtractor};
use super::{Scraper, SourceMetadata};
use crate::http;

/// AppWorks prints dates as `2024.03.05` or `2024/03/05` inside a meta line.
#[derive(Debug, Clone)]
pub struct AppWorksScraper {
    client: Client,
}

impl AppWorksScraper {
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
        let meta = utils::selector(&config.id, ".date, .post-date, .meta, .entry-meta")?;

        let records = utils::cards(&document, config, &card)?
            .into_iter()
            .filter_map(|el| {
                let mut record = extractor.record(&config.id, el, &base)?;
                record.published_at = utils::time_attr(el, &time).or_else(|| {
                    el.select(&meta)
                        .map(utils::text_of)
                        .find_map(|line| line.split_whitespace().find_map(utils::parse_datetime))
                });
                Some(record)
            })
            .collect();

        Ok(utils::finish(records, config.max_items))
    }
}

impl Default for AppWorksScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scraper for AppWorksScraper {
    fn source_metadata(&self) -> SourceMetadata {
        SourceMetadata {
            id: "appworks",
            name: "AppWorks",
            emoji: "🚀",
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
        info!(count = records.len(), "Extracted AppWorks records");
        Ok(records)
    }
}
