use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use sn_core::{RawRecord, SourceConfig, SourceError};
use tracing::{info, instrument};

use super::utils::{self, CardExtractor};
use super::{jsonld, Scraper, SourceMetadata};
use crate::http;

/// Startup 101 runs WordPress: post cards carry `entry-*` classes and the
/// page embeds Yoast JSON-LD with publish dates.
#[derive(Debug, Clone)]
pub struct Startup101Scraper {
    client: Client,
}

impl Startup101Scraper {
    pub fn new() -> Self {
        Self {
            client: http::build_client(),
        }
    }

    const DEFAULT_SELECTOR: &'static str = r#"article, .post, [class*="article"]"#;

    pub fn parse(&self, html: &str, config: &SourceConfig) -> Result<Vec<RawRecord>, SourceError> {
        let document = Html::parse_document(html);
        let base = utils::listing_url(config)?;
        let card = utils::selector(&config.id, utils::card_selector(config, Self::DEFAULT_SELECTOR))?;
        let extractor = CardExtractor::new(
            &config.id,
            ".entry-title, h1, h2, h3, .title",
            ".entry-summary, .excerpt, p, .content, .description",
        )?;
        let entry_date = utils::selector(&config.id, "time.entry-date, time.published, time")?;
        let ld_dates = jsonld::published_dates(&document);

        let records = utils::cards(&document, config, &card)?
            .into_iter()
            .filter_map(|el| {
                let mut record = extractor.record(&config.id, el, &base)?;
                record.published_at = utils::time_attr(el, &entry_date).or_else(|| {
                    record
                        .url
                        .as_deref()
                        .and_then(|u| ld_dates.get(u.trim_end_matches('/')).copied())
                });
                record.body_excerpt = strip_read_more(&record.body_excerpt);
                Some(record)
            })
            .collect();

        Ok(utils::finish(records, config.max_items))
    }
}

fn strip_read_more(excerpt: &str) -> String {
    const MARKERS: &[&str] = &["[…]", "[...]", "Read More", "繼續閱讀"];
    let mut out = excerpt.trim();
    for marker in MARKERS {
        out = out.trim_end_matches(marker).trim_end();
    }
    out.to_string()
}

impl Default for Startup101Scraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scraper for Startup101Scraper {
    fn source_metadata(&self) -> SourceMetadata {
        SourceMetadata {
            id: "startup101",
            name: "Startup 101",
            emoji: "📚",
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
        info!(count = records.len(), "Extracted Startup 101 records");
        Ok(records)
    }
}
