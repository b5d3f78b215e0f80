use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use sn_core::{RawRecord, SourceConfig, SourceError};
use tracing::{info, instrument};

use super::utils::{self, CardExtractor};
use super::{Scraper, SourceMetadata};
use crate::http;

/// The resources page nests `resource-*` containers, and some cards are
/// themselves anchors. Resources are undated.
#[derive(Debug, Clone)]
pub struct Studios886Scraper {
    client: Client,
}

impl Studios886Scraper {
    pub fn new() -> Self {
        Self {
            client: http::build_client(),
        }
    }

    const DEFAULT_SELECTOR: &'static str = r#"div[class*="resource"], article, .post"#;

    pub fn parse(&self, html: &str, config: &SourceConfig) -> Result<Vec<RawRecord>, SourceError> {
        let document = Html::parse_document(html);
        let base = utils::listing_url(config)?;
        let card = utils::selector(&config.id, utils::card_selector(config, Self::DEFAULT_SELECTOR))?;
        let extractor = CardExtractor::new(
            &config.id,
            ".resource-title, h1, h2, h3, h4, .title",
            ".resource-description, p, .content, .description",
        )?;
        let anchor = utils::selector(&config.id, "a[href]")?;

        let cards = utils::innermost(utils::cards(&document, config, &card)?, &card);
        let records = cards
            .into_iter()
            .filter_map(|el| {
                let mut record = extractor.record(&config.id, el, &base)?;
                // whole-card links sit on the wrapping anchor
                if record.url.as_deref() == Some(base.as_str()) {
                    if let Some(link) = el
                        .ancestors()
                        .filter_map(scraper::ElementRef::wrap)
                        .find(|a| a.value().name() == "a")
                        .and_then(|a| utils::first_link(a, &anchor, &base))
                    {
                        record.url = Some(link);
                    }
                }
                Some(record)
            })
            .collect();

        Ok(utils::finish(records, config.max_items))
    }
}

impl Default for Studios886Scraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scraper for Studios886Scraper {
    fn source_metadata(&self) -> SourceMetadata {
        SourceMetadata {
            id: "886studios",
            name: "886 Studios",
            emoji: "🎬",
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
        info!(count = records.len(), "Extracted 886 Studios records");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
        <html><body>
          <div class="resources-grid">
            <a href="/resources/fundraising-playbook">
              <div class="resource-card">
                <h3 class="resource-title">Fundraising Playbook</h3>
                <p class="resource-description">How to prepare a seed round in Taiwan.</p>
              </div>
            </a>
            <div class="resource-card">
              <h4>Cap Table Template</h4>
              <a href="https://docs.886studios.com/cap-table">Download</a>
            </div>
          </div>
        </body></html>"#;

    #[test]
    fn test_parse_nested_resources() {
        let config = SourceConfig::new("886studios", "886 Studios", "https://886studios.com/resources");
        let records = Studios886Scraper::new().parse(FIXTURE, &config).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].title.as_deref(), Some("Fundraising Playbook"));
        assert_eq!(
            records[0].url.as_deref(),
            Some("https://886studios.com/resources/fundraising-playbook")
        );
        assert_eq!(records[0].body_excerpt, "How to prepare a seed round in Taiwan.");
        assert!(records[0].published_at.is_none());

        assert_eq!(records[1].title.as_deref(), Some("Cap Table Template"));
        assert_eq!(records[1].url.as_deref(), Some("https://docs.886studios.com/cap-table"));
    }
}
