use async_trait::async_trait;
use sn_core::{RawRecord, SourceConfig, SourceError};
use std::collections::HashMap;
use std::sync::Arc;

pub mod appworks;
pub mod global500;
pub mod jsonld;
pub mod sparklabs;
pub mod startup101;
pub mod studios886;

use appworks::AppWorksScraper;
use global500::Global500Scraper;
use sparklabs::SparkLabsScraper;
use startup101::Startup101Scraper;
use studios886::Studios886Scraper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMetadata {
    /// Registry key, matched against `SourceConfig::id`
    pub id: &'static str,
    pub name: &'static str,
    pub emoji: &'static str,
    pub region: &'static str,
}

#[async_trait]
pub trait Scraper: Send + Sync {
    fn source_metadata(&self) -> SourceMetadata;

    /// Card selector used when the source config does not override it
    fn default_selector(&self) -> &'static str;

    /// Fetches the listing page and extracts at most `config.max_items` records.
    async fn fetch(&self, config: &SourceConfig) -> Result<Vec<RawRecord>, SourceError>;
}

pub type ScraperFactory = Box<dyn Fn() -> Arc<dyn Scraper> + Send + Sync>;

pub fn get_scraper_factories() -> Vec<ScraperFactory> {
    vec![
        Box::new(|| Arc::new(SparkLabsScraper::new())),
        Box::new(|| Arc::new(Startup101Scraper::new())),
        Box::new(|| Arc::new(Studios886Scraper::new())),
        Box::new(|| Arc::new(Global500Scraper::new())),
        Box::new(|| Arc::new(AppWorksScraper::new())),
    ]
}

/// Adapters by id. Adding a source means registering one more adapter here.
#[derive(Clone, Default)]
pub struct ScraperRegistry {
    scrapers: HashMap<String, Arc<dyn Scraper>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for factory in get_scraper_factories() {
            registry.register(factory());
        }
        registry
    }

    pub fn register(&mut self, scraper: Arc<dyn Scraper>) {
        self.scrapers
            .insert(scraper.source_metadata().id.to_string(), scraper);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Scraper>> {
        self.scrapers.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.scrapers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn metadata(&self) -> Vec<SourceMetadata> {
        let mut all: Vec<SourceMetadata> = self.scrapers.values().map(|s| s.source_metadata()).collect();
        all.sort_by_key(|m| (m.region, m.name));
        all
    }
}

/// Common utilities for scrapers
pub(crate) mod utils {
    use chrono::{DateTime, NaiveDate, Utc};
    use scraper::{ElementRef, Html, Selector};
    use sn_core::{RawRecord, SourceConfig, SourceError};
    use std::collections::HashSet;
    use url::Url;

    pub const TITLE_SELECTOR: &str = "h1, h2, h3, .title";
    pub const EXCERPT_SELECTOR: &str = "p, .content, .description";
    pub const LINK_SELECTOR: &str = "a[href]";

    pub fn selector(source_id: &str, selector: &str) -> Result<Selector, SourceError> {
        Selector::parse(selector)
            .map_err(|e| SourceError::parse(source_id, format!("Invalid selector {:?}: {}", selector, e)))
    }

    pub fn listing_url(config: &SourceConfig) -> Result<Url, SourceError> {
        Url::parse(&config.url).map_err(|e| SourceError::parse(&config.id, format!("Invalid listing URL: {}", e)))
    }

    pub fn card_selector<'a>(config: &'a SourceConfig, default: &'a str) -> &'a str {
        config.selector.as_deref().unwrap_or(default)
    }

    /// Every element matching the card selector. A listing where nothing
    /// matches means the markup changed, which is reported as a parse error.
    pub fn cards<'a>(document: &'a Html, config: &SourceConfig, card: &Selector) -> Result<Vec<ElementRef<'a>>, SourceError> {
        let found: Vec<ElementRef<'a>> = document.select(card).collect();
        if found.is_empty() {
            return Err(SourceError::parse(&config.id, "No article elements matched the card selector"));
        }
        Ok(found)
    }

    /// Drops cards that contain another matching card, keeping the innermost ones.
    pub fn innermost<'a>(cards: Vec<ElementRef<'a>>, card: &Selector) -> Vec<ElementRef<'a>> {
        cards
            .into_iter()
            .filter(|el| el.select(card).next().is_none())
            .collect()
    }

    pub fn text_of(element: ElementRef<'_>) -> String {
        element
            .text()
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
        element
            .select(selector)
            .map(text_of)
            .find(|t| !t.is_empty())
    }

    /// Resolves the first link in the card, or the card itself when it is an anchor.
    pub fn first_link(element: ElementRef<'_>, links: &Selector, base: &Url) -> Option<String> {
        let href = if element.value().name() == "a" {
            element.value().attr("href")
        } else {
            element.select(links).find_map(|a| a.value().attr("href"))
        }?;
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return None;
        }
        base.join(href).ok().map(|u| u.to_string())
    }

    pub fn time_attr(element: ElementRef<'_>, selector: &Selector) -> Option<DateTime<Utc>> {
        element
            .select(selector)
            .filter_map(|t| t.value().attr("datetime").or_else(|| t.value().attr("content")))
            .find_map(parse_datetime)
    }

    /// Accepts RFC 3339 and the plain date layouts the sources print.
    pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
            return Some(dt.with_timezone(&Utc));
        }
        const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"];
        DATE_FORMATS.iter().find_map(|format| {
            NaiveDate::parse_from_str(raw, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
    }

    /// Caps and de-duplicates records; nested matches often yield the same entry twice.
    pub fn finish(records: Vec<RawRecord>, max_items: usize) -> Vec<RawRecord> {
        let mut seen = HashSet::new();
        records
            .into_iter()
            .filter(|r| seen.insert((r.url.clone(), r.title.clone())))
            .take(max_items)
            .collect()
    }

    /// The extraction every source starts from: title, excerpt and link per card.
    pub struct CardExtractor {
        pub title: Selector,
        pub excerpt: Selector,
        pub link: Selector,
    }

    impl CardExtractor {
        pub fn new(source_id: &str, title: &str, excerpt: &str) -> Result<Self, SourceError> {
            Ok(Self {
                title: selector(source_id, title)?,
                excerpt: selector(source_id, excerpt)?,
                link: selector(source_id, LINK_SELECTOR)?,
            })
        }

        pub fn standard(source_id: &str) -> Result<Self, SourceError> {
            Self::new(source_id, TITLE_SELECTOR, EXCERPT_SELECTOR)
        }

        /// `None` when the card has no title; the link falls back to the listing page.
        pub fn record(&self, source_id: &str, card: ElementRef<'_>, base: &Url) -> Option<RawRecord> {
            let title = first_text(card, &self.title)?;
            let url = first_link(card, &self.link, base).unwrap_or_else(|| base.to_string());
            Some(RawRecord {
                source_id: source_id.to_string(),
                url: Some(url),
                title: Some(title),
                published_at: None,
                body_excerpt: first_text(card, &self.excerpt).unwrap_or_default(),
            })
        }
    }
}
