pub mod http;
pub mod scrapers;

pub use scrapers::{get_scraper_factories, Scraper, ScraperFactory, ScraperRegistry, SourceMetadata};

pub mod prelude {
    pub use super::scrapers::Scraper;
    pub use sn_core::{RawRecord, SourceConfig, SourceError};
}
