pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod storage;
pub mod types;

pub use config::{PipelineConfig, SourceConfig};
pub use error::{EnrichmentError, Error, NormalizationError, SourceError};
pub use models::EnrichmentModel;
pub use storage::ArticleStorage;
pub use types::*;

pub type Result<T> = std::result::Result<T, Error>;
