pub mod breaker;
pub mod models;
pub mod prompt;
pub mod retry;

pub use breaker::CircuitBreaker;
pub use models::create_model;
pub use retry::{EnrichOutcome, ResilientEnricher, RetryPolicy};

pub mod prelude {
    pub use super::models::create_model;
    pub use super::retry::{EnrichOutcome, ResilientEnricher, RetryPolicy};
    pub use sn_core::{Enrichment, EnrichmentError, EnrichmentModel, EnrichmentRequest};
}
