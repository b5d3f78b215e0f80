use axum::{
    routing::{get, post},
    Router,
};
use sn_core::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

pub mod error;
pub mod handlers;
pub mod state;

pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/articles", get(handlers::list_articles))
        .route("/api/articles/:fingerprint", get(handlers::get_article))
        .route("/api/runs", get(handlers::list_runs))
        .route("/api/trigger", post(handlers::trigger))
        .layer(cors)
        .with_state(Arc::new(state))
}

pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "🌍 Listening");
    axum::serve(listener, create_app(state))
        .await
        .map_err(Error::Io)
}

pub mod prelude {
    pub use crate::{create_app, serve, AppState};
    pub use sn_core::{Article, Error, Result};
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use sn_core::config::{EnrichmentConfig, EnrichmentProvider, PipelineConfig, RunConfig};
    use sn_core::{ArticleStorage, RawRecord, RunRecord, RunSummary, SourceConfig, SourceError};
    use sn_inference::models::DummyModel;
    use sn_pipeline::Orchestrator;
    use sn_scrapers::{Scraper, ScraperRegistry, SourceMetadata};
    use sn_storage::InMemoryStorage;
    use tower::ServiceExt;

    struct FixedScraper;

    #[async_trait]
    impl Scraper for FixedScraper {
        fn source_metadata(&self) -> SourceMetadata {
            SourceMetadata {
                id: "fixed",
                name: "Fixed",
                emoji: "🧪",
                region: "test",
            }
        }

        fn default_selector(&self) -> &'static str {
            "article"
        }

        async fn fetch(&self, config: &SourceConfig) -> std::result::Result<Vec<RawRecord>, SourceError> {
            Ok(vec![RawRecord {
                source_id: config.id.clone(),
                url: Some("https://fixed.example/story".to_string()),
                title: Some("Seed round closed".to_string()),
                published_at: None,
                body_excerpt: "A Taipei startup closed its seed round.".to_string(),
            }])
        }
    }

    fn app() -> (Router, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        let config = PipelineConfig {
            sources: vec![SourceConfig::new("fixed", "Fixed", "https://fixed.example/")],
            enrichment: EnrichmentConfig {
                provider: EnrichmentProvider::Dummy,
                ..EnrichmentConfig::default()
            },
            run: RunConfig {
                reconcile_failed: false,
                ..RunConfig::default()
            },
            ..PipelineConfig::default()
        };
        let mut registry = ScraperRegistry::new();
        registry.register(Arc::new(FixedScraper));
        let orchestrator = Orchestrator::new(config, registry, Arc::new(DummyModel::new()), storage.clone());
        (create_app(AppState::new(Arc::new(orchestrator))), storage)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn trigger_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/trigger")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_trigger_runs_pipeline() {
        let (app, storage) = app();

        let response = app
            .clone()
            .oneshot(trigger_request(r#"{"action": "aggregate", "source": "scheduler"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let summary: RunSummary = body_json(response).await;
        assert_eq!(summary.articles_new, 1);
        assert_eq!(storage.len().await, 1);

        let response = app
            .oneshot(Request::builder().uri("/api/runs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let runs: Vec<RunRecord> = body_json(response).await;
        assert_eq!(runs.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_trigger_is_rejected() {
        let (app, storage) = app();
        let response = app.oneshot(trigger_request(r#"{"action": "explode"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert!(storage.is_empty().await);
        assert!(storage.list_runs(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_article_endpoints() {
        let (app, _storage) = app();
        app.clone().oneshot(trigger_request("")).await.unwrap();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/articles?limit=5").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let articles: Vec<sn_core::Article> = body_json(response).await;
        assert_eq!(articles.len(), 1);
        let fingerprint = articles[0].fingerprint.clone();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/articles/{}", fingerprint))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/articles/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/articles?status=enriched")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let enriched: Vec<sn_core::Article> = body_json(response).await;
        assert_eq!(enriched.len(), 1);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/articles?status=bogus")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
