use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use sn_core::{Article, EnrichmentStatus, RunRecord, RunSummary, Trigger};
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::AppState;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ArticleQuery {
    pub limit: Option<usize>,
    pub source: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunQuery {
    pub limit: Option<usize>,
}

fn clamp(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArticleQuery>,
) -> Result<Json<Vec<Article>>, ApiError> {
    let limit = clamp(query.limit);
    let articles = match (query.source.as_deref(), query.status.as_deref()) {
        (Some(source), _) => {
            let mut articles = state.storage.get_by_source(source).await?;
            if let Some(status) = query.status.as_deref() {
                let status: EnrichmentStatus = status
                    .parse()
                    .map_err(|_| ApiError::bad_request(format!("unknown status `{}`", status)))?;
                articles.retain(|a| a.enrichment_status == status);
            }
            articles.truncate(limit);
            articles
        }
        (None, Some(status)) => {
            let status: EnrichmentStatus = status
                .parse()
                .map_err(|_| ApiError::bad_request(format!("unknown status `{}`", status)))?;
            state.storage.list_by_status(status, limit).await?
        }
        (None, None) => state.storage.list_recent(limit).await?,
    };
    Ok(Json(articles))
}

pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(fingerprint): Path<String>,
) -> Result<Json<Article>, ApiError> {
    state
        .storage
        .get_article(&fingerprint)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no article with fingerprint {}", fingerprint)))
}

pub async fn list_runs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RunQuery>,
) -> Result<Json<Vec<RunRecord>>, ApiError> {
    Ok(Json(state.storage.list_runs(clamp(query.limit)).await?))
}

/// Runs the pipeline to completion. An empty body means `aggregate`.
pub async fn trigger(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<RunSummary>, ApiError> {
    let trigger = if body.trim().is_empty() {
        Trigger::aggregate()
    } else {
        Trigger::parse(&body)?
    };
    info!(action = ?trigger.action, "📨 Trigger received over HTTP");
    let summary = state.orchestrator.run(&trigger).await?;
    Ok(Json(summary))
}
