use crate::enrichment::EnrichmentPipeline;
use crate::errors::AppError;
use crate::models::{CanonicalRecord, SearchResponse};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Provider cascade shared by every request.
    pub pipeline: Arc<EnrichmentPipeline>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "cnpj-finder",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/cnpj/:cnpj
///
/// Resolves a CNPJ (formatted or bare digits) into the merged company record.
pub async fn get_cnpj(
    State(state): State<Arc<AppState>>,
    Path(cnpj): Path<String>,
) -> Result<Json<CanonicalRecord>, AppError> {
    tracing::info!("GET /api/cnpj/{}", cnpj);
    let record = state.pipeline.resolve(&cnpj).await?;
    Ok(Json(record))
}

/// GET /api/search?q=
///
/// A missing `q` is treated like an empty query and rejected as too short.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = params.q.unwrap_or_default();
    tracing::info!("GET /api/search - q: {:?}", query);
    let response = state.pipeline.search_by_name(&query).await?;
    Ok(Json(response))
}

/// Lookup routes. Rate limiting is layered on by the caller; `/health` is
/// mounted separately so it bypasses it.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/cnpj/:cnpj", get(get_cnpj))
        .route("/api/search", get(search))
}
