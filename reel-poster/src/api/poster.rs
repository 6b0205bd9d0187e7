//! Poster resolution endpoints

use axum::extract::{Query, State};
use axum::response::Html;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::driver::{resolve_batch, resolve_request, ResolutionReport};
use crate::render::DisplayOptions;
use crate::state::ImageRequest;

/// Largest batch accepted by POST /api/posters
pub const MAX_BATCH: usize = 100;

/// Poster request as sent by a page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PosterQuery {
    pub src: Option<String>,
    pub alt: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
}

impl From<PosterQuery> for ImageRequest {
    fn from(query: PosterQuery) -> Self {
        ImageRequest {
            original_url: query.src,
            alt_text: query.alt,
            display: DisplayOptions {
                class_name: query.class_name,
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub requests: Vec<PosterQuery>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub results: Vec<ResolutionReport>,
}

#[derive(Debug, Serialize)]
pub struct CacheResponse {
    pub count: usize,
    pub entries: Vec<String>,
}

/// GET /api/poster
pub async fn resolve_poster(
    State(state): State<AppState>,
    Query(query): Query<PosterQuery>,
) -> Json<ResolutionReport> {
    debug!(src = ?query.src, "Resolving poster");
    let report = resolve_request(query.into(), &state.ctx, state.loader.as_ref()).await;
    Json(report)
}

/// GET /api/poster/html
pub async fn resolve_poster_html(
    State(state): State<AppState>,
    Query(query): Query<PosterQuery>,
) -> Html<String> {
    let report = resolve_request(query.into(), &state.ctx, state.loader.as_ref()).await;
    Html(report.rendered.to_html())
}

/// POST /api/posters
pub async fn resolve_posters(
    State(state): State<AppState>,
    Json(batch): Json<BatchRequest>,
) -> ApiResult<Json<BatchResponse>> {
    if batch.requests.is_empty() {
        return Err(ApiError::BadRequest("requests must not be empty".to_string()));
    }
    if batch.requests.len() > MAX_BATCH {
        return Err(ApiError::BadRequest(format!(
            "at most {} requests per batch, got {}",
            MAX_BATCH,
            batch.requests.len()
        )));
    }

    let requests = batch.requests.into_iter().map(ImageRequest::from).collect();
    let results = resolve_batch(requests, &state.ctx, state.loader.as_ref(), state.concurrency).await;
    Ok(Json(BatchResponse { results }))
}

/// GET /api/cache
pub async fn cache_entries(State(state): State<AppState>) -> Json<CacheResponse> {
    let entries = state.cache.entries();
    Json(CacheResponse {
        count: entries.len(),
        entries,
    })
}
