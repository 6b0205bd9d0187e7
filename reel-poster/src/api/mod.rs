//! HTTP API for poster resolution
//!
//! - `GET /health`
//! - `GET /api/poster?src=&alt=&class=` → resolution report (JSON)
//! - `GET /api/poster/html?...` → rendered HTML fragment
//! - `POST /api/posters` → batch resolution
//! - `GET /api/cache` → success cache contents
//! - `GET /events` → SSE stream of resolver events
//!
//! Anything else falls through to the static assets folder when one is
//! configured, so the placeholder path is servable.

use axum::routing::{get, post};
use axum::Router;
use reel_common::events::EventBus;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::cache::MemorySuccessCache;
use crate::loader::ImageLoader;
use crate::resolver::ResolverContext;

pub mod error;
pub mod health;
pub mod poster;
pub mod sse;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub ctx: ResolverContext,
    pub loader: Arc<dyn ImageLoader>,
    /// Same cache as `ctx.cache`, kept concrete for listing
    pub cache: Arc<MemorySuccessCache>,
    pub events: EventBus,
    pub concurrency: usize,
}

impl AppState {
    /// Wire `cache` and `events` into the resolver context
    pub fn new(
        ctx: ResolverContext,
        loader: Arc<dyn ImageLoader>,
        cache: Arc<MemorySuccessCache>,
        events: EventBus,
        concurrency: usize,
    ) -> Self {
        let ctx = ResolverContext {
            cache: cache.clone(),
            events: Some(events.clone()),
            ..ctx
        };
        Self {
            ctx,
            loader,
            cache,
            events,
            concurrency,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState, static_assets: Option<PathBuf>) -> Router {
    let router = Router::new()
        .route("/api/poster", get(poster::resolve_poster))
        .route("/api/poster/html", get(poster::resolve_poster_html))
        .route("/api/posters", post(poster::resolve_posters))
        .route("/api/cache", get(poster::cache_entries))
        .route("/events", get(sse::event_stream))
        .merge(health::health_routes())
        .with_state(state);

    let router = match static_assets {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
