//! Drives resolvers to a settled state
//!
//! Stands in for the browser's image element: loads the resolver's current
//! candidate, reports the outcome with the attempt's generation, and
//! repeats until the resolver stops asking for loads.

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::loader::{ImageLoader, LoadOutcome};
use crate::render::RenderedImage;
use crate::resolver::{ImageResolver, ResolverContext};
use crate::state::{ImageRequest, Phase};

/// One load the driver performed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptLog {
    pub url: String,
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Final outcome of resolving one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionReport {
    pub original_url: Option<String>,
    pub phase: Phase,
    pub resolved_url: String,
    pub retries: usize,
    /// Seeded from the success cache; no load was needed
    pub cache_hit: bool,
    pub attempts: Vec<AttemptLog>,
    pub rendered: RenderedImage,
}

/// Load candidates until `resolver` is loaded or terminal
///
/// Performs at most one load per fallback plus the original. A resolver
/// seeded from the cache, or holding the placeholder, performs none.
pub async fn resolve(resolver: &mut ImageResolver, loader: &dyn ImageLoader) -> ResolutionReport {
    let cache_hit = resolver.is_cache_hit();
    let max_attempts = resolver.fallback_count() + 1;
    let mut attempts = Vec::new();

    while resolver.phase() == Phase::Loading && attempts.len() < max_attempts {
        let attempt = resolver.attempt();
        let outcome = loader.load(&attempt.url).await;

        let log = match outcome {
            LoadOutcome::Loaded => {
                resolver.on_load(attempt.generation);
                AttemptLog {
                    url: attempt.url,
                    loaded: true,
                    reason: None,
                }
            }
            LoadOutcome::Failed { reason } => {
                resolver.on_error(attempt.generation);
                AttemptLog {
                    url: attempt.url,
                    loaded: false,
                    reason: Some(reason),
                }
            }
        };
        attempts.push(log);
    }

    ResolutionReport {
        original_url: resolver.request().original_url.clone(),
        phase: resolver.phase(),
        resolved_url: resolver.state().current_url.clone(),
        retries: resolver.state().retry_index,
        cache_hit,
        attempts,
        rendered: resolver.render(),
    }
}

/// Create a resolver for `request` and drive it to completion
pub async fn resolve_request(
    request: ImageRequest,
    ctx: &ResolverContext,
    loader: &dyn ImageLoader,
) -> ResolutionReport {
    let mut resolver = ImageResolver::new(request, ctx.clone());
    resolve(&mut resolver, loader).await
}

/// Resolve many requests concurrently, sharing `ctx`'s cache
///
/// Results are returned in request order.
pub async fn resolve_batch(
    requests: Vec<ImageRequest>,
    ctx: &ResolverContext,
    loader: &dyn ImageLoader,
    concurrency: usize,
) -> Vec<ResolutionReport> {
    stream::iter(requests)
        .map(|request| resolve_request(request, ctx, loader))
        .buffered(concurrency.max(1))
        .collect()
        .await
}
