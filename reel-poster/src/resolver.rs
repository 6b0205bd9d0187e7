//! ImageResolver: poster URL resolution state machine
//!
//! A resolver owns one [`ResolutionState`] and reacts to load-success and
//! load-failure signals from its host. Every candidate URL it hands out is
//! tagged with a [`Generation`]; signals carrying an older tag come from a
//! superseded attempt and are discarded.
//!
//! ```text
//!              on_error (retries left)
//!            ┌─────────────────────────┐
//!            ▼                         │
//!   new ──▶ LOADING ──on_load──▶ LOADED │
//!            │                    │    │
//!            │                    └────┘ (cache hint proved wrong)
//!            └──on_error (exhausted)──▶ FAILED_TERMINAL
//! ```

use reel_common::events::{EventBus, ReelEvent};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::SuccessCache;
use crate::fallback::FallbackChain;
use crate::normalize::{normalize_url, UrlError};
use crate::render::RenderedImage;
use crate::state::{Generation, ImageRequest, Phase, ResolutionState};

/// Collaborators shared by every resolver a host creates
#[derive(Clone)]
pub struct ResolverContext {
    pub chain: Arc<FallbackChain>,
    pub cache: Arc<dyn SuccessCache>,
    pub placeholder: String,
    pub events: Option<EventBus>,
}

impl ResolverContext {
    pub fn new(chain: Arc<FallbackChain>, cache: Arc<dyn SuccessCache>) -> Self {
        Self {
            chain,
            cache,
            placeholder: reel_common::config::DEFAULT_PLACEHOLDER.to_string(),
            events: None,
        }
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: ReelEvent) {
        if let Some(bus) = &self.events {
            bus.emit_lossy(event);
        }
    }
}

/// A candidate URL the host should try to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub generation: Generation,
    pub url: String,
}

/// Result of delivering a load or error signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Current candidate loaded
    Loaded { url: String, newly_cached: bool },
    /// Candidate failed; `next` is the fallback to load
    Retrying {
        failed_url: String,
        transform: String,
        next: Attempt,
    },
    /// All fallbacks failed; placeholder shown with error indicator
    Exhausted { retries: usize },
    /// Resolver already terminal; signal has no effect
    Ignored,
    /// Signal belongs to a superseded attempt
    Stale { received: Generation, current: Generation },
}

impl Transition {
    /// Phase this transition reports, `None` when state did not change
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Transition::Loaded { .. } => Some(Phase::Loaded),
            Transition::Retrying { .. } => Some(Phase::FailedRetrying),
            Transition::Exhausted { .. } => Some(Phase::FailedTerminal),
            Transition::Ignored | Transition::Stale { .. } => None,
        }
    }
}

/// Resolves one requested poster URL into a displayable one
pub struct ImageResolver {
    id: Uuid,
    ctx: ResolverContext,
    request: ImageRequest,
    /// Preprocessed original; fallbacks are always applied to this
    normalized: String,
    state: ResolutionState,
    phase: Phase,
    generation: Generation,
    cache_hit: bool,
}

impl ImageResolver {
    pub fn new(request: ImageRequest, ctx: ResolverContext) -> Self {
        let mut resolver = Self {
            id: Uuid::new_v4(),
            normalized: ctx.placeholder.clone(),
            state: ResolutionState {
                current_url: ctx.placeholder.clone(),
                retry_index: 0,
                is_loading: true,
                has_error: false,
            },
            ctx,
            request,
            phase: Phase::Loading,
            generation: Generation::default(),
            cache_hit: false,
        };
        resolver.reset();
        resolver
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &ImageRequest {
        &self.request
    }

    pub fn state(&self) -> &ResolutionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn normalized_url(&self) -> &str {
        &self.normalized
    }

    /// Current state was seeded from the success cache
    pub fn is_cache_hit(&self) -> bool {
        self.cache_hit
    }

    pub fn fallback_count(&self) -> usize {
        self.ctx.chain.len()
    }

    /// Candidate to load now, tagged with the current generation
    pub fn attempt(&self) -> Attempt {
        Attempt {
            generation: self.generation,
            url: self.state.current_url.clone(),
        }
    }

    pub fn render(&self) -> RenderedImage {
        RenderedImage::new(&self.request, &self.state)
    }

    /// Replace the requested URL
    ///
    /// Resets to a fresh resolution only when the URL actually changed.
    /// Returns whether a reset happened.
    pub fn set_source(&mut self, original_url: Option<String>) -> bool {
        if self.request.original_url == original_url {
            return false;
        }
        debug!(
            resolver = %self.id,
            old = ?self.request.original_url,
            new = ?original_url,
            "Poster source changed, resetting"
        );
        self.request.original_url = original_url;
        self.reset();
        true
    }

    /// Current candidate loaded
    pub fn on_load(&mut self, generation: Generation) -> Transition {
        if let Some(stale) = self.check_generation(generation, "load") {
            return stale;
        }
        if self.phase == Phase::FailedTerminal {
            return Transition::Ignored;
        }

        self.state.is_loading = false;
        self.state.has_error = false;
        self.phase = Phase::Loaded;

        let url = self.state.current_url.clone();
        let newly_cached = url != self.ctx.placeholder && self.ctx.cache.insert(&url);

        debug!(
            resolver = %self.id,
            url = %url,
            retry_index = self.state.retry_index,
            newly_cached,
            "Poster loaded"
        );
        self.ctx.emit(ReelEvent::PosterResolved {
            resolver_id: self.id,
            original_url: self.request.original_url.clone(),
            resolved_url: url.clone(),
            retry_index: self.state.retry_index,
            timestamp: chrono::Utc::now(),
        });

        Transition::Loaded { url, newly_cached }
    }

    /// Current candidate failed to load
    pub fn on_error(&mut self, generation: Generation) -> Transition {
        if let Some(stale) = self.check_generation(generation, "error") {
            return stale;
        }
        if self.phase == Phase::FailedTerminal {
            return Transition::Ignored;
        }

        // Relays cannot help when there is no real original to relay
        if self.normalized == self.ctx.placeholder {
            return self.exhaust();
        }

        let Some(transform) = self.ctx.chain.get(self.state.retry_index) else {
            return self.exhaust();
        };
        let transform_name = transform.name().to_string();
        let next_url = transform.apply(&self.normalized);

        let failed_url = std::mem::replace(&mut self.state.current_url, next_url.clone());
        self.state.retry_index += 1;
        self.state.has_error = false;
        self.state.is_loading = true;
        self.phase = Phase::Loading;
        self.cache_hit = false;
        self.generation = self.generation.next();

        info!(
            resolver = %self.id,
            failed = %failed_url,
            retry = self.state.retry_index,
            of = self.ctx.chain.len(),
            transform = %transform_name,
            "Poster load failed, trying fallback"
        );
        self.ctx.emit(ReelEvent::PosterRetrying {
            resolver_id: self.id,
            original_url: self.request.original_url.clone(),
            failed_url: failed_url.clone(),
            next_url: next_url.clone(),
            transform: transform_name.clone(),
            retry_index: self.state.retry_index,
            timestamp: chrono::Utc::now(),
        });

        Transition::Retrying {
            failed_url,
            transform: transform_name,
            next: Attempt {
                generation: self.generation,
                url: next_url,
            },
        }
    }

    fn check_generation(&self, received: Generation, signal: &str) -> Option<Transition> {
        if received == self.generation {
            return None;
        }
        debug!(
            resolver = %self.id,
            signal,
            received = %received,
            current = %self.generation,
            "Discarding stale poster callback"
        );
        Some(Transition::Stale {
            received,
            current: self.generation,
        })
    }

    fn exhaust(&mut self) -> Transition {
        let retries = self.state.retry_index;
        self.state.current_url = self.ctx.placeholder.clone();
        self.state.has_error = true;
        self.state.is_loading = false;
        self.phase = Phase::FailedTerminal;
        self.cache_hit = false;
        self.generation = self.generation.next();

        warn!(
            resolver = %self.id,
            original = ?self.request.original_url,
            retries,
            "All poster fallbacks failed, showing placeholder"
        );
        self.ctx.emit(ReelEvent::PosterExhausted {
            resolver_id: self.id,
            original_url: self.request.original_url.clone(),
            retries,
            timestamp: chrono::Utc::now(),
        });

        Transition::Exhausted { retries }
    }

    fn reset(&mut self) {
        self.generation = self.generation.next();
        self.cache_hit = false;

        let placeholder = self.ctx.placeholder.clone();
        self.normalized = match normalize_url(self.request.original_url.as_deref(), &placeholder) {
            Ok(url) => url,
            Err(UrlError::Empty) => placeholder.clone(),
            Err(err @ UrlError::Invalid { .. }) => {
                warn!(resolver = %self.id, error = %err, "Invalid poster URL, using placeholder");
                self.ctx.emit(ReelEvent::InvalidPosterUrl {
                    raw_url: self.request.original_url.clone().unwrap_or_default(),
                    reason: err.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                placeholder.clone()
            }
        };

        self.state = ResolutionState {
            current_url: self.normalized.clone(),
            retry_index: 0,
            is_loading: true,
            has_error: false,
        };
        self.phase = Phase::Loading;

        if self.normalized == placeholder {
            self.state.is_loading = false;
            self.phase = Phase::Loaded;
        } else if self.ctx.cache.contains(&self.normalized) {
            self.state.is_loading = false;
            self.phase = Phase::Loaded;
            self.cache_hit = true;
            debug!(resolver = %self.id, url = %self.normalized, "Poster known good, skipping spinner");
            self.ctx.emit(ReelEvent::PosterCacheHit {
                resolver_id: self.id,
                url: self.normalized.clone(),
                timestamp: chrono::Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemorySuccessCache;
    use crate::fallback::FallbackTransform;

    const PLACEHOLDER: &str = "/default-poster.svg";

    fn context(cache: Arc<MemorySuccessCache>) -> ResolverContext {
        ResolverContext::new(Arc::new(FallbackChain::default_proxies()), cache)
    }

    fn resolver(url: &str) -> (ImageResolver, Arc<MemorySuccessCache>) {
        let cache = Arc::new(MemorySuccessCache::new());
        (ImageResolver::new(ImageRequest::new(url), context(cache.clone())), cache)
    }

    #[test]
    fn test_initial_state_loading() {
        let (r, _) = resolver("http://example.com/a.jpg");
        assert_eq!(r.phase(), Phase::Loading);
        assert_eq!(r.state().current_url, "https://example.com/a.jpg");
        assert_eq!(r.state().retry_index, 0);
        assert!(r.state().is_loading);
        assert!(!r.state().has_error);
    }

    #[test]
    fn test_empty_url_immediately_loaded_placeholder() {
        let (mut r, cache) = resolver("");
        assert_eq!(r.phase(), Phase::Loaded);
        assert_eq!(r.state().current_url, PLACEHOLDER);
        assert!(!r.state().is_loading);

        // placeholder load never populates the cache
        let gen = r.generation();
        assert_eq!(
            r.on_load(gen),
            Transition::Loaded { url: PLACEHOLDER.to_string(), newly_cached: false }
        );
        assert!(cache.is_empty());
        assert_eq!(r.state().retry_index, 0);
    }

    #[test]
    fn test_invalid_url_uses_placeholder_and_emits_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let ctx = context(Arc::new(MemorySuccessCache::new())).with_events(bus);
        let r = ImageResolver::new(ImageRequest::new("not a url"), ctx);

        assert_eq!(r.state().current_url, PLACEHOLDER);
        assert_eq!(r.phase(), Phase::Loaded);
        assert_eq!(rx.try_recv().unwrap().event_type(), "InvalidPosterUrl");
    }

    #[test]
    fn test_second_attempt_succeeds_via_first_transform() {
        let (mut r, cache) = resolver("http://example.com/a.jpg");

        let first = r.attempt();
        let transition = r.on_error(first.generation);
        assert_eq!(transition.phase(), Some(Phase::FailedRetrying));
        assert_eq!(r.phase(), Phase::Loading);

        let expected = FallbackChain::default_proxies()
            .get(0)
            .unwrap()
            .apply("https://example.com/a.jpg");
        assert_eq!(r.state().current_url, expected);
        assert_eq!(r.state().retry_index, 1);

        let second = r.attempt();
        assert!(second.generation > first.generation);
        assert_eq!(
            r.on_load(second.generation),
            Transition::Loaded { url: expected.clone(), newly_cached: true }
        );
        assert_eq!(r.phase(), Phase::Loaded);
        assert!(!r.state().is_loading);
        assert!(!r.state().has_error);
        assert!(cache.contains(&expected));
    }

    #[test]
    fn test_all_transforms_fail_reaches_terminal_in_order() {
        let (mut r, cache) = resolver("http://example.com/a.jpg");
        let expected = FallbackChain::default_proxies().candidates("https://example.com/a.jpg");

        let mut tried = Vec::new();
        for _ in 0..expected.len() {
            let attempt = r.attempt();
            match r.on_error(attempt.generation) {
                Transition::Retrying { next, .. } => tried.push(next.url),
                other => panic!("expected retry, got {:?}", other),
            }
        }
        assert_eq!(tried, expected);
        assert_eq!(r.state().retry_index, expected.len());

        let last = r.attempt();
        assert_eq!(r.on_error(last.generation), Transition::Exhausted { retries: 4 });
        assert_eq!(r.phase(), Phase::FailedTerminal);
        assert_eq!(r.state().current_url, PLACEHOLDER);
        assert!(r.state().has_error);
        assert!(!r.state().is_loading);
        assert!(r.render().show_error);
        assert!(cache.is_empty());

        // terminal: the placeholder loading does not clear the error
        let gen = r.generation();
        assert_eq!(r.on_load(gen), Transition::Ignored);
        assert!(r.state().has_error);
        assert_eq!(r.on_error(gen), Transition::Ignored);
    }

    #[test]
    fn test_stale_callbacks_discarded() {
        let (mut r, _) = resolver("https://example.com/a.jpg");
        let first = r.attempt();
        r.on_error(first.generation);
        let snapshot = r.state().clone();

        // late success for the superseded candidate
        assert!(matches!(r.on_load(first.generation), Transition::Stale { .. }));
        assert!(matches!(r.on_error(first.generation), Transition::Stale { .. }));
        assert_eq!(r.state(), &snapshot);
        assert_eq!(r.phase(), Phase::Loading);
    }

    #[test]
    fn test_set_source_resets_and_invalidates_old_generation() {
        let (mut r, _) = resolver("https://example.com/a.jpg");
        let old = r.attempt();
        r.on_error(old.generation);

        assert!(!r.set_source(Some("https://example.com/a.jpg".to_string())));
        assert_eq!(r.state().retry_index, 1);

        assert!(r.set_source(Some("http://example.com/b.jpg".to_string())));
        assert_eq!(r.state().current_url, "https://example.com/b.jpg");
        assert_eq!(r.state().retry_index, 0);
        assert_eq!(r.phase(), Phase::Loading);
        assert!(matches!(r.on_load(old.generation), Transition::Stale { .. }));
    }

    #[test]
    fn test_set_source_leaves_terminal_state() {
        let chain = Arc::new(FallbackChain::new(vec![]));
        let ctx = ResolverContext::new(chain, Arc::new(MemorySuccessCache::new()));
        let mut r = ImageResolver::new(ImageRequest::new("https://example.com/a.jpg"), ctx);

        let gen = r.generation();
        assert_eq!(r.on_error(gen), Transition::Exhausted { retries: 0 });
        assert!(r.set_source(Some("https://example.com/c.jpg".to_string())));
        assert_eq!(r.phase(), Phase::Loading);
        assert!(!r.state().has_error);
    }

    #[test]
    fn test_cache_hit_skips_spinner() {
        let cache = Arc::new(MemorySuccessCache::new());
        let mut first = ImageResolver::new(ImageRequest::new("https://example.com/a.jpg"), context(cache.clone()));
        let gen = first.generation();
        first.on_load(gen);

        let second = ImageResolver::new(ImageRequest::new("http://example.com/a.jpg"), context(cache));
        assert!(second.is_cache_hit());
        assert_eq!(second.phase(), Phase::Loaded);
        assert!(!second.state().is_loading);
        assert_eq!(second.render().opacity, 1.0);
    }

    #[test]
    fn test_cache_hint_wrong_still_retries() {
        let cache = Arc::new(MemorySuccessCache::new());
        cache.insert("https://example.com/a.jpg");
        let mut r = ImageResolver::new(ImageRequest::new("https://example.com/a.jpg"), context(cache));
        assert!(r.is_cache_hit());

        let gen = r.generation();
        assert!(matches!(r.on_error(gen), Transition::Retrying { .. }));
        assert!(!r.is_cache_hit());
        assert!(r.state().is_loading);
    }

    #[test]
    fn test_placeholder_failure_is_terminal_without_retries() {
        let (mut r, _) = resolver("");
        let gen = r.generation();
        assert_eq!(r.on_error(gen), Transition::Exhausted { retries: 0 });
        assert_eq!(r.phase(), Phase::FailedTerminal);
    }

    #[test]
    fn test_duplicate_candidates_still_attempted() {
        let chain = Arc::new(FallbackChain::new(vec![
            FallbackTransform::new("same-a", "https://relay.example/{url}"),
            FallbackTransform::new("same-b", "https://relay.example/{url}"),
        ]));
        let ctx = ResolverContext::new(chain, Arc::new(MemorySuccessCache::new()));
        let mut r = ImageResolver::new(ImageRequest::new("https://example.com/a.jpg"), ctx);

        let g = r.generation();
        r.on_error(g);
        let g = r.generation();
        let t = r.on_error(g);
        match t {
            Transition::Retrying { failed_url, next, transform } => {
                assert_eq!(failed_url, next.url);
                assert_eq!(transform, "same-b");
            }
            other => panic!("expected retry, got {:?}", other),
        }
    }

    #[test]
    fn test_relative_path_fallbacks_use_path() {
        let (mut r, _) = resolver("/posters/heat.jpg");
        assert_eq!(r.phase(), Phase::Loading);
        let g = r.generation();
        r.on_error(g);
        assert_eq!(r.state().current_url, "https://corsproxy.io/?%2Fposters%2Fheat.jpg");
    }
}
