//! reel-poster library - poster URL resolution for reelshelf
//!
//! Movie posters come from whatever URL the collection stored. The
//! [`ImageResolver`] turns that into something displayable: it normalizes
//! the URL, retries through an ordered chain of proxy fallbacks when loads
//! fail, and settles on a placeholder when every fallback is exhausted.
//! URLs that loaded once are remembered in a [`SuccessCache`] so later
//! resolutions skip the loading state.

use reel_common::config::TomlConfig;
use reel_common::events::EventBus;
use std::sync::Arc;

pub mod api;
pub mod cache;
pub mod driver;
pub mod fallback;
pub mod loader;
pub mod normalize;
pub mod render;
pub mod resolver;
pub mod state;

pub use cache::{process_cache, MemorySuccessCache, SuccessCache};
pub use driver::{resolve, resolve_batch, resolve_request, ResolutionReport};
pub use fallback::{FallbackChain, FallbackTransform};
pub use loader::{HttpImageLoader, ImageLoader, LoadOutcome};
pub use normalize::{normalize_url, preprocess_url, UrlError};
pub use render::{DisplayOptions, RenderedImage};
pub use resolver::{Attempt, ImageResolver, ResolverContext, Transition};
pub use state::{Generation, ImageRequest, Phase, ResolutionState};

/// Resolver context described by `config`, sharing `cache` and `events`
pub fn context_from_config(
    config: &TomlConfig,
    cache: Arc<dyn SuccessCache>,
    events: Option<EventBus>,
) -> ResolverContext {
    let chain = FallbackChain::from_config(config.proxies.as_deref());
    let ctx = ResolverContext::new(Arc::new(chain), cache).with_placeholder(config.placeholder_path.clone());
    match events {
        Some(bus) => ctx.with_events(bus),
        None => ctx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_common::config::ProxyConfig;

    #[test]
    fn test_context_from_config() {
        let config = TomlConfig {
            placeholder_path: "/img/none.svg".to_string(),
            proxies: Some(vec![ProxyConfig {
                name: "only".to_string(),
                template: "https://relay.example/{url}".to_string(),
            }]),
            ..Default::default()
        };

        let ctx = context_from_config(&config, Arc::new(MemorySuccessCache::new()), None);
        assert_eq!(ctx.placeholder, "/img/none.svg");
        assert_eq!(ctx.chain.len(), 1);
        assert!(ctx.events.is_none());

        let resolver = ImageResolver::new(ImageRequest::default(), ctx);
        assert_eq!(resolver.state().current_url, "/img/none.svg");
    }

    #[test]
    fn test_example_config_parses() {
        let config = TomlConfig::from_toml_str(include_str!("../config.example.toml")).unwrap();
        assert!(config.proxies.is_none());
        assert_eq!(FallbackChain::from_config(config.proxies.as_deref()), FallbackChain::default());
    }
}
