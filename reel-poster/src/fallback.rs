//! Ordered proxy fallbacks
//!
//! Each transform is a URL template applied to the normalized original
//! poster URL. The chain is plain data so the retry policy can be replaced
//! from configuration and tested without a resolver.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reel_common::config::ProxyConfig;

/// Characters escaped by JavaScript's `encodeURIComponent`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const URL_TOKEN: &str = "{url}";
const URL_ENCODED_TOKEN: &str = "{url_encoded}";

/// Encode a whole URL so it can ride inside another URL's query string
pub fn encode_uri_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}

/// One relay that may be able to fetch an image the browser could not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackTransform {
    name: String,
    template: String,
}

impl FallbackTransform {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Produce the candidate URL for `original`
    ///
    /// Tokens are substituted in a single left-to-right pass, so braces
    /// inside the original URL are never re-expanded.
    pub fn apply(&self, original: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + original.len() * 3);
        let mut rest = self.template.as_str();

        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix(URL_ENCODED_TOKEN) {
                out.push_str(&encode_uri_component(original));
                rest = after;
            } else if let Some(after) = tail.strip_prefix(URL_TOKEN) {
                out.push_str(original);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

impl From<&ProxyConfig> for FallbackTransform {
    fn from(config: &ProxyConfig) -> Self {
        FallbackTransform::new(config.name.clone(), config.template.clone())
    }
}

/// Fixed, ordered list of fallback transforms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackChain {
    transforms: Vec<FallbackTransform>,
}

impl FallbackChain {
    pub fn new(transforms: Vec<FallbackTransform>) -> Self {
        Self { transforms }
    }

    /// Public CORS relays, tried in this order
    pub fn default_proxies() -> Self {
        Self::new(vec![
            FallbackTransform::new("corsproxy", "https://corsproxy.io/?{url_encoded}"),
            FallbackTransform::new("allorigins", "https://api.allorigins.win/raw?url={url_encoded}"),
            FallbackTransform::new("cors-anywhere", "https://cors-anywhere.herokuapp.com/{url}"),
            FallbackTransform::new("cors-sh", "https://proxy.cors.sh/{url}"),
        ])
    }

    /// Chain from configuration, or the default proxies when none are configured
    pub fn from_config(proxies: Option<&[ProxyConfig]>) -> Self {
        match proxies {
            Some(list) => Self::new(list.iter().map(FallbackTransform::from).collect()),
            None => Self::default_proxies(),
        }
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FallbackTransform> {
        self.transforms.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FallbackTransform> {
        self.transforms.iter()
    }

    /// Every candidate the chain would produce for `original`, in retry order
    pub fn candidates(&self, original: &str) -> Vec<String> {
        self.transforms.iter().map(|t| t.apply(original)).collect()
    }
}

impl Default for FallbackChain {
    fn default() -> Self {
        Self::default_proxies()
    }
}
