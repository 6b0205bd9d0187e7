//! Image loaders
//!
//! A loader answers one question for the resolver host: does this
//! candidate URL produce an image? Absolute URLs are fetched over HTTP;
//! relative paths are looked up in the static assets folder.

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use reel_common::config::HttpConfig;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Loader construction errors
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Outcome of one load attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Failed { reason: String },
}

impl LoadOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        LoadOutcome::Failed { reason: reason.into() }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded)
    }
}

/// Something that can try to load a candidate image URL
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, url: &str) -> LoadOutcome;
}

/// Loads remote images with reqwest and local paths from disk
pub struct HttpImageLoader {
    http_client: reqwest::Client,
    assets_root: Option<PathBuf>,
}

impl HttpImageLoader {
    pub fn new(config: &HttpConfig, assets_root: Option<PathBuf>) -> Result<Self, LoaderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| LoaderError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            assets_root,
        })
    }

    async fn load_remote(&self, url: &str) -> LoadOutcome {
        let response = match self.http_client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return LoadOutcome::failed(format!("request failed: {}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            return LoadOutcome::failed(format!("HTTP {}", status.as_u16()));
        }

        // Servers that omit Content-Type get the benefit of the doubt
        if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or_default().to_ascii_lowercase();
            if !content_type.starts_with("image/") {
                return LoadOutcome::failed(format!("not an image: {}", content_type));
            }
        }

        LoadOutcome::Loaded
    }

    async fn load_local(&self, url: &str) -> LoadOutcome {
        let Some(root) = &self.assets_root else {
            return LoadOutcome::failed("no static assets folder configured");
        };
        let Some(path) = local_asset_path(root, url) else {
            return LoadOutcome::failed("path escapes static assets folder");
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => LoadOutcome::Loaded,
            Ok(_) => LoadOutcome::failed(format!("not a file: {}", path.display())),
            Err(e) => LoadOutcome::failed(format!("{}: {}", path.display(), e)),
        }
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, url: &str) -> LoadOutcome {
        let outcome = if url.starts_with('/') {
            self.load_local(url).await
        } else {
            self.load_remote(url).await
        };
        debug!(url = %url, outcome = ?outcome, "Image load attempt");
        outcome
    }
}

/// Map a site-relative URL onto the assets folder
///
/// Query and fragment are dropped, the path is percent-decoded, and any
/// parent-directory component rejects the whole path.
pub fn local_asset_path(root: &Path, url: &str) -> Option<PathBuf> {
    let path_part = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(path_part).decode_utf8().ok()?;
    let relative = Path::new(decoded.trim_start_matches('/'));

    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(resolved)
}
