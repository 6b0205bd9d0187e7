//! Poster URL normalization
//!
//! Turns whatever the collection stored in `poster_url` into either a
//! loadable candidate or the placeholder sentinel.

use thiserror::Error;
use tracing::warn;

/// Why a raw URL could not be used directly
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    /// Missing, empty, or already the placeholder
    #[error("no poster URL supplied")]
    Empty,

    /// Not a local path and not a well-formed absolute URL
    #[error("invalid URL '{url}': {reason}")]
    Invalid { url: String, reason: String },
}

/// Normalize a raw poster URL
///
/// 1. `None`, empty, or equal to `placeholder` → `Err(UrlError::Empty)`
/// 2. Leading `http:` becomes `https:`; nothing else in the string changes
/// 3. A result starting with `/` is a local path and is returned unvalidated
/// 4. Anything else must parse as an absolute URL
pub fn normalize_url(raw: Option<&str>, placeholder: &str) -> Result<String, UrlError> {
    let raw = match raw {
        Some(url) if !url.is_empty() && url != placeholder => url,
        _ => return Err(UrlError::Empty),
    };

    let upgraded = match raw.strip_prefix("http:") {
        Some(rest) => format!("https:{}", rest),
        None => raw.to_string(),
    };

    if upgraded.starts_with('/') {
        return Ok(upgraded);
    }

    match url::Url::parse(&upgraded) {
        Ok(_) => Ok(upgraded),
        Err(e) => Err(UrlError::Invalid {
            url: upgraded,
            reason: e.to_string(),
        }),
    }
}

/// Normalize a raw poster URL, substituting `placeholder` for anything unusable
///
/// Invalid URLs are reported with a warning; this never fails.
pub fn preprocess_url(raw: Option<&str>, placeholder: &str) -> String {
    match normalize_url(raw, placeholder) {
        Ok(url) => url,
        Err(UrlError::Empty) => placeholder.to_string(),
        Err(err @ UrlError::Invalid { .. }) => {
            warn!(error = %err, "Invalid poster URL, using placeholder");
            placeholder.to_string()
        }
    }
}
