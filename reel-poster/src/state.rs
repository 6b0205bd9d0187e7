//! Resolution state owned by a single ImageResolver

use serde::{Deserialize, Serialize};

use crate::render::DisplayOptions;

/// What the caller asked to display
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    /// Raw poster URL; may be missing, relative, absolute, or garbage
    pub original_url: Option<String>,
    /// Alt text; a generic description is used when absent
    pub alt_text: Option<String>,
    /// Pass-through rendering attributes
    #[serde(default)]
    pub display: DisplayOptions,
}

impl ImageRequest {
    pub fn new(original_url: impl Into<String>) -> Self {
        Self {
            original_url: Some(original_url.into()),
            ..Default::default()
        }
    }

    pub fn with_alt(mut self, alt_text: impl Into<String>) -> Self {
        self.alt_text = Some(alt_text.into());
        self
    }

    pub fn with_display(mut self, display: DisplayOptions) -> Self {
        self.display = display;
        self
    }
}

/// Resolver lifecycle phase
///
/// `FailedRetrying` is transient: a failure that schedules the next
/// fallback reports it, after which the resolver is `Loading` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Loading,
    Loaded,
    FailedRetrying,
    FailedTerminal,
}

impl Phase {
    /// No further load or error signal will change the outcome
    pub fn is_settled(self) -> bool {
        matches!(self, Phase::Loaded | Phase::FailedTerminal)
    }
}

/// Mutable view state for the current candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionState {
    pub current_url: String,
    /// Fallback transforms consumed so far
    pub retry_index: usize,
    pub is_loading: bool,
    pub has_error: bool,
}

/// Tag identifying one candidate attempt
///
/// Strictly increasing per resolver; callbacks carrying an older tag
/// belong to a superseded attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_strictly_increases() {
        let g0 = Generation::default();
        let g1 = g0.next();
        assert!(g1 > g0);
        assert_eq!(g1.value(), 1);
        assert_eq!(g1.to_string(), "g1");
    }

    #[test]
    fn test_phase_serialization() {
        assert_eq!(serde_json::to_string(&Phase::FailedTerminal).unwrap(), "\"failed_terminal\"");
        assert!(Phase::Loaded.is_settled());
        assert!(!Phase::Loading.is_settled());
        assert!(!Phase::FailedRetrying.is_settled());
    }

    #[test]
    fn test_request_deserializes_without_display() {
        let req: ImageRequest =
            serde_json::from_str(r#"{"original_url":"https://example.com/a.jpg","alt_text":null}"#).unwrap();
        assert_eq!(req.original_url.as_deref(), Some("https://example.com/a.jpg"));
        assert_eq!(req.display, DisplayOptions::default());
    }
}
