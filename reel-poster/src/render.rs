//! Rendering contract for a resolved poster
//!
//! Produces a container holding the image, an optional loading indicator
//! and an optional error indicator, as data or as an HTML fragment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::state::{ImageRequest, ResolutionState};

pub const DEFAULT_ALT: &str = "Movie poster";
const LOADING_LABEL: &str = "Loading...";
const ERROR_LABEL: &str = "Image failed to load";

/// Attribute names the resolver owns; pass-through values cannot replace them
const RESERVED_ATTRIBUTES: [&str; 3] = ["src", "alt", "style"];

/// Pass-through rendering attributes supplied by the host page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOptions {
    /// Extra class for the container
    pub class_name: Option<String>,
    /// Additional `<img>` attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Snapshot of what the host should draw
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedImage {
    pub container_class: String,
    pub src: String,
    pub alt: String,
    /// Dimmed while loading or after failure
    pub opacity: f64,
    pub show_loading: bool,
    pub show_error: bool,
    pub attributes: BTreeMap<String, String>,
}

impl RenderedImage {
    pub fn new(request: &ImageRequest, state: &ResolutionState) -> Self {
        let container_class = match request.display.class_name.as_deref().map(str::trim) {
            Some(class) if !class.is_empty() => format!("image-container {}", class),
            _ => "image-container".to_string(),
        };

        let alt = match request.alt_text.as_deref() {
            Some(alt) if !alt.is_empty() => alt.to_string(),
            _ => DEFAULT_ALT.to_string(),
        };

        let attributes = request
            .display
            .attributes
            .iter()
            .filter(|(name, _)| is_passthrough_name(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Self {
            container_class,
            src: state.current_url.clone(),
            alt,
            opacity: if state.is_loading || state.has_error { 0.3 } else { 1.0 },
            show_loading: state.is_loading,
            show_error: state.has_error,
            attributes,
        }
    }

    /// HTML fragment for server-side rendering
    pub fn to_html(&self) -> String {
        let mut html = format!(r#"<div class="{}">"#, escape_html(&self.container_class));

        if self.show_loading {
            html.push_str(&format!(
                r#"<div class="image-loading"><div class="loading-spinner"></div><span>{}</span></div>"#,
                LOADING_LABEL
            ));
        }
        if self.show_error {
            html.push_str(&format!(
                r#"<div class="image-error"><span>{}</span></div>"#,
                ERROR_LABEL
            ));
        }

        html.push_str(&format!(
            r#"<img src="{}" alt="{}" style="opacity: {}; transition: opacity 0.3s ease""#,
            escape_html(&self.src),
            escape_html(&self.alt),
            self.opacity
        ));
        for (name, value) in &self.attributes {
            html.push_str(&format!(r#" {}="{}""#, name, escape_html(value)));
        }
        html.push_str("></div>");
        html
    }
}

fn is_passthrough_name(name: &str) -> bool {
    !name.is_empty()
        && !RESERVED_ATTRIBUTES.contains(&name.to_ascii_lowercase().as_str())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
