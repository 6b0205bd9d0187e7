//! # reelshelf Common Library
//!
//! Shared code for reelshelf modules including:
//! - Error types
//! - Configuration loading (TOML bootstrap with graceful degradation)
//! - Event types (ReelEvent enum) and the broadcast EventBus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
