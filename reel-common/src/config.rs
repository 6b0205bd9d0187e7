//! Configuration loading and config file resolution
//!
//! Bootstrap configuration lives in a single TOML file. Every field has a
//! compiled default, so a missing file never prevents startup.
//!
//! # Config File Priority
//!
//! 1. Command-line argument (highest priority)
//! 2. `REELSHELF_CONFIG` environment variable
//! 3. Platform config dir (`~/.config/reelshelf/config.toml` on Linux)
//! 4. Compiled defaults (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "REELSHELF_CONFIG";

/// Local asset substituted whenever no poster candidate is resolvable
pub const DEFAULT_PLACEHOLDER: &str = "/default-poster.svg";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP server port
    pub port: u16,

    /// Placeholder sentinel path
    pub placeholder_path: String,

    /// Folder serving relative paths (including the placeholder)
    pub static_assets_path: Option<PathBuf>,

    /// Maximum posters resolved concurrently in a batch
    pub concurrency: usize,

    /// EventBus channel capacity
    pub event_bus_capacity: usize,

    /// Outbound image fetch settings
    pub http: HttpConfig,

    /// Ordered proxy fallbacks; `None` keeps the built-in chain
    pub proxies: Option<Vec<ProxyConfig>>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: 5730,
            placeholder_path: DEFAULT_PLACEHOLDER.to_string(),
            static_assets_path: None,
            concurrency: 4,
            event_bus_capacity: 1000,
            http: HttpConfig::default(),
            proxies: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Outbound HTTP settings used when probing image URLs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// User-Agent header sent with every probe
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            user_agent: format!("reelshelf/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// One proxy fallback entry
///
/// `template` must contain `{url}` (raw) or `{url_encoded}` (component-encoded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub name: String,
    pub template: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject values no resolver can work with
    pub fn validate(&self) -> Result<()> {
        if self.placeholder_path.trim().is_empty() {
            return Err(Error::Config("placeholder_path must not be empty".to_string()));
        }
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        if self.event_bus_capacity == 0 {
            return Err(Error::Config("event_bus_capacity must be at least 1".to_string()));
        }
        if let Some(proxies) = &self.proxies {
            for proxy in proxies {
                if !proxy.template.contains("{url}") && !proxy.template.contains("{url_encoded}") {
                    return Err(Error::Config(format!(
                        "proxy '{}' template has no {{url}} or {{url_encoded}} placeholder",
                        proxy.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Resolves which config file to read, then loads it
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Candidate config path following priority order, if any tier yields one
    pub fn config_path(&self) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Platform config dir
        default_config_path()
    }

    /// Load configuration, degrading to defaults when no file exists
    ///
    /// A file that exists but fails to parse or validate is an error.
    pub fn load(&self) -> Result<TomlConfig> {
        let Some(path) = self.config_path() else {
            warn!("No config directory available, using compiled defaults");
            return Ok(TomlConfig::default());
        };

        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using compiled defaults");
            return Ok(TomlConfig::default());
        }

        let config = TomlConfig::from_file(&path)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}

/// Platform config file location (`<config_dir>/reelshelf/config.toml`)
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("reelshelf").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.port, 5730);
        assert_eq!(config.placeholder_path, DEFAULT_PLACEHOLDER);
        assert_eq!(config.logging.level, "info");
        assert!(config.proxies.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = TomlConfig::from_toml_str("port = 6000\n[http]\ntimeout_ms = 500\n").unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.http.timeout_ms, 500);
        assert!(config.http.user_agent.starts_with("reelshelf/"));
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = TomlConfig::from_toml_str("concurrency = 0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_proxy_template_without_placeholder_rejected() {
        let toml = r#"
            [[proxies]]
            name = "broken"
            template = "https://proxy.example/"
        "#;
        let err = TomlConfig::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = TomlConfig::from_toml_str("port = \"not a number\"").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }
}
