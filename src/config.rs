//! Configuration file parser for `spooky-feed.toml`.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings, since they are
//! usually typos.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::feed::ExtractionStrategy;
use crate::util::{validate_url, UrlValidationError};

/// Upstream show feed used when no `primary_feed_url` is configured.
pub const DEFAULT_PRIMARY_FEED_URL: &str = "https://0666sbs.podcaster.de/spooky-bitch-show.rss";

/// Crossover items must mention this show name in their title.
pub const DEFAULT_CROSSOVER_MARKER: &str = "spooky bitch show";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid value for `{key}`: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: UrlValidationError,
    },

    #[error("Invalid value for `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
///
/// There is no default crossover feed: `secondary_feed_url` is `None` unless
/// configured, and until it is set no crossover episodes are merged.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The show's own RSS feed.
    pub primary_feed_url: String,

    /// Shared feed that carries crossover episodes. Disabled when unset.
    pub secondary_feed_url: Option<String>,

    /// Public site root used to build `<base>/episode/<slug>` links.
    pub base_url: Option<String>,

    /// Case-insensitive phrase a crossover item's title must contain.
    pub crossover_marker: String,

    /// Which extractor reads feed XML.
    pub extraction: ExtractionStrategy,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_feed_url: DEFAULT_PRIMARY_FEED_URL.to_string(),
            secondary_feed_url: None,
            base_url: None,
            crossover_marker: DEFAULT_CROSSOVER_MARKER.to_string(),
            extraction: ExtractionStrategy::default(),
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "primary_feed_url",
        "secondary_feed_url",
        "base_url",
        "crossover_marker",
        "extraction",
        "request_timeout_secs",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    ///
    /// Values are not checked here; call [`Config::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            primary = %config.primary_feed_url,
            extraction = %config.extraction,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parses configuration from TOML text. Blank text yields the defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        Ok(toml::from_str(content)?)
    }

    /// Checks every configured URL and the timeout.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidUrl`] names the offending key;
    /// [`ConfigError::InvalidValue`] is returned for a zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("primary_feed_url", &self.primary_feed_url)?;
        if let Some(url) = &self.secondary_feed_url {
            check_url("secondary_feed_url", url)?;
        }
        if let Some(url) = &self.base_url {
            check_url("base_url", url)?;
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn check_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    validate_url(value)
        .map(|_| ())
        .map_err(|source| ConfigError::InvalidUrl { key, source })
}

// ============================================================================
// Tests
// ============================================================================
