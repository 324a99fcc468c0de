//! # Tabula Configuration
//!
//! File-based configuration for the Tabula resolver.
//!
//! Every section has defaults, so an empty file is a valid configuration.
//! YAML, JSON and TOML are accepted; the format follows the file extension.
//!
//! ```yaml
//! store:
//!   url: "sqlite://${TABULA_DATA}/records.db"
//!   table_name: coredns_records
//!   max_open_connections: 10
//! resolver:
//!   default_ttl: 360
//!   zone_refresh_secs: 60
//! logging:
//!   level: info
//!   format: json
//! ```
//!
//! The core crates never parse configuration: [`StoreSection::to_store_config`]
//! and [`ResolverSection::to_resolver_config`] hand them resolved values.

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod resolver;
pub mod store;

pub use resolver::ResolverSection;
pub use store::StoreSection;

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading the file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The YAML document is malformed.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The JSON document is malformed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The TOML document is malformed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range or inconsistent with another.
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The configuration file does not exist.
    #[error("File not found: {0}")]
    NotFound(PathBuf),
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Records table connection.
    pub store: StoreSection,

    /// Resolution behaviour.
    pub resolver: ResolverSection,

    /// Logging.
    pub logging: LoggingSection,
}

impl Config {
    /// Loads configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => Self::from_yaml(&content)?,
        };

        Ok(config)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.resolver.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Serializes to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Minimum level: trace, debug, info, warn or error.
    pub level: String,

    /// Output format: text or json.
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl LoggingSection {
    fn validate(&self) -> Result<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::invalid(
                "logging.level",
                format!("expected one of {}", LEVELS.join(", ")),
            ));
        }
        if !matches!(self.format.to_ascii_lowercase().as_str(), "text" | "json") {
            return Err(ConfigError::invalid("logging.format", "expected text or json"));
        }
        Ok(())
    }
}

/// Expands `$VAR` and `${VAR}` references using `lookup`.
///
/// Unknown variables expand to the empty string. A `$` not followed by a
/// variable name is kept.
pub fn expand_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                out.push_str(&lookup(&braced[..end]).unwrap_or_default());
                rest = &braced[end + 1..];
                continue;
            }
        }

        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        if len == 0 {
            out.push('$');
        } else {
            out.push_str(&lookup(&after[..len]).unwrap_or_default());
        }
        rest = &after[len..];
    }

    out.push_str(rest);
    out
}

/// Expands `$VAR` and `${VAR}` from the process environment.
pub fn expand_env(input: &str) -> String {
    expand_vars(input, |name| std::env::var(name).ok())
}
