//! Tracing and logging setup.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self as tfmt, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

/// Errors from parsing logging options.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogSetupError {
    /// The level is not one of trace, debug, info, warn, error.
    #[error("unknown log level: {0}")]
    UnknownLevel(String),

    /// The format is neither text nor json.
    #[error("unknown log format: {0}")]
    UnknownFormat(String),
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level.
    pub level: Level,

    /// Log format ("text" or "json").
    pub format: LogFormat,

    /// Include span events.
    pub span_events: bool,
}

impl LogConfig {
    /// Builds a config from the textual level and format used in config files.
    pub fn parse(level: &str, format: &str) -> Result<Self, LogSetupError> {
        let level = Level::from_str(level.trim())
            .map_err(|_| LogSetupError::UnknownLevel(level.to_string()))?;
        Ok(Self {
            level,
            format: format.parse()?,
            span_events: false,
        })
    }
}

/// Log format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text format.
    Text,

    /// JSON format.
    Json,
}

impl FromStr for LogFormat {
    type Err = LogSetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(LogSetupError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Text,
            span_events: false,
        }
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` directives override the configured level. Fails if a
/// subscriber is already installed.
pub fn init_tracing(config: &LogConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::builder()
        .with_default_directive(config.level.into())
        .from_env_lossy();

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(
                tfmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .with_span_events(span_events),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tfmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr)
                    .with_span_events(span_events),
            )
            .try_init(),
    }
}
