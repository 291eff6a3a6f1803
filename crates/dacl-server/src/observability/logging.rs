//! Structured logging configuration.
//!
//! When JSON formatting is enabled, log entries are output as JSON objects:
//!
//! ```json
//! {"timestamp":"2026-01-15T10:30:00.000Z","level":"INFO","target":"dacl_server::sync","fields":{"message":"directory synchronization completed","users_upserted":42}}
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use dacl_server::observability::{init_logging, LoggingConfig};
//!
//! init_logging(LoggingConfig::from_settings(&config.logging));
//! ```

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::config::LoggingSettings;

/// Crates whose events follow the configured level. Everything else is
/// held at WARN unless `RUST_LOG` says otherwise.
const OWN_TARGETS: [&str; 3] = ["dacl_server", "dacl_domain", "dacl_storage"];

/// Configuration for structured logging.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// JSON lines (true) or pretty text (false)
    pub json_format: bool,
    /// Level for the dacl crates when RUST_LOG is not set
    pub default_level: Level,
    /// Emit span enter/exit events
    pub include_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json_format: false,
            default_level: Level::INFO,
            include_spans: false,
        }
    }
}

impl LoggingConfig {
    /// Builds the logging config from loaded settings.
    ///
    /// An unrecognized level falls back to INFO.
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self {
            json_format: settings.json,
            default_level: Level::from_str(settings.level.trim()).unwrap_or(Level::INFO),
            include_spans: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json_format = json;
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Include span events, useful to follow a sync run pass by pass.
    pub fn with_spans(mut self) -> Self {
        self.include_spans = true;
        self
    }

    /// Filter directives used when RUST_LOG is not set.
    pub fn filter_directives(&self) -> String {
        let level = self.default_level.to_string().to_lowercase();
        let mut directives = vec!["warn".to_string()];
        directives.extend(OWN_TARGETS.iter().map(|target| format!("{target}={level}")));
        directives.join(",")
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_spans {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        }
    }
}

/// Installs the global subscriber.
///
/// Call once at startup; later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let installed = if config.json_format {
        let layer = fmt::layer()
            .json()
            .with_span_events(config.span_events())
            .with_current_span(true)
            .with_target(true);
        tracing::subscriber::set_global_default(tracing_subscriber::registry().with(filter).with(layer))
    } else {
        let layer = fmt::layer()
            .pretty()
            .with_span_events(config.span_events())
            .with_target(true);
        tracing::subscriber::set_global_default(tracing_subscriber::registry().with(filter).with(layer))
    };

    if installed.is_err() {
        tracing::debug!("global subscriber already installed");
    }
}

/// A JSON subscriber writing to `writer`, for capturing log output in tests.
pub fn create_json_layer<W>(writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(EnvFilter::new("trace"))
        .with(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_current_span(true),
        )
}
