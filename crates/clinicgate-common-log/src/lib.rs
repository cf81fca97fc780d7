//! Logging bootstrap for clinicgate binaries.
//!
//! Everything in the workspace logs through `tracing`; this crate only decides
//! where those events go and in which shape. Call [`init`] once at startup with
//! a [`LogConfig`] built from the environment ([`LogConfig::from_env`]) or from
//! the server configuration file ([`LogConfig::from_settings`]).

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

const ENV_PREFIX: &str = "CLINICGATE_LOG";

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
    /// Mirror events into this file as well as stderr.
    pub file_path: Option<PathBuf>,
    /// Include source file and line.
    pub source_location: bool,
    /// Emit span open/close events.
    pub span_events: bool,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-field human readable output.
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            file_path: None,
            source_location: false,
            span_events: false,
        }
    }
}

impl LogConfig {
    /// Create config from `CLINICGATE_LOG_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply every `CLINICGATE_LOG_*` variable that is set, field by field.
    ///
    /// `RUST_LOG` is honoured as a level fallback when it holds a bare level.
    /// Unset variables keep the current value.
    pub fn with_env_overrides(mut self) -> Self {
        let level = std::env::var(format!("{ENV_PREFIX}_LEVEL"))
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok()
            .and_then(|v| LogLevel::parse(&v));
        if let Some(level) = level {
            self.level = level;
        }

        if let Some(format) = std::env::var(format!("{ENV_PREFIX}_FORMAT"))
            .ok()
            .and_then(|v| LogFormat::parse(&v))
        {
            self.format = format;
        }

        if let Ok(file_path) = std::env::var(format!("{ENV_PREFIX}_FILE")) {
            self.file_path = Some(PathBuf::from(file_path));
        }

        if let Some(source) = env_flag(&format!("{ENV_PREFIX}_SOURCE")) {
            self.source_location = source;
        }
        if let Some(spans) = env_flag(&format!("{ENV_PREFIX}_SPANS")) {
            self.span_events = spans;
        }

        self
    }

    /// Create config from the `[logging]` section of a server config file.
    ///
    /// Unknown values fall back to the defaults; server config validation
    /// rejects them before this is reached.
    pub fn from_settings(level: &str, format: &str) -> Self {
        Self {
            level: LogLevel::parse(level).unwrap_or_default(),
            format: LogFormat::parse(format).unwrap_or_default(),
            ..Self::default()
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn stderr_layer(config: &LogConfig) -> BoxedLayer {
    match config.format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .with_file(config.source_location)
            .with_line_number(config.source_location)
            .with_span_events(config.span_events())
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .with_span_events(config.span_events())
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_span_events(config.span_events())
            .boxed(),
    }
}

fn file_layer(config: &LogConfig, file: std::fs::File) -> BoxedLayer {
    let writer = Mutex::new(file);
    match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_span_events(config.span_events())
            .boxed(),
        LogFormat::Pretty | LogFormat::Compact => fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_file(config.source_location)
            .with_line_number(config.source_location)
            .with_span_events(config.span_events())
            .boxed(),
    }
}

/// Initialize the global subscriber.
///
/// A directive set in `RUST_LOG` (e.g. `clinicgate_server=debug,tower_http=info`)
/// takes precedence over the configured level.
pub fn init(config: LogConfig) -> Result<(), LogError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_directive()));

    let mut layers = vec![stderr_layer(&config)];
    if let Some(path) = &config.file_path {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        layers.push(file_layer(&config, file));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| LogError::InitError(e.to_string()))
}

/// Logging errors.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("failed to initialize logging: {0}")]
    InitError(String),

    #[error("failed to open log file: {0}")]
    FileError(#[from] io::Error),
}

pub use tracing::{debug, error, info, trace, warn};
