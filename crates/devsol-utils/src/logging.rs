//! # Logging Utilities
//!
//! Logging for devsol using `tracing`.
//!
//! Console output goes to stderr so that command output on stdout stays
//! machine-readable. An optional log file receives the same events without
//! ANSI colours.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use devsol_utils::init_logging;
//!
//! // Keep the guard alive for as long as events should reach the log file.
//! let _guard = init_logging().expect("Failed to initialize logging");
//!
//! tracing::info!("loader started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Level filter (e.g., `RUST_LOG=debug`, `RUST_LOG=devsol_core=trace`)
//! - `DEVSOL_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `DEVSOL_LOG_FILE`: Optional log file path. A directory gets a dated
//!   `YYYY-MM-DD-devsol.log` inside it.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "DEVSOL_LOG_FORMAT";
/// Environment variable naming the log file.
pub const LOG_FILE_ENV: &str = "DEVSOL_LOG_FILE";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Human-readable lines (default)
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel
{
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoggingConfig
{
    /// Explicit level; overrides `RUST_LOG` when set.
    pub level: Option<LogLevel>,
    pub format: LogFormat,
    /// Log file, in addition to the console.
    pub file: Option<PathBuf>,
}

impl LoggingConfig
{
    /// Read `DEVSOL_LOG_FORMAT` and `DEVSOL_LOG_FILE`.
    ///
    /// An unknown format falls back to pretty output.
    #[must_use]
    pub fn from_env() -> Self
    {
        let format = env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();
        let file = env::var_os(LOG_FILE_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        Self {
            level: None,
            format,
            file,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self
    {
        self.level = Some(level);
        self
    }

    /// The filter the subscriber will use.
    ///
    /// Priority: explicit level, then `RUST_LOG`, then `info`.
    #[must_use]
    pub fn filter(&self) -> EnvFilter
    {
        if let Some(level) = self.level {
            return EnvFilter::new(Level::from(level).to_string());
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()))
    }
}

/// Keeps the background log-file writer running.
///
/// Dropping it flushes and stops file logging; hold it until exit.
#[derive(Debug)]
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard
{
    _file: Option<WorkerGuard>,
}

/// Initialize logging from the environment.
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed or the log
/// file cannot be created.
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    init_logging_with_config(&LoggingConfig::from_env())
}

/// Initialize logging with an explicit level (e.g. from `--log-level`).
///
/// Format and file still come from the environment.
///
/// ```rust,no_run
/// use devsol_utils::{init_logging_with_level, LogLevel};
///
/// let _guard = init_logging_with_level(LogLevel::Debug).expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// As for [`init_logging`].
pub fn init_logging_with_level(level: LogLevel) -> Result<LoggingGuard, LoggingError>
{
    init_logging_with_config(&LoggingConfig::from_env().with_level(level))
}

/// Initialize logging from a resolved [`LoggingConfig`].
///
/// ## Errors
///
/// As for [`init_logging`].
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError>
{
    let filter = config.filter();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console = fmt::layer()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(io::stderr);
    match config.format {
        LogFormat::Pretty => layers.push(console.with_ansi(true).with_filter(filter.clone()).boxed()),
        LogFormat::Json => layers.push(
            console
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_filter(filter.clone())
                .boxed(),
        ),
    }

    let mut guard = None;
    if let Some(path) = &config.file {
        let path = resolve_log_file(path);
        let directory = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(directory)?;
        let file_name = path.file_name().unwrap_or_default();

        // The date is already part of directory-derived names; never roll.
        let appender = tracing_appender::rolling::never(directory, file_name);
        let (writer, worker) = tracing_appender::non_blocking(appender);
        guard = Some(worker);

        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(false);
        match config.format {
            LogFormat::Pretty => layers.push(file_layer.with_filter(filter).boxed()),
            LogFormat::Json => layers.push(file_layer.json().with_filter(filter).boxed()),
        }
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

/// Turn a configured log path into a file path.
///
/// Existing directories get a dated file name inside them.
#[must_use]
pub fn resolve_log_file(path: &Path) -> PathBuf
{
    if path.is_dir() {
        let today = Utc::now().format("%Y-%m-%d");
        path.join(format!("{today}-devsol.log"))
    } else {
        path.to_path_buf()
    }
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// A subscriber is already installed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
