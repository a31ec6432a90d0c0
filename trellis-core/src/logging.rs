//! Logging setup for Trellis applications
//!
//! The router emits structured `tracing` events: route matches at `debug`,
//! pipeline steps at `trace`, response contract violations at `warn` and
//! contained handler failures at `error`. This module installs a subscriber
//! for them. The default is JSON to STDOUT at INFO level.
//!
//! ```no_run
//! use trellis_core::logging::*;
//!
//! let _guard = LogConfig::new()
//!     .level(LogLevel::Debug)
//!     .format(LogFormat::Pretty)
//!     .init()
//!     .expect("logging already initialized");
//!
//! info!("router ready");
//! ```

use crate::Error;
use std::io;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use tracing::{debug, error, info, trace, warn};

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    /// Directive string for `EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Output format for log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured, machine-readable (default)
    Json,
    Plain,
    /// Multi-line, for development
    Pretty,
    Compact,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "plain" => Some(LogFormat::Plain),
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            _ => None,
        }
    }
}

/// Output destination for logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    File(String),
    RollingFile {
        directory: String,
        prefix: String,
        rotation: Rotation,
    },
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl Rotation {
    fn to_tracing_rotation(self) -> tracing_appender::rolling::Rotation {
        match self {
            Rotation::Minutely => tracing_appender::rolling::Rotation::MINUTELY,
            Rotation::Hourly => tracing_appender::rolling::Rotation::HOURLY,
            Rotation::Daily => tracing_appender::rolling::Rotation::DAILY,
            Rotation::Never => tracing_appender::rolling::Rotation::NEVER,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub thread_ids: bool,
    pub targets: bool,
    pub file_line: bool,
    /// Emit an event when each span closes
    pub spans: bool,
    pub colors: bool,
    /// Custom filter directive (overrides `level` and `RUST_LOG`)
    pub env_filter: Option<String>,
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_thread_ids(mut self, enable: bool) -> Self {
        self.thread_ids = enable;
        self
    }

    pub fn with_targets(mut self, enable: bool) -> Self {
        self.targets = enable;
        self
    }

    pub fn with_file_line(mut self, enable: bool) -> Self {
        self.file_line = enable;
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.spans = enable;
        self
    }

    pub fn with_colors(mut self, enable: bool) -> Self {
        self.colors = enable;
        self
    }

    /// Set a filter such as `"trellis_core=debug,my_app=info"`.
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    fn build_filter(&self) -> EnvFilter {
        match &self.env_filter {
            Some(directive) => EnvFilter::try_new(directive)
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str())),
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str())),
        }
    }

    /// Install the global subscriber.
    ///
    /// The returned guard flushes buffered output when dropped; keep it alive
    /// for the lifetime of the program. Fails if the log file or directory
    /// cannot be opened, or a global subscriber is already installed.
    pub fn init(self) -> Result<WorkerGuard, Error> {
        let filter = self.build_filter();

        let (writer, guard) = match &self.output {
            LogOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
            LogOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
            LogOutput::File(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                tracing_appender::non_blocking(file)
            }
            LogOutput::RollingFile {
                directory,
                prefix,
                rotation,
            } => {
                let appender = tracing_appender::rolling::RollingFileAppender::builder()
                    .rotation(rotation.to_tracing_rotation())
                    .filename_prefix(prefix.as_str())
                    .build(directory)
                    .map_err(|e| Error::Internal(format!("log directory {}: {}", directory, e)))?;
                tracing_appender::non_blocking(appender)
            }
        };

        self.install(writer, filter)?;
        Ok(guard)
    }

    fn install<W>(&self, writer: W, filter: EnvFilter) -> Result<(), Error>
    where
        W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
    {
        let span_events = if self.spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let base = fmt::layer()
            .with_writer(writer)
            .with_target(self.targets)
            .with_thread_ids(self.thread_ids)
            .with_span_events(span_events);

        let registry = tracing_subscriber::registry().with(filter);
        let result = match self.format {
            LogFormat::Json => registry
                .with(
                    base.json()
                        .with_file(self.file_line)
                        .with_line_number(self.file_line)
                        .with_current_span(self.spans)
                        .with_span_list(self.spans),
                )
                .try_init(),
            LogFormat::Plain => registry
                .with(
                    base.with_ansi(self.colors)
                        .with_file(self.file_line)
                        .with_line_number(self.file_line),
                )
                .try_init(),
            LogFormat::Pretty => registry
                .with(
                    base.pretty()
                        .with_ansi(self.colors)
                        .with_file(self.file_line)
                        .with_line_number(self.file_line),
                )
                .try_init(),
            LogFormat::Compact => registry
                .with(base.compact().with_ansi(self.colors))
                .try_init(),
        };

        result.map_err(|e| Error::Internal(format!("failed to install logger: {}", e)))
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            output: LogOutput::Stdout,
            thread_ids: false,
            targets: true,
            file_line: false,
            spans: false,
            colors: false,
            env_filter: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Trace.to_tracing_level(), Level::TRACE);
        assert_eq!(LogLevel::Debug.to_tracing_level(), Level::DEBUG);
        assert_eq!(LogLevel::Info.to_tracing_level(), Level::INFO);
        assert_eq!(LogLevel::Warn.to_tracing_level(), Level::WARN);
        assert_eq!(LogLevel::Error.to_tracing_level(), Level::ERROR);
    }

    #[test]
    fn test_parse() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
        assert_eq!(LogFormat::parse("Pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::Stdout);
        assert!(config.targets);
        assert!(config.env_filter.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = LogConfig::new()
            .level(LogLevel::Debug)
            .format(LogFormat::Compact)
            .with_colors(true)
            .with_targets(false)
            .with_env_filter("trellis_core=trace");

        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Compact);
        assert!(config.colors);
        assert!(!config.targets);
        assert_eq!(config.env_filter.as_deref(), Some("trellis_core=trace"));
    }

    #[test]
    fn test_unusable_rolling_directory_fails() {
        let blocker = std::env::temp_dir().join(format!("trellis-log-{}", std::process::id()));
        std::fs::write(&blocker, b"not a directory").unwrap();
        let directory = blocker.join("logs");

        let result = LogConfig::new()
            .output(LogOutput::RollingFile {
                directory: directory.to_string_lossy().into_owned(),
                prefix: "app.log".to_string(),
                rotation: Rotation::Daily,
            })
            .init();
        std::fs::remove_file(&blocker).unwrap();

        assert!(matches!(result, Err(Error::Internal(_))));
    }
}
