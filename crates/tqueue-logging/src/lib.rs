//! Structured logging setup for TQueue
//!
//! The queue crates only emit `tracing` events. Binaries and test harnesses
//! install a subscriber through [`TQueueSubscriberBuilder`]:
//!
//! - **Console**: pretty lines or JSON objects on stderr
//! - **Files**: JSON lines with daily/hourly rotation via tracing-appender,
//!   or a single file truncated on start
//!
//! `RUST_LOG` overrides the configured level.
//!
//! # Quick Start
//!
//! ```ignore
//! use tqueue_logging::{LogConfig, TQueueSubscriberBuilder};
//!
//! let _guard = TQueueSubscriberBuilder::new()
//!     .with_config(LogConfig::verbose().with_log_dir("./logs"))
//!     .init();
//! ```

pub mod config;

pub use config::{ConsoleFormat, FileConfig, LogConfig, RotationStrategy};

use std::fs::{self, File};
use std::io;

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    #[error("Failed to open log output: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to create rolling appender: {0}")]
    Appender(String),

    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(String),
}

/// Builder for configuring and initializing the logging subscriber
pub struct TQueueSubscriberBuilder {
    config: LogConfig,
}

impl TQueueSubscriberBuilder {
    /// Create a builder with [`LogConfig::default`]
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the filter directive used when `RUST_LOG` is unset
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Set the console format
    pub fn with_console(mut self, console: ConsoleFormat) -> Self {
        self.config.console = console;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Initialize the subscriber globally
    ///
    /// Returns the file writer guard, which must be kept alive for as long as
    /// file output is wanted. Failures are reported on stderr and leave
    /// logging as it was.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging: {}", e);
                None
            }
        }
    }

    /// Try to initialize the subscriber globally
    ///
    /// Returns an error if the level does not parse, the log directory
    /// cannot be opened, or a global subscriber has already been set.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let configured = EnvFilter::try_new(&self.config.level)
            .map_err(|e| LoggingError::InvalidLevel(format!("{} ({})", self.config.level, e)))?;
        let env_filter = EnvFilter::try_from_default_env().unwrap_or(configured);

        let (file_layer, guard) = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = create_file_writer(file_config)?;
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(file_config.include_spans)
                    .with_span_list(file_config.include_spans)
                    .with_file(file_config.include_location)
                    .with_line_number(file_config.include_location)
                    .with_writer(writer);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        let pretty_layer = (self.config.console == ConsoleFormat::Pretty).then(|| {
            tracing_subscriber::fmt::layer()
                .with_ansi(self.config.ansi)
                .with_target(true)
                .with_writer(io::stderr)
        });
        let json_layer = (self.config.console == ConsoleFormat::Json).then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_writer(io::stderr)
        });

        Registry::default()
            .with(env_filter)
            .with(pretty_layer)
            .with(json_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
        Ok(guard)
    }
}

impl Default for TQueueSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the non-blocking file writer; `Never` truncates a single file
fn create_file_writer(file_config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&file_config.directory)?;
    let rotation = match file_config.rotation {
        RotationStrategy::Never => {
            let file_path = file_config
                .directory
                .join(format!("{}.log", file_config.prefix));
            let file = File::create(&file_path)?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };
    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(file_config.prefix.as_str())
        .filename_suffix("log")
        .build(&file_config.directory)
        .map_err(|e| LoggingError::Appender(e.to_string()))?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging for testing (warnings only)
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_testing() {
    let _ = TQueueSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
