//! Logging configuration
//!
//! A [`LogConfig`] is built from the command line of the queue tools or
//! read from a JSON file. Every field has a default, so partial documents
//! are accepted.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// What the subscriber writes and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or
    /// `tqueue_storage=debug,info`
    pub level: String,

    /// Format of stderr output
    pub console: ConsoleFormat,

    /// Use ANSI colors on the console
    pub ansi: bool,

    /// JSON-lines log files, off when `None`
    pub file: Option<FileConfig>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: ConsoleFormat::Pretty,
            ansi: true,
            file: None,
        }
    }
}

impl LogConfig {
    /// Debug level, per-record engine and binlog events included
    pub fn verbose() -> Self {
        Self {
            level: "debug".to_string(),
            ..Default::default()
        }
    }

    /// Warnings only, uncolored, for test binaries
    pub fn testing() -> Self {
        Self {
            level: "warn".to_string(),
            ansi: false,
            ..Default::default()
        }
    }

    /// Replace the filter directive
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Replace the console format
    pub fn with_console(mut self, console: ConsoleFormat) -> Self {
        self.console = console;
        self
    }

    /// Also write JSON lines into daily files under `dir`
    pub fn with_log_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.file = Some(FileConfig::new(dir));
        self
    }
}

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
    /// No console output
    Off,
}

/// JSON-lines file output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// File name prefix; files are named `<prefix>.<date>.log`
    pub prefix: String,
    pub rotation: RotationStrategy,
    /// Record the enclosing spans of every event (e.g. the binlog path of
    /// `Binlog::init`)
    pub include_spans: bool,
    /// Record source file and line
    pub include_location: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "tqueue".to_string(),
            rotation: RotationStrategy::Daily,
            include_spans: true,
            include_location: false,
        }
    }
}

impl FileConfig {
    /// Daily files under `directory`
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            ..Default::default()
        }
    }
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// A single `<prefix>.log`, truncated on start
    Never,
}
