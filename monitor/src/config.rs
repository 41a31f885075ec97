//! Configuration module for FolderMirror Monitor.
//!
//! This module handles parsing configuration from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `FOLDERMIRROR_ROOT_DIR` | No | `~/FolderMirror` | Shared root containing the repositories |
//! | `FOLDERMIRROR_METADATA_DIR` | No | `.git` | Version-control metadata directory name |
//! | `FOLDERMIRROR_IGNORE_PREFIXES` | No | (none) | Comma-separated file name prefixes to ignore |
//! | `FOLDERMIRROR_BUFFER_SIZE` | No | 1000 | Raw change event buffer capacity |
//! | `FOLDERMIRROR_LOG_FORMAT` | No | `pretty` | `pretty` or `json` |
//!
//! # Example
//!
//! ```no_run
//! use foldermirror_monitor::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Watching: {}", config.root_dir.display());
//! ```

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use directories::BaseDirs;
use thiserror::Error;

use crate::classifier::{PathClassifier, DEFAULT_METADATA_MARKER};

/// Default raw event buffer capacity.
const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Default shared root directory name relative to home.
const DEFAULT_ROOT_DIR: &str = "FolderMirror";

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'pretty' or 'json', got '{other}'")),
        }
    }
}

/// Configuration for the FolderMirror Monitor.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared root directory; each immediate subfolder is a repository.
    pub root_dir: PathBuf,

    /// Name of the version-control metadata directory.
    pub metadata_dir: String,

    /// File name prefixes whose changes are never reported.
    pub ignore_prefixes: Vec<String>,

    /// Capacity of the raw change event channel.
    pub buffer_size: usize,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - `FOLDERMIRROR_BUFFER_SIZE` is set but is not a positive integer
    /// - `FOLDERMIRROR_METADATA_DIR` is set but empty or contains a separator
    /// - `FOLDERMIRROR_LOG_FORMAT` is neither `pretty` nor `json`
    /// - The home directory cannot be determined and no root is configured
    pub fn from_env() -> Result<Self, ConfigError> {
        // Optional: FOLDERMIRROR_ROOT_DIR (default: ~/FolderMirror)
        let root_dir = match env::var("FOLDERMIRROR_ROOT_DIR") {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => {
                let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
                base_dirs.home_dir().join(DEFAULT_ROOT_DIR)
            }
        };

        // Optional: FOLDERMIRROR_METADATA_DIR (default: .git)
        let metadata_dir = match env::var("FOLDERMIRROR_METADATA_DIR") {
            Ok(val) => {
                let val = val.trim().to_string();
                if val.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        key: "FOLDERMIRROR_METADATA_DIR".to_string(),
                        message: "metadata directory name cannot be empty".to_string(),
                    });
                }
                if val.contains(['/', '\\']) {
                    return Err(ConfigError::InvalidValue {
                        key: "FOLDERMIRROR_METADATA_DIR".to_string(),
                        message: format!("expected a single directory name, got '{val}'"),
                    });
                }
                val
            }
            Err(_) => DEFAULT_METADATA_MARKER.to_string(),
        };

        // Optional: FOLDERMIRROR_IGNORE_PREFIXES (default: none)
        let ignore_prefixes = env::var("FOLDERMIRROR_IGNORE_PREFIXES")
            .map(|val| {
                val.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        // Optional: FOLDERMIRROR_BUFFER_SIZE (default: 1000, must be > 0)
        let buffer_size = match env::var("FOLDERMIRROR_BUFFER_SIZE") {
            Ok(val) => {
                let size = val
                    .parse::<usize>()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "FOLDERMIRROR_BUFFER_SIZE".to_string(),
                        message: format!("expected positive integer, got '{val}'"),
                    })?;
                if size == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "FOLDERMIRROR_BUFFER_SIZE".to_string(),
                        message: "buffer size must be greater than 0".to_string(),
                    });
                }
                size
            }
            Err(_) => DEFAULT_BUFFER_SIZE,
        };

        // Optional: FOLDERMIRROR_LOG_FORMAT (default: pretty)
        let log_format = match env::var("FOLDERMIRROR_LOG_FORMAT") {
            Ok(val) => val
                .parse::<LogFormat>()
                .map_err(|message| ConfigError::InvalidValue {
                    key: "FOLDERMIRROR_LOG_FORMAT".to_string(),
                    message,
                })?,
            Err(_) => LogFormat::default(),
        };

        Ok(Self {
            root_dir,
            metadata_dir,
            ignore_prefixes,
            buffer_size,
            log_format,
        })
    }

    /// Builds the path classifier described by this configuration.
    #[must_use]
    pub fn classifier(&self) -> PathClassifier {
        PathClassifier::new(self.root_dir.clone())
            .with_metadata_marker(self.metadata_dir.clone())
            .with_ignored_prefixes(self.ignore_prefixes.iter().cloned())
    }
}
