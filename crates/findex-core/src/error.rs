//! Error types for loading and saving settings.
//!
//! We keep errors simple and actionable. Each variant tells you
//! which file was involved and what went wrong with it.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience type for settings operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Things that can go wrong with the settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Couldn't read or write the settings file.
    #[error("failed to access settings file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but isn't valid settings JSON.
    #[error("malformed settings file '{path}': {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A configured search root could not be made absolute.
    #[error("invalid search path '{path}': {source}")]
    InvalidRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No search roots were configured and the home directory
    /// could not be determined.
    #[error("no search paths configured and no home directory available")]
    NoHomeDirectory,
}

impl ConfigError {
    /// Creates an IO error with the path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
