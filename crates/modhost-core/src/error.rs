//! Error types for the core crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override carried an unusable value
    #[error("Invalid value for {var}: {value}")]
    InvalidOverride { var: &'static str, value: String },
}

/// Errors raised by a report sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink file or its directory could not be created
    #[error("Failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Appending to the sink failed
    #[error("Failed to write to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The sink refused the write for a reason of its own
    #[error("Sink rejected write: {0}")]
    Rejected(String),
}
