//! Harness error taxonomy.
//!
//! `ConfigError` and `SinkError` are raised by the building blocks; the
//! entrypoint folds everything into `HarnessError`, whose `Display` is the
//! diagnostic printed before a non-zero exit.

use std::path::PathBuf;

use kit_platform_client::PlatformClientError;

use crate::lifecycle::LifecycleState;

/// Errors resolving the run configuration or the output directory.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config file {}: {error}", .path.display())]
    Read {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("config file {} is not valid JSON: {error}", .path.display())]
    Parse {
        path: PathBuf,
        error: serde_json::Error,
    },

    #[error("config must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("config key {key:?} has an unexpected value: {error}")]
    InvalidValue {
        key: String,
        error: serde_json::Error,
    },

    #[error("output path must not be empty")]
    EmptyOutputPath,

    #[error("output path {} exists and is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to create output directory {}: {error}", .path.display())]
    CreateDir {
        path: PathBuf,
        error: std::io::Error,
    },
}

/// Errors writing to the metrics sink or artifact files.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("invalid metric name {0:?}: must be non-empty and free of commas and newlines")]
    InvalidName(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything that can end a run unsuccessfully.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("platform client error: {0}")]
    Client(#[from] PlatformClientError),

    #[error("agent failed: {0:#}")]
    AgentFailure(anyhow::Error),

    #[error("invalid lifecycle transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("log stream broken: standard output was closed during the run")]
    LogStreamBroken,

    #[error("failed to start runtime: {0}")]
    Runtime(std::io::Error),
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
