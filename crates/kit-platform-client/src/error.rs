//! Error types for kit-platform-client

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while talking to the Kit platform
#[derive(Error, Debug)]
pub enum PlatformClientError {
    /// Endpoint or API key missing from the environment
    #[error("Kit client is not configured: set KIT_API_ENDPOINT and KIT_API_KEY")]
    NotConfigured,

    /// Transport-level failure (connect, timeout, TLS, body decode)
    #[error("HTTP error: {0}")]
    Http(String),

    /// The platform answered with a non-success status
    #[error("Kit API returned {status}: {detail}")]
    Status { status: u16, detail: String },

    /// Artifact unknown to the platform
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(Uuid),

    /// A run listed no artifacts to stage
    #[error("No artifacts found for run {0}")]
    NoArtifacts(Uuid),

    /// Listed filename would escape the destination folder
    #[error("Invalid artifact filename: {0:?}")]
    InvalidFilename(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for PlatformClientError {
    fn from(err: reqwest::Error) -> Self {
        PlatformClientError::Http(err.to_string())
    }
}

impl PlatformClientError {
    /// Whether the failure happened while writing to local disk rather than on the wire.
    pub fn is_local_io(&self) -> bool {
        matches!(self, PlatformClientError::Io(_))
    }
}
