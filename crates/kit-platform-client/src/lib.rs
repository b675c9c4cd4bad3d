//! Kit-Platform-Client: platform access for Kit agents
//!
//! Agents reach the Kit platform through the [`PlatformClient`] interface:
//! fetching prepared training sets and staging artifacts produced by earlier
//! runs of a multi-stage plan. [`KitClient`] is the HTTP implementation;
//! [`fakes::MemoryPlatformClient`] serves canned data for tests.
//!
//! Authentication is a static API key; there is no retry policy. Callers that
//! want retries wrap the calls themselves.

mod config;
pub mod download;
mod error;
pub mod events;
pub mod fakes;
mod http;
pub mod local;

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

pub use config::{
    KitClientConfig, ENV_API_ENDPOINT, ENV_API_KEY, ENV_LOCAL_DATA_PATH, ENV_RUN_ID,
};
pub use download::{ArtifactInfo, StagedDownload};
pub use error::PlatformClientError;
pub use events::{ClientEvents, EventStatus, TracingEvents};
pub use http::KitClient;

/// Result type for platform client operations
pub type Result<T> = std::result::Result<T, PlatformClientError>;

/// Request/response facade over the Kit platform.
///
/// Implementations must guarantee that a successful download leaves a
/// complete file at the destination and that a failed one leaves nothing.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Request a prepared training set. `Ok(None)` means the platform has no
    /// data for these parameters.
    async fn get_training_data(&self, params: &Value) -> Result<Option<Value>>;

    /// Fetch a previously produced artifact into `destination`.
    async fn download_artifact(&self, artifact_id: Uuid, destination: &Path) -> Result<StagedDownload>;

    /// List the artifacts a run produced.
    async fn list_artifacts(&self, run_id: Uuid) -> Result<Vec<ArtifactInfo>>;

    /// Stage every artifact of `run_id` into `destination_folder`, stopping at
    /// the first failure.
    async fn download_artifacts_for_run(
        &self,
        run_id: Uuid,
        destination_folder: &Path,
    ) -> Result<Vec<StagedDownload>> {
        let artifacts = self.list_artifacts(run_id).await?;
        if artifacts.is_empty() {
            return Err(PlatformClientError::NoArtifacts(run_id));
        }

        std::fs::create_dir_all(destination_folder)?;
        let mut staged = Vec::with_capacity(artifacts.len());
        for artifact in &artifacts {
            let destination = destination_folder.join(artifact.checked_filename()?);
            staged.push(self.download_artifact(artifact.id, &destination).await?);
        }
        Ok(staged)
    }
}

/// Client crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
