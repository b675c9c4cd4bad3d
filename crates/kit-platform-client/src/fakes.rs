//! In-memory fake of the platform (testing only)
//!
//! `MemoryPlatformClient` satisfies the [`PlatformClient`] contract without
//! any network access: datasets and artifact bytes are registered up front
//! and every training-data request is recorded for later assertions.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::download::{write_atomically, ArtifactInfo, StagedDownload};
use crate::error::PlatformClientError;
use crate::{PlatformClient, Result};

/// In-memory platform backed by `HashMap`s.
#[derive(Debug, Default)]
pub struct MemoryPlatformClient {
    training_data: Mutex<Option<Value>>,
    artifacts: Mutex<HashMap<Uuid, Vec<u8>>>,
    runs: Mutex<HashMap<Uuid, Vec<ArtifactInfo>>>,
    requests: Mutex<Vec<Value>>,
}

impl MemoryPlatformClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dataset returned by every `get_training_data` call.
    pub fn with_training_data(self, data: Value) -> Self {
        *self.training_data.lock().unwrap() = Some(data);
        self
    }

    /// Register a standalone artifact.
    pub fn with_artifact(self, artifact_id: Uuid, data: &[u8]) -> Self {
        self.artifacts.lock().unwrap().insert(artifact_id, data.to_vec());
        self
    }

    /// Register an artifact as output of `run_id`; returns the new artifact ID.
    pub fn add_run_artifact(&self, run_id: Uuid, filename: &str, data: &[u8]) -> Uuid {
        let artifact_id = Uuid::new_v4();
        self.artifacts.lock().unwrap().insert(artifact_id, data.to_vec());
        self.runs
            .lock()
            .unwrap()
            .entry(run_id)
            .or_default()
            .push(ArtifactInfo::new(artifact_id, filename));
        artifact_id
    }

    /// Parameters of every training-data request, in call order.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformClient for MemoryPlatformClient {
    async fn get_training_data(&self, params: &Value) -> Result<Option<Value>> {
        self.requests.lock().unwrap().push(params.clone());
        Ok(self.training_data.lock().unwrap().clone())
    }

    async fn download_artifact(&self, artifact_id: Uuid, destination: &Path) -> Result<StagedDownload> {
        let data = self
            .artifacts
            .lock()
            .unwrap()
            .get(&artifact_id)
            .cloned()
            .ok_or(PlatformClientError::ArtifactNotFound(artifact_id))?;
        write_atomically(artifact_id, destination, &data)
    }

    async fn list_artifacts(&self, run_id: Uuid) -> Result<Vec<ArtifactInfo>> {
        Ok(self
            .runs
            .lock()
            .unwrap()
            .get(&run_id)
            .cloned()
            .unwrap_or_default())
    }
}
