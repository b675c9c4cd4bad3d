//! HTTP client for the Kit API
//!
//! Implements [`PlatformClient`] against the platform's REST endpoints.
//! Without an endpoint and API key the client is constructed in a disabled
//! state: every call reports [`PlatformClientError::NotConfigured`] instead of
//! failing at construction, so agents still run locally.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::KitClientConfig;
use crate::download::{ArtifactInfo, AtomicDownload, StagedDownload};
use crate::error::PlatformClientError;
use crate::events::{self, ClientEvents, EventStatus, TracingEvents};
use crate::{local, PlatformClient, Result};

const API_KEY_HEADER: &str = "X-API-KEY";
const LIST_TIMEOUT: Duration = Duration::from_secs(10);
const TRAINING_DATA_TIMEOUT: Duration = Duration::from_secs(300);

/// Kit API client
pub struct KitClient {
    config: KitClientConfig,
    http_client: reqwest::Client,
    events: Arc<dyn ClientEvents>,
}

impl KitClient {
    /// Create a new Kit client
    pub fn new(config: KitClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("kit-agent-sdk/", env!("CARGO_PKG_VERSION")))
            .build()?;

        if !config.is_enabled() {
            warn!(
                "Kit client is missing KIT_API_ENDPOINT or KIT_API_KEY; API calls are disabled"
            );
        } else if config.is_local_run() {
            info!("Kit client initialized for local run (no KIT_RUN_ID detected)");
        }

        Ok(KitClient {
            config,
            http_client,
            events: Arc::new(TracingEvents),
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(KitClientConfig::from_env())
    }

    /// Route events and diagnostics to `events` instead of tracing.
    pub fn with_events(mut self, events: Arc<dyn ClientEvents>) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &KitClientConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.config.base_url()?, self.config.api_key.as_deref()?))
    }

    /// Prefer the worker-injected dataset; a broken file falls back to the API.
    fn injected_training_data(&self) -> Option<Value> {
        let path = self.config.local_data_path.as_deref()?;
        if !path.exists() {
            return None;
        }

        self.events
            .message(&format!("Using locally injected data from {}", path.display()));
        match local::load_local_data(path) {
            Ok(data) => {
                local::inspect_dataset("local", &data);
                Some(data)
            }
            Err(e) => {
                self.events.message(&format!(
                    "Failed to load local data file: {e}. Falling back to API."
                ));
                None
            }
        }
    }

    async fn fetch_training_data(&self, base: &str, key: &str, params: &Value) -> Result<Option<Value>> {
        let url = format!("{base}/api/data/training_set");
        debug!(%url, "requesting training set");

        let response = self
            .http_client
            .post(&url)
            .header(API_KEY_HEADER, key)
            .json(params)
            .timeout(TRAINING_DATA_TIMEOUT)
            .send()
            .await?;
        let response = check_status(response).await?;

        let data: Value = response.json().await?;
        Ok(if data.is_null() { None } else { Some(data) })
    }

    async fn fetch_artifact(
        &self,
        base: &str,
        key: &str,
        artifact_id: Uuid,
        destination: &Path,
    ) -> Result<StagedDownload> {
        let url = format!("{base}/api/artifacts/{artifact_id}/download");
        debug!(%url, destination = %destination.display(), "downloading artifact");

        let response = self
            .http_client
            .get(&url)
            .header(API_KEY_HEADER, key)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PlatformClientError::ArtifactNotFound(artifact_id));
        }
        let mut response = check_status(response).await?;

        // Dropping `download` on any error below removes the temp file.
        let mut download = AtomicDownload::create(destination)?;
        while let Some(chunk) = response.chunk().await? {
            download.write_chunk(&chunk)?;
        }
        download.commit(artifact_id)
    }

    async fn fetch_artifact_list(&self, base: &str, key: &str, run_id: Uuid) -> Result<Vec<ArtifactInfo>> {
        let url = format!("{base}/api/runs/{run_id}/artifacts/list");

        let response = self
            .http_client
            .post(&url)
            .header(API_KEY_HEADER, key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(LIST_TIMEOUT)
            .send()
            .await?;
        let response = check_status(response).await?;

        Ok(response.json().await?)
    }
}

#[async_trait]
impl PlatformClient for KitClient {
    async fn get_training_data(&self, params: &Value) -> Result<Option<Value>> {
        if let Some(data) = self.injected_training_data() {
            return Ok(Some(data));
        }

        let Some((base, key)) = self.credentials() else {
            self.events.message(
                "Cannot get training data: Kit client is not enabled. \
                 Check KIT_API_ENDPOINT and KIT_API_KEY.",
            );
            return Err(PlatformClientError::NotConfigured);
        };

        self.events
            .event(events::TRAINING_DATA_REQUESTED, EventStatus::Info);
        match self.fetch_training_data(base, key, params).await {
            Ok(data) => {
                self.events
                    .event(events::TRAINING_DATA_RECEIVED, EventStatus::Success);
                if let Some(data) = &data {
                    local::inspect_dataset("api", data);
                }
                Ok(data)
            }
            Err(e) => {
                self.events
                    .message(&format!("Failed to get training data: {e}"));
                self.events
                    .event(events::TRAINING_DATA_FAILED, EventStatus::Failure);
                Err(e)
            }
        }
    }

    async fn download_artifact(&self, artifact_id: Uuid, destination: &Path) -> Result<StagedDownload> {
        let Some((base, key)) = self.credentials() else {
            self.events.message(
                "Cannot download artifact: Kit client is not enabled. \
                 Check KIT_API_ENDPOINT and KIT_API_KEY.",
            );
            return Err(PlatformClientError::NotConfigured);
        };

        self.events
            .event(events::ARTIFACT_DOWNLOAD_STARTED, EventStatus::Info);
        match self.fetch_artifact(base, key, artifact_id, destination).await {
            Ok(staged) => {
                self.events
                    .event(events::ARTIFACT_DOWNLOAD_COMPLETED, EventStatus::Success);
                Ok(staged)
            }
            Err(e) => {
                let msg = if e.is_local_io() {
                    format!("Failed to write artifact to disk: {e}")
                } else {
                    format!("Failed to download artifact: {e}")
                };
                self.events.message(&msg);
                self.events
                    .event(events::ARTIFACT_DOWNLOAD_FAILED, EventStatus::Failure);
                Err(e)
            }
        }
    }

    async fn list_artifacts(&self, run_id: Uuid) -> Result<Vec<ArtifactInfo>> {
        let Some((base, key)) = self.credentials() else {
            return Err(PlatformClientError::NotConfigured);
        };

        self.fetch_artifact_list(base, key, run_id)
            .await
            .map_err(|e| {
                self.events
                    .message(&format!("Failed to list artifacts for run {run_id}: {e}"));
                e
            })
    }
}

/// Turn a non-2xx response into [`PlatformClientError::Status`], preferring
/// the API's `detail` field over the raw body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| match v.get("detail") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        })
        .unwrap_or(body);

    Err(PlatformClientError::Status {
        status: status.as_u16(),
        detail,
    })
}
