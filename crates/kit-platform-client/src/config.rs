//! Client configuration read from the worker environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Base URL of the Kit API.
pub const ENV_API_ENDPOINT: &str = "KIT_API_ENDPOINT";
/// API key sent as `X-API-KEY`.
pub const ENV_API_KEY: &str = "KIT_API_KEY";
/// Run identifier assigned by the worker; absent for local runs.
pub const ENV_RUN_ID: &str = "KIT_RUN_ID";
/// Pre-fetched training set injected by the worker cache.
pub const ENV_LOCAL_DATA_PATH: &str = "KIT_LOCAL_DATA_PATH";

/// Kit client configuration
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct KitClientConfig {
    /// Kit API base URL
    pub api_endpoint: Option<String>,
    /// API key (never printed or serialized)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Run ID when executing under a worker
    pub run_id: Option<String>,
    /// Locally injected training data file
    pub local_data_path: Option<PathBuf>,
}

impl KitClientConfig {
    /// Create config from environment variables. Empty values count as unset.
    pub fn from_env() -> Self {
        KitClientConfig {
            api_endpoint: non_empty_var(ENV_API_ENDPOINT),
            api_key: non_empty_var(ENV_API_KEY),
            run_id: non_empty_var(ENV_RUN_ID),
            local_data_path: non_empty_var(ENV_LOCAL_DATA_PATH).map(PathBuf::from),
        }
    }

    /// Create config for a specific endpoint
    pub fn new(api_endpoint: &str, api_key: &str) -> Self {
        KitClientConfig {
            api_endpoint: Some(api_endpoint.to_string()),
            api_key: Some(api_key.to_string()),
            ..Default::default()
        }
    }

    /// Set the worker run ID
    pub fn with_run_id(mut self, run_id: &str) -> Self {
        self.run_id = Some(run_id.to_string());
        self
    }

    /// Set the locally injected data file
    pub fn with_local_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_data_path = Some(path.into());
        self
    }

    /// API calls are only possible with both an endpoint and a key.
    pub fn is_enabled(&self) -> bool {
        self.api_endpoint.is_some() && self.api_key.is_some()
    }

    /// True when no worker run ID was supplied.
    pub fn is_local_run(&self) -> bool {
        self.run_id.is_none()
    }

    /// Endpoint without trailing slashes, ready for path concatenation.
    pub(crate) fn base_url(&self) -> Option<&str> {
        self.api_endpoint
            .as_deref()
            .map(|endpoint| endpoint.trim_end_matches('/'))
    }
}

impl fmt::Debug for KitClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KitClientConfig")
            .field("api_endpoint", &self.api_endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("run_id", &self.run_id)
            .field("local_data_path", &self.local_data_path)
            .finish()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
