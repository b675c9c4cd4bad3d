//! Run configuration and output directory resolution.
//!
//! The configuration schema is declared per agent in its `manifest.json`, so
//! the harness keeps it as a loosely typed JSON object. Accessors return
//! `Option` (or a caller default) instead of failing on missing keys.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ConfigError;

/// Name of the append-only metrics file inside the output directory.
pub const METRICS_FILE: &str = "metrics.log";

/// Immutable run configuration: a JSON object loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunConfig(Map<String, Value>);

impl RunConfig {
    /// Load a configuration file. The top-level value must be an object.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    error,
                }
            }
        })?;

        let value: Value = serde_json::from_str(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })?;

        let config = Self::from_value(value)?;
        debug!(path = %path.display(), keys = config.len(), "run config loaded");
        Ok(config)
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(map) => Ok(RunConfig(map)),
            other => Err(ConfigError::NotAnObject {
                found: json_type_name(&other),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    /// Any JSON number, integer or float.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// A string value parsed as a UUID (artifact and run identifiers).
    pub fn get_uuid(&self, key: &str) -> Option<Uuid> {
        self.get_str(key).and_then(|s| Uuid::parse_str(s.trim()).ok())
    }

    /// Strict typed access: `Ok(None)` when missing, an error when present but
    /// not convertible to `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|error| ConfigError::InvalidValue {
                    key: key.to_string(),
                    error,
                }),
        }
    }

    /// Lenient typed access: falls back to `default` when the key is missing
    /// or holds a value of the wrong shape.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.get_as(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                warn!(key, error = %e, "ignoring config value, using default");
                default
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The whole config as a JSON value, e.g. to forward as request params.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for RunConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: Value = serde_json::from_str(s).map_err(|error| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            error,
        })?;
        Self::from_value(value)
    }
}

/// Load a run configuration from `path`.
pub fn load(path: &Path) -> Result<RunConfig, ConfigError> {
    RunConfig::load(path)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Directory owned by one run; holds artifacts, `metrics.log` and staged
/// downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirectory {
    path: PathBuf,
}

impl OutputDirectory {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.path.join(METRICS_FILE)
    }

    /// Create (if needed) and return a sub-directory for staged inputs.
    pub fn stage_dir(&self, name: &str) -> std::io::Result<PathBuf> {
        let dir = self.path.join(name);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Create the output directory and its parents. Idempotent.
pub fn ensure_output_dir(path: &Path) -> Result<OutputDirectory, ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::EmptyOutputPath);
    }

    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(ConfigError::NotADirectory(path.to_path_buf())),
        Err(_) => {
            fs::create_dir_all(path).map_err(|error| ConfigError::CreateDir {
                path: path.to_path_buf(),
                error,
            })?;
            debug!(path = %path.display(), "output directory created");
        }
    }

    Ok(OutputDirectory {
        path: path.to_path_buf(),
    })
}
