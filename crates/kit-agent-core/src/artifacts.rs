//! Well-known artifact names and JSON artifact helpers.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::config::OutputDirectory;
use crate::error::SinkError;

pub const MODEL_FILE: &str = "model.zip";
pub const NORM_STATS_FILE: &str = "norm_stats.json";

/// Serialize `value` as pretty JSON into `output/<name>`.
///
/// The file is written to a temp file in the same directory and renamed into
/// place, so readers never observe a partial document.
pub fn write_json_artifact<T: Serialize + ?Sized>(
    output: &OutputDirectory,
    name: &str,
    value: &T,
) -> Result<PathBuf, SinkError> {
    let path = output.join(name);
    let dir = path.parent().unwrap_or_else(|| output.path());
    fs::create_dir_all(dir)?;

    let bytes = serde_json::to_vec_pretty(value)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(&path).map_err(|e| e.error)?;
    Ok(path)
}

/// Read a JSON artifact previously written under `output`.
pub fn read_json_artifact<T: DeserializeOwned>(
    output: &OutputDirectory,
    name: impl AsRef<Path>,
) -> Result<T, SinkError> {
    let bytes = fs::read(output.join(name))?;
    Ok(serde_json::from_slice(&bytes)?)
}
