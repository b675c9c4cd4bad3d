//! Locally injected training data.
//!
//! A worker that already holds the prepared dataset in its cache writes it to
//! a file and points `KIT_LOCAL_DATA_PATH` at it. Reading that file avoids a
//! round trip to the platform during simulation runs.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::Result;

/// Read an injected dataset document.
pub fn load_local_data(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Shape of one time-scale entry inside a training set.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleSummary {
    pub scale: String,
    pub rows: usize,
    pub columns: Vec<String>,
    pub first_row: Option<Value>,
}

/// Summarise each scale whose value is a JSON-encoded `{columns, data}` frame.
///
/// Scales with null, non-string or unparsable content are skipped.
pub fn summarize_dataset(data: &Value) -> Vec<ScaleSummary> {
    let Some(scales) = data.as_object() else {
        return Vec::new();
    };

    let mut summaries = Vec::new();
    for (scale, content) in scales {
        let Some(encoded) = content.as_str() else {
            continue;
        };
        if encoded.is_empty() || encoded == "null" {
            continue;
        }
        let Ok(frame) = serde_json::from_str::<Value>(encoded) else {
            continue;
        };

        let columns = frame
            .get("columns")
            .and_then(Value::as_array)
            .map(|cols| {
                cols.iter()
                    .map(|c| c.as_str().map(str::to_string).unwrap_or_else(|| c.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        let rows = frame.get("data").and_then(Value::as_array);

        summaries.push(ScaleSummary {
            scale: scale.clone(),
            rows: rows.map_or(0, Vec::len),
            columns,
            first_row: rows.and_then(|r| r.first()).cloned(),
        });
    }
    summaries
}

/// Debug-level dump of the dataset shape.
pub fn inspect_dataset(source: &str, data: &Value) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    for summary in summarize_dataset(data) {
        debug!(
            source,
            scale = %summary.scale,
            rows = summary.rows,
            columns = ?summary.columns,
            "training data scale"
        );
        if let Some(first) = &summary.first_row {
            debug!(source, scale = %summary.scale, first_row = %first, "first row");
        }
    }
}
