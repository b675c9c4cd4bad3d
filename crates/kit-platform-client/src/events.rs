//! Progress events raised by the client while it talks to the platform.
//!
//! The client never prints on its own. Events and human-readable failure
//! messages go through a [`ClientEvents`] observer, which the agent harness
//! wires to its log stream and the worker's context socket.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const TRAINING_DATA_REQUESTED: &str = "TRAINING_DATA_REQUESTED";
pub const TRAINING_DATA_RECEIVED: &str = "TRAINING_DATA_RECEIVED";
pub const TRAINING_DATA_FAILED: &str = "TRAINING_DATA_FAILED";
pub const ARTIFACT_DOWNLOAD_STARTED: &str = "ARTIFACT_DOWNLOAD_STARTED";
pub const ARTIFACT_DOWNLOAD_COMPLETED: &str = "ARTIFACT_DOWNLOAD_COMPLETED";
pub const ARTIFACT_DOWNLOAD_FAILED: &str = "ARTIFACT_DOWNLOAD_FAILED";

/// Outcome attached to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Info,
    Success,
    Failure,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Info => "info",
            EventStatus::Success => "success",
            EventStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observer for client activity.
pub trait ClientEvents: Send + Sync {
    /// A named lifecycle event (see the constants in this module).
    fn event(&self, name: &str, status: EventStatus);

    /// A human-readable diagnostic the agent author should see.
    fn message(&self, message: &str);
}

/// Default observer: routes everything through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl ClientEvents for TracingEvents {
    fn event(&self, name: &str, status: EventStatus) {
        tracing::debug!(event = %name, status = %status, "client event");
    }

    fn message(&self, message: &str) {
        tracing::warn!("{}", message);
    }
}
