//! Context channel to the host supervisor.
//!
//! When a worker runs the agent it listens on a Unix domain socket and passes
//! its path in `KIT_CONTEXT_SOCKET`. Lifecycle events and progress updates are
//! sent there as NUL-terminated JSON objects. The channel is optional: with no
//! socket (a local run) every send is a no-op, and a dead socket never fails
//! the run.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use kit_platform_client::{ClientEvents, EventStatus};
use serde::Serialize;
use tracing::{debug, warn};

use crate::sink::LogStream;

/// Socket path exported by the worker.
pub const ENV_CONTEXT_SOCKET: &str = "KIT_CONTEXT_SOCKET";

pub const RUN_STARTED: &str = "RUN_STARTED";
pub const RUN_COMPLETED: &str = "RUN_COMPLETED";
pub const RUN_FAILED: &str = "RUN_FAILED";

/// Wire message, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContextMessage {
    Log {
        payload: String,
    },
    Event {
        event: String,
        status: EventStatus,
        timestamp: DateTime<Utc>,
    },
    Progress {
        payload: u64,
    },
}

impl ContextMessage {
    pub fn event(name: &str, status: EventStatus) -> Self {
        ContextMessage::Event {
            event: name.to_string(),
            status,
            timestamp: Utc::now(),
        }
    }

    /// JSON followed by the NUL delimiter.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.push(0);
        Ok(bytes)
    }
}

type Connection = Box<dyn Write + Send>;

/// Best-effort client for the supervisor socket.
pub struct ContextChannel {
    socket_path: Option<PathBuf>,
    connection: Mutex<Option<Connection>>,
}

impl ContextChannel {
    /// A channel that drops every message.
    pub fn disabled() -> Self {
        ContextChannel {
            socket_path: None,
            connection: Mutex::new(None),
        }
    }

    /// Connect to `socket_path`; an unreachable socket leaves the channel
    /// disconnected and retried on the next send.
    pub fn connect(socket_path: impl Into<PathBuf>) -> Self {
        let socket_path = socket_path.into();
        let connection = open_connection(&socket_path);
        ContextChannel {
            socket_path: Some(socket_path),
            connection: Mutex::new(connection),
        }
    }

    pub fn from_env() -> Self {
        match std::env::var_os(ENV_CONTEXT_SOCKET) {
            Some(path) if !path.is_empty() => Self::connect(PathBuf::from(path)),
            _ => Self::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.socket_path.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    pub fn emit_event(&self, name: &str, status: EventStatus) {
        self.send(&ContextMessage::event(name, status));
    }

    /// Forward a log line to the supervisor.
    pub fn log(&self, message: &str) {
        self.send(&ContextMessage::Log {
            payload: message.to_string(),
        });
    }

    pub fn progress(&self, step: u64) {
        self.send(&ContextMessage::Progress { payload: step });
    }

    pub fn send(&self, message: &ContextMessage) {
        let Some(socket_path) = &self.socket_path else {
            return;
        };
        let bytes = match message.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to encode context message");
                return;
            }
        };

        let mut connection = self.lock();
        if connection.is_none() {
            *connection = open_connection(socket_path);
        }
        let Some(stream) = connection.as_mut() else {
            return;
        };

        if let Err(e) = stream.write_all(&bytes).and_then(|()| stream.flush()) {
            warn!(error = %e, "failed to send message to context socket; reconnecting");
            *connection = open_connection(socket_path);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Connection>> {
        match self.connection.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(unix)]
fn open_connection(socket_path: &Path) -> Option<Connection> {
    match std::os::unix::net::UnixStream::connect(socket_path) {
        Ok(stream) => {
            debug!(socket = %socket_path.display(), "connected to context socket");
            Some(Box::new(stream))
        }
        Err(e) => {
            warn!(
                socket = %socket_path.display(),
                error = %e,
                "could not connect to context socket"
            );
            None
        }
    }
}

#[cfg(not(unix))]
fn open_connection(socket_path: &Path) -> Option<Connection> {
    warn!(
        socket = %socket_path.display(),
        "context sockets are only supported on unix; events are dropped"
    );
    None
}

/// Observer handed to the platform client: diagnostics go to the agent's log
/// stream, events to the supervisor.
pub struct HostEvents {
    log: Arc<LogStream>,
    channel: Arc<ContextChannel>,
}

impl HostEvents {
    pub fn new(log: Arc<LogStream>, channel: Arc<ContextChannel>) -> Self {
        HostEvents { log, channel }
    }
}

impl ClientEvents for HostEvents {
    fn event(&self, name: &str, status: EventStatus) {
        debug!(event = %name, status = %status, "platform event");
        self.channel.emit_event(name, status);
    }

    fn message(&self, message: &str) {
        self.log.log(message);
    }
}
