//! Kit Agent Core
//!
//! Execution harness for Kit agents. An agent binary implements [`Agent`] and
//! hands a factory to [`run_agent`]; the harness loads the run configuration,
//! prepares the output directory, wires the log/metric sinks and the platform
//! client, and invokes `train` or `test`.

pub mod agent;
pub mod artifacts;
pub mod channel;
pub mod config;
pub mod entrypoint;
pub mod error;
pub mod lifecycle;
pub mod obs;
pub mod sink;
pub mod telemetry;

pub use agent::{Agent, AgentContext, RunMode};
pub use artifacts::{read_json_artifact, write_json_artifact, MODEL_FILE, NORM_STATS_FILE};
pub use channel::{
    ContextChannel, ContextMessage, HostEvents, ENV_CONTEXT_SOCKET, RUN_COMPLETED, RUN_FAILED,
    RUN_STARTED,
};
pub use config::{ensure_output_dir, load, OutputDirectory, RunConfig, METRICS_FILE};
pub use entrypoint::{run_agent, run_with, Cli, Command, RunArgs, Streams};
pub use error::{ConfigError, HarnessError, Result, SinkError};
pub use lifecycle::{Harness, LifecycleState, RunSettings};
pub use sink::{LogStream, MetricSink, PROGRESS_SERIES};

pub use obs::{
    emit_artifact_staged, emit_metric_recorded, emit_run_finished, emit_run_started,
    emit_transition, run_span,
};
pub use telemetry::init_tracing;

/// Re-exported so agent crates need a single harness dependency.
pub use kit_platform_client as platform;

/// Kit agent SDK version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
