//! The agent contract and the context handed to agent code.
//!
//! Every agent implements [`Agent::train`]. Before any agent code runs the
//! harness has resolved the [`RunConfig`], created the [`OutputDirectory`] and
//! built the platform client; all three are reachable through the
//! [`AgentContext`] together with the log, metric and event channels.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use kit_platform_client::{EventStatus, PlatformClient, PlatformClientError, StagedDownload};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channel::ContextChannel;
use crate::config::{OutputDirectory, RunConfig};
use crate::error::SinkError;
use crate::obs;
use crate::sink::{LogStream, MetricSink};

/// Which lifecycle method a run invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Train,
    /// Backtest / simulation of a trained agent
    Test,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Train => "train",
            RunMode::Test => "test",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-authored training agent.
///
/// Returning `Ok(())` from the invoked method is the only success signal; any
/// error propagates unchanged to the entrypoint and fails the run.
#[async_trait]
pub trait Agent: Send {
    /// Display name used in logs and lifecycle events.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Main training logic.
    async fn train(&mut self, ctx: &AgentContext) -> anyhow::Result<()>;

    /// Backtesting / simulation logic.
    async fn test(&mut self, ctx: &AgentContext) -> anyhow::Result<()> {
        ctx.log("Test command not implemented for this agent.");
        Ok(())
    }
}

/// Everything an agent may touch during a run.
pub struct AgentContext {
    config: RunConfig,
    output: OutputDirectory,
    client: Arc<dyn PlatformClient>,
    log: Arc<LogStream>,
    metrics: MetricSink,
    channel: Arc<ContextChannel>,
    mode: RunMode,
    run_id: Option<String>,
}

impl AgentContext {
    /// Context logging to stdout with no supervisor channel.
    pub fn new(config: RunConfig, output: OutputDirectory, client: Arc<dyn PlatformClient>) -> Self {
        let metrics = MetricSink::new(&output);
        AgentContext {
            config,
            output,
            client,
            log: Arc::new(LogStream::stdout()),
            metrics,
            channel: Arc::new(ContextChannel::disabled()),
            mode: RunMode::Train,
            run_id: None,
        }
    }

    pub fn with_log_stream(mut self, log: Arc<LogStream>) -> Self {
        self.log = log;
        self
    }

    pub fn with_channel(mut self, channel: Arc<ContextChannel>) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_run_id(mut self, run_id: Option<String>) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn output(&self) -> &OutputDirectory {
        &self.output
    }

    pub fn client(&self) -> &dyn PlatformClient {
        self.client.as_ref()
    }

    /// Shared handle, for agents that hand the client to their own tasks.
    pub fn client_handle(&self) -> Arc<dyn PlatformClient> {
        Arc::clone(&self.client)
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn is_test_run(&self) -> bool {
        self.mode == RunMode::Test
    }

    /// Worker-assigned run ID; `None` for local runs.
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Write one line to the run's log stream, flushed immediately.
    pub fn log(&self, message: impl AsRef<str>) {
        self.log.log(message.as_ref());
    }

    /// Append `name,step,value` to `metrics.log`.
    pub fn record_metric(&self, name: &str, step: u64, value: f64) -> Result<(), SinkError> {
        self.metrics.record_metric(name, step, value)?;
        obs::emit_metric_recorded(name, step, value);
        Ok(())
    }

    /// Report the current training step to `metrics.log` and the supervisor.
    pub fn report_progress(&self, step: u64) -> Result<(), SinkError> {
        self.metrics.report_progress(step)?;
        self.channel.progress(step);
        Ok(())
    }

    /// Send a named event to the supervisor (no-op on local runs).
    pub fn emit_event(&self, name: &str, status: EventStatus) {
        self.channel.emit_event(name, status);
    }

    pub(crate) fn log_stream(&self) -> &LogStream {
        &self.log
    }

    /// Download an artifact of an earlier stage to `output/<filename>`.
    pub async fn stage_artifact(
        &self,
        artifact_id: Uuid,
        filename: impl AsRef<Path>,
    ) -> Result<StagedDownload, PlatformClientError> {
        let destination = self.output.join(filename);
        let staged = self.client.download_artifact(artifact_id, &destination).await?;
        obs::emit_artifact_staged(&staged);
        Ok(staged)
    }

    /// Download every artifact of an earlier run into `output/<subdir>/`.
    pub async fn stage_run_artifacts(
        &self,
        run_id: Uuid,
        subdir: &str,
    ) -> Result<Vec<StagedDownload>, PlatformClientError> {
        let folder = self.output.stage_dir(subdir)?;
        let staged = self.client.download_artifacts_for_run(run_id, &folder).await?;
        for download in &staged {
            obs::emit_artifact_staged(download);
        }
        Ok(staged)
    }
}

impl fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentContext")
            .field("config", &self.config)
            .field("output", &self.output)
            .field("mode", &self.mode)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}
