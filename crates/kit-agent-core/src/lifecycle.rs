//! Run lifecycle state machine.
//!
//! ```text
//! Uninitialized -> Configured -> Running -> Completed
//!        |              |            \----> Failed
//!        \--------------\-----------------> Failed
//! ```
//!
//! `Harness` owns the transitions: it resolves configuration, builds the
//! [`AgentContext`], constructs the agent and invokes the lifecycle method
//! for the requested [`RunMode`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use kit_platform_client::{EventStatus, PlatformClient};
use serde::Serialize;
use tracing::{debug, error, Instrument};

use crate::agent::{Agent, AgentContext, RunMode};
use crate::channel::{ContextChannel, RUN_COMPLETED, RUN_FAILED, RUN_STARTED};
use crate::config::{ensure_output_dir, RunConfig};
use crate::error::{HarnessError, Result};
use crate::obs;
use crate::sink::LogStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    /// Config loaded and output directory resolved
    Configured,
    /// Inside the agent's lifecycle method
    Running,
    Completed,
    Failed,
}

impl LifecycleState {
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Uninitialized, Configured)
                | (Configured, Running)
                | (Running, Completed)
                | (Uninitialized | Configured | Running, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Completed | LifecycleState::Failed)
    }
}

/// Inputs of one run, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub mode: RunMode,
    pub config_path: PathBuf,
    pub output_path: PathBuf,
}

/// Drives exactly one agent through its lifecycle.
pub struct Harness {
    state: LifecycleState,
    client: Arc<dyn PlatformClient>,
    log: Arc<LogStream>,
    channel: Arc<ContextChannel>,
    run_id: Option<String>,
    context: Option<AgentContext>,
}

impl Harness {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Harness {
            state: LifecycleState::Uninitialized,
            client,
            log: Arc::new(LogStream::stdout()),
            channel: Arc::new(ContextChannel::disabled()),
            run_id: None,
            context: None,
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

    pub fn with_run_id(mut self, run_id: Option<String>) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Context built by [`configure`](Self::configure), if any.
    pub fn context(&self) -> Option<&AgentContext> {
        self.context.as_ref()
    }

    fn transition(&mut self, next: LifecycleState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(HarnessError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        obs::emit_transition(self.state, next);
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, err: HarnessError) -> HarnessError {
        if self.state.can_transition_to(LifecycleState::Failed) {
            obs::emit_transition(self.state, LifecycleState::Failed);
            self.state = LifecycleState::Failed;
        }
        err
    }

    /// Load the config and create the output directory.
    pub fn configure(&mut self, settings: &RunSettings) -> Result<&AgentContext> {
        if self.state != LifecycleState::Uninitialized {
            return Err(HarnessError::InvalidTransition {
                from: self.state,
                to: LifecycleState::Configured,
            });
        }

        let resolved = RunConfig::load(&settings.config_path)
            .and_then(|config| Ok((config, ensure_output_dir(&settings.output_path)?)));
        let (config, output) = match resolved {
            Ok(resolved) => resolved,
            Err(e) => return Err(self.fail(e.into())),
        };

        debug!(
            config = %settings.config_path.display(),
            output = %output.path().display(),
            mode = %settings.mode,
            "run configured"
        );

        let context = AgentContext::new(config, output, Arc::clone(&self.client))
            .with_log_stream(Arc::clone(&self.log))
            .with_channel(Arc::clone(&self.channel))
            .with_mode(settings.mode)
            .with_run_id(self.run_id.clone());
        self.transition(LifecycleState::Configured)?;
        Ok(self.context.insert(context))
    }

    /// Construct the agent from the configured context and run it.
    pub async fn run<A, F>(&mut self, factory: F) -> Result<()>
    where
        A: Agent,
        F: FnOnce(&AgentContext) -> anyhow::Result<A>,
    {
        if self.state != LifecycleState::Configured {
            return Err(HarnessError::InvalidTransition {
                from: self.state,
                to: LifecycleState::Running,
            });
        }
        let Some(ctx) = self.context.take() else {
            return Err(HarnessError::InvalidTransition {
                from: self.state,
                to: LifecycleState::Running,
            });
        };

        let agent = match factory(&ctx) {
            Ok(agent) => agent,
            Err(e) => {
                self.context = Some(ctx);
                return Err(self.fail(HarnessError::AgentFailure(e)));
            }
        };

        let name = agent.name().to_string();
        let span = obs::run_span(&name, ctx.mode().as_str());
        let result = self.drive(agent, &ctx, &name).instrument(span).await;
        self.context = Some(ctx);
        result
    }

    async fn drive<A: Agent>(&mut self, mut agent: A, ctx: &AgentContext, name: &str) -> Result<()> {
        let mode = ctx.mode();
        self.transition(LifecycleState::Running)?;
        obs::emit_run_started(name, mode.as_str(), ctx.run_id());
        ctx.emit_event(RUN_STARTED, EventStatus::Info);

        let started = Instant::now();
        let outcome = match mode {
            RunMode::Train => agent.train(ctx).await,
            RunMode::Test => agent.test(ctx).await,
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(()) if ctx.log_stream().is_broken() => Err(HarnessError::LogStreamBroken),
            Ok(()) => Ok(()),
            Err(e) => Err(HarnessError::AgentFailure(e)),
        };
        obs::emit_run_finished(name, duration_ms, result.is_ok());

        match result {
            Ok(()) => {
                ctx.emit_event(RUN_COMPLETED, EventStatus::Success);
                self.transition(LifecycleState::Completed)
            }
            Err(e) => {
                error!(agent = %name, error = %e, "run failed");
                ctx.emit_event(RUN_FAILED, EventStatus::Failure);
                Err(self.fail(e))
            }
        }
    }
}
