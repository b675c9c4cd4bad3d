//! Structured observability hooks for the agent run lifecycle.
//!
//! These go to the tracing subscriber (stderr), never to the agent's log
//! stream on stdout.

use kit_platform_client::StagedDownload;
use tracing::{debug, info, trace};

use crate::lifecycle::LifecycleState;

/// Run-scoped span carrying the agent name and mode.
///
/// Attach it to the run future with [`tracing::Instrument`] so it is entered
/// only while the future is polled:
///
/// ```ignore
/// agent.train(&ctx).instrument(run_span("PnlAgent", "train")).await
/// ```
pub fn run_span(agent: &str, mode: &str) -> tracing::Span {
    tracing::info_span!("kit.run", agent = %agent, mode = %mode)
}

/// Emit event: agent constructed and about to run.
pub fn emit_run_started(agent: &str, mode: &str, run_id: Option<&str>) {
    info!(
        event = "run.started",
        agent = %agent,
        mode = %mode,
        run_id = run_id.unwrap_or("local"),
    );
}

/// Emit event: run finished with duration and success status.
pub fn emit_run_finished(agent: &str, duration_ms: u64, success: bool) {
    info!(
        event = "run.finished",
        agent = %agent,
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emit event: lifecycle state change.
pub fn emit_transition(from: LifecycleState, to: LifecycleState) {
    debug!(event = "run.transition", from = ?from, to = ?to);
}

/// Emit event: an artifact from an earlier stage was written to disk.
pub fn emit_artifact_staged(staged: &StagedDownload) {
    info!(
        event = "artifact.staged",
        artifact_id = %staged.artifact_id,
        path = %staged.path.display(),
        bytes = staged.bytes,
        sha256 = %staged.sha256,
    );
}

/// Emit event: metric appended (trace level; agents can record many).
pub fn emit_metric_recorded(name: &str, step: u64, value: f64) {
    trace!(event = "metric.recorded", name = %name, step = step, value = value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let span = run_span("TestAgent", "train");
        span.in_scope(|| emit_metric_recorded("pnl", 0, 0.0));
    }
}
