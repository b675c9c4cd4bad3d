//! Kit sample agent
//!
//! Reference agent exercising the whole harness surface.
//!
//! ## Commands
//!
//! - `train`: simulate `sleep_duration` training iterations, recording a
//!   `pnl` series and progress, then write `norm_stats.json`
//! - `test`: backtest against the stored `norm_stats.json`
//!
//! ## Config keys
//!
//! | key                  | default | meaning                                   |
//! |----------------------|---------|-------------------------------------------|
//! | `sleep_duration`     | 1       | iterations to run (non-negative integer)  |
//! | `tick_ms`            | 1000    | simulated work per iteration              |
//! | `source_artifact_id` | none    | artifact staged to `model.zip` first      |
//! | `source_run_id`      | none    | run whose artifacts land in `stage_inputs/` |

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use kit_agent_core::{
    read_json_artifact, run_agent, write_json_artifact, Agent, AgentContext, MODEL_FILE,
    NORM_STATS_FILE,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

const STAGE_INPUTS_DIR: &str = "stage_inputs";

/// Normalisation statistics carried from `train` to `test`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NormStats {
    mean: f64,
    std: f64,
    samples: u64,
}

/// Running mean and variance (Welford); holds no per-iteration state.
#[derive(Debug, Default)]
struct NormAccumulator {
    samples: u64,
    mean: f64,
    m2: f64,
}

impl NormAccumulator {
    fn push(&mut self, value: f64) {
        self.samples += 1;
        let delta = value - self.mean;
        self.mean += delta / self.samples as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn finish(&self) -> NormStats {
        if self.samples == 0 {
            return NormStats {
                mean: 0.0,
                std: 1.0,
                samples: 0,
            };
        }
        NormStats {
            mean: self.mean,
            std: (self.m2 / self.samples as f64).sqrt(),
            samples: self.samples,
        }
    }
}

struct PnlAgent {
    iterations: u64,
    tick: Duration,
    source_artifact: Option<Uuid>,
    source_run: Option<Uuid>,
}

impl PnlAgent {
    fn from_context(ctx: &AgentContext) -> anyhow::Result<Self> {
        let config = ctx.config();
        Ok(PnlAgent {
            iterations: config
                .get_as::<u64>("sleep_duration")
                .context("sleep_duration must be a non-negative integer")?
                .unwrap_or(1),
            tick: Duration::from_millis(config.get_as::<u64>("tick_ms")?.unwrap_or(1000)),
            source_artifact: config.get_as("source_artifact_id")?,
            source_run: config.get_as("source_run_id")?,
        })
    }

    async fn stage_inputs(&self, ctx: &AgentContext) -> anyhow::Result<()> {
        if let Some(artifact_id) = self.source_artifact {
            let staged = ctx.stage_artifact(artifact_id, MODEL_FILE).await?;
            ctx.log(format!(
                "Loaded model from artifact {artifact_id} ({} bytes)",
                staged.bytes
            ));
        }
        if let Some(run_id) = self.source_run {
            let staged = ctx.stage_run_artifacts(run_id, STAGE_INPUTS_DIR).await?;
            ctx.log(format!(
                "Staged {} artifact(s) from run {run_id}",
                staged.len()
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Agent for PnlAgent {
    async fn train(&mut self, ctx: &AgentContext) -> anyhow::Result<()> {
        self.stage_inputs(ctx).await?;
        ctx.log(format!(
            "Starting training for {} iterations.",
            self.iterations
        ));

        let mut stats = NormAccumulator::default();
        for i in 0..self.iterations {
            let pnl = i as f64 * 0.1;
            ctx.record_metric("pnl", i, pnl)?;
            ctx.report_progress(i + 1)?;
            stats.push(pnl);
            debug!(iteration = i, pnl, "iteration finished");
            if !self.tick.is_zero() {
                tokio::time::sleep(self.tick).await;
            }
        }

        write_json_artifact(ctx.output(), NORM_STATS_FILE, &stats.finish())?;
        ctx.log("Training complete.");
        Ok(())
    }

    async fn test(&mut self, ctx: &AgentContext) -> anyhow::Result<()> {
        self.stage_inputs(ctx).await?;
        let stats: NormStats = read_json_artifact(ctx.output(), NORM_STATS_FILE)
            .with_context(|| format!("{NORM_STATS_FILE} not found; run train first"))?;
        ctx.log(format!(
            "Backtesting with mean={:.3} std={:.3}.",
            stats.mean, stats.std
        ));

        for i in 0..self.iterations {
            let scale = if stats.std > 0.0 { stats.std } else { 1.0 };
            ctx.record_metric("test_pnl", i, (i as f64 * 0.1 - stats.mean) / scale)?;
        }
        ctx.log("Backtest complete.");
        Ok(())
    }
}

fn main() -> ExitCode {
    run_agent(PnlAgent::from_context)
}
