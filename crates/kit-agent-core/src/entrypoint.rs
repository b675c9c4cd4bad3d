//! Command-line entrypoint shared by every agent binary.
//!
//! ```text
//! my-agent train --config config.json --output-path ./out
//! my-agent test  --config config.json --output-path ./out
//! ```
//!
//! Exit status is `0` when the lifecycle method returns `Ok`, `1` on any
//! failure (with `error: ...` on stderr) and `2` for argument errors.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use kit_platform_client::{KitClient, PlatformClient};
use tracing::Level;

use crate::agent::{Agent, AgentContext, RunMode};
use crate::channel::{ContextChannel, HostEvents};
use crate::error::{HarnessError, Result};
use crate::lifecycle::{Harness, RunSettings};
use crate::sink::LogStream;
use crate::telemetry::init_tracing;

#[derive(Debug, Parser)]
#[command(author = "Kit Engineering")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a Kit agent", long_about = None)]
pub struct Cli {
    /// Enable verbose harness diagnostics on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit JSON-formatted diagnostic lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the agent's training logic
    Train(RunArgs),

    /// Run the agent's backtesting logic
    Test(RunArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Path to the JSON run configuration
    #[arg(long, value_parser = non_empty_path)]
    pub config: PathBuf,

    /// Directory to write artifacts and metrics.log into
    #[arg(long, value_parser = non_empty_path)]
    pub output_path: PathBuf,
}

impl Command {
    pub fn mode(&self) -> RunMode {
        match self {
            Command::Train(_) => RunMode::Train,
            Command::Test(_) => RunMode::Test,
        }
    }

    pub fn settings(&self) -> RunSettings {
        let (Command::Train(args) | Command::Test(args)) = self;
        RunSettings {
            mode: self.mode(),
            config_path: args.config.clone(),
            output_path: args.output_path.clone(),
        }
    }
}

fn non_empty_path(raw: &str) -> std::result::Result<PathBuf, String> {
    if raw.trim().is_empty() {
        Err("path must not be empty".to_string())
    } else {
        Ok(PathBuf::from(raw))
    }
}

/// Host-side channels of a run.
pub struct Streams {
    pub log: Arc<LogStream>,
    pub channel: Arc<ContextChannel>,
    /// Worker-assigned run ID, `None` for local runs
    pub run_id: Option<String>,
}

impl Streams {
    pub fn new(log: Arc<LogStream>) -> Self {
        Streams {
            log,
            channel: Arc::new(ContextChannel::disabled()),
            run_id: None,
        }
    }

    pub fn with_channel(mut self, channel: Arc<ContextChannel>) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_run_id(mut self, run_id: Option<String>) -> Self {
        self.run_id = run_id;
        self
    }
}

/// Parse `std::env::args`, run the agent built by `factory` and map the
/// outcome to an exit status.
///
/// ```ignore
/// fn main() -> ExitCode {
///     kit_agent_core::run_agent(|_ctx| Ok(MyAgent::default()))
/// }
/// ```
pub fn run_agent<A, F>(factory: F) -> ExitCode
where
    A: Agent,
    F: FnOnce(&AgentContext) -> anyhow::Result<A>,
{
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let streams = Streams::new(Arc::new(LogStream::stdout()))
        .with_channel(Arc::new(ContextChannel::from_env()));
    let events = HostEvents::new(Arc::clone(&streams.log), Arc::clone(&streams.channel));

    let result = KitClient::from_env()
        .map_err(HarnessError::from)
        .and_then(|client| {
            let run_id = client.config().run_id.clone();
            let client = client.with_events(Arc::new(events));
            run_with(&cli, Arc::new(client), streams.with_run_id(run_id), factory)
        });
    report(result)
}

/// Drive one run on a current-thread runtime.
pub fn run_with<A, F>(
    cli: &Cli,
    client: Arc<dyn PlatformClient>,
    streams: Streams,
    factory: F,
) -> Result<()>
where
    A: Agent,
    F: FnOnce(&AgentContext) -> anyhow::Result<A>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(HarnessError::Runtime)?;

    let mut harness = Harness::new(client)
        .with_log_stream(streams.log)
        .with_channel(streams.channel)
        .with_run_id(streams.run_id);
    harness.configure(&cli.command.settings())?;
    runtime.block_on(harness.run(factory))
}

fn exit_status(result: &Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

fn report(result: Result<()>) -> ExitCode {
    if let Err(e) = &result {
        eprintln!("error: {e}");
    }
    ExitCode::from(exit_status(&result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use clap::error::ErrorKind;
    use kit_platform_client::fakes::MemoryPlatformClient;
    use std::io::Write;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    struct Greeter;

    #[async_trait]
    impl Agent for Greeter {
        async fn train(&mut self, ctx: &AgentContext) -> anyhow::Result<()> {
            ctx.log(format!("training for {}", ctx.config().get_u64("sleep_duration").unwrap_or(1)));
            Ok(())
        }
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("agent").chain(args.iter().copied())).unwrap()
    }

    fn write_config(dir: &Path, content: &str) -> String {
        let path = dir.join("config.json");
        std::fs::write(&path, content).unwrap();
        path.display().to_string()
    }

    #[test]
    fn parses_train_and_test() {
        let parsed = cli(&["train", "--config", "c.json", "--output-path", "out"]);
        assert_eq!(parsed.command.mode(), RunMode::Train);
        assert_eq!(parsed.command.settings().config_path, PathBuf::from("c.json"));

        let parsed = cli(&["--verbose", "test", "--config", "c.json", "--output-path", "out"]);
        assert!(parsed.verbose);
        assert_eq!(parsed.command.settings().mode, RunMode::Test);
        assert_eq!(parsed.command.settings().output_path, PathBuf::from("out"));
    }

    #[test]
    fn missing_arguments_are_rejected() {
        let err = Cli::try_parse_from(["agent", "train", "--config", "c.json"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(err.exit_code(), 2);

        let err = Cli::try_parse_from(["agent", "deploy"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn empty_path_is_rejected() {
        let err = Cli::try_parse_from(["agent", "train", "--config", "", "--output-path", "out"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn run_with_writes_log_lines() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), r#"{"sleep_duration": 3}"#);
        let out = dir.path().join("out").display().to_string();
        let buf = SharedBuf::default();

        let result = run_with(
            &cli(&["train", "--config", &config, "--output-path", &out]),
            Arc::new(MemoryPlatformClient::new()),
            Streams::new(Arc::new(LogStream::new(buf.clone()))),
            |_| Ok(Greeter),
        );

        assert!(result.is_ok());
        assert_eq!(exit_status(&result), 0);
        assert_eq!(buf.text(), "training for 3\n");
        assert!(dir.path().join("out").is_dir());
    }

    #[test]
    fn missing_config_never_builds_agent() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json").display().to_string();
        let out = dir.path().join("out").display().to_string();
        let mut constructed = false;

        let result = run_with(
            &cli(&["train", "--config", &missing, "--output-path", &out]),
            Arc::new(MemoryPlatformClient::new()),
            Streams::new(Arc::new(LogStream::new(std::io::sink()))),
            |_| {
                constructed = true;
                Ok(Greeter)
            },
        );

        assert!(matches!(result, Err(HarnessError::Config(_))));
        assert_eq!(exit_status(&result), 1);
        assert!(!constructed);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn output_path_that_is_a_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "{}");
        let file = dir.path().join("taken");
        std::fs::write(&file, "x").unwrap();

        let result = run_with(
            &cli(&["train", "--config", &config, "--output-path", &file.display().to_string()]),
            Arc::new(MemoryPlatformClient::new()),
            Streams::new(Arc::new(LogStream::new(std::io::sink()))),
            |_| Ok(Greeter),
        );

        assert!(matches!(result, Err(HarnessError::Config(_))));
    }
}
