use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use capforge_config::CapforgeConfig;
use capforge_core::{AgentClient, CapError};
use capforge_executor::RegistryExecutor;
use capforge_logging::{intercept_console, Telemetry, TelemetryEvent};
use capforge_session::{
    notes, OutputMode, OutputSink, ReplayClient, SessionDriver, SessionOutcome,
};

#[derive(Parser)]
#[command(name = "capforge")]
#[command(about = "capforge — non-interactive agent CLI for packet capture analysis")]
#[command(version)]
struct Cli {
    /// Prompt text for the session
    prompt: String,

    /// Emit line-delimited JSON records instead of raw text
    #[arg(long)]
    jsonl: bool,

    /// Override the configured turn limit (negative = unlimited)
    #[arg(long, value_name = "N", allow_hyphen_values = true)]
    max_turns: Option<i64>,

    /// Drive the session from a recorded transcript instead of a live client
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Config file path (defaults to ~/.capforge/config.yaml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose diagnostics on stderr
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(capforge_config::config_file_path);
    let mut config = match capforge_config::load_config(&config_path).await {
        Ok(config) => config,
        Err(e) => {
            notes::note_error(&format!("{e:#}"));
            return ExitCode::FAILURE;
        }
    };
    capforge_config::apply_env_overrides(&mut config);
    if let Some(max_turns) = cli.max_turns {
        config.session.max_session_turns = max_turns;
    }
    if cli.debug {
        config.session.debug = true;
    }

    // Console stays intercepted for the whole session; the guard restores it
    // on every exit path.
    let _console = intercept_console(&config.logging.level, config.session.debug);

    match run(&cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            notes::note_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, config: &CapforgeConfig) -> Result<()> {
    let client = build_client(cli).await?;
    let executor = Arc::new(RegistryExecutor::with_default_tools(
        config.tools.max_read_bytes,
    ));

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let telemetry = if config.telemetry.enabled {
        let dir = config
            .telemetry
            .dir
            .clone()
            .unwrap_or_else(|| capforge_config::config_dir().join("telemetry"));
        Telemetry::init(&dir).context("failed to initialize telemetry")?
    } else {
        Telemetry::disabled()
    };

    let prompt_id = Uuid::new_v4().to_string();
    telemetry.record(&TelemetryEvent::SessionStarted {
        prompt_id: prompt_id.clone(),
        jsonl: cli.jsonl,
    });

    let driver = SessionDriver::new(
        client,
        executor,
        config.session.max_session_turns,
        cancel,
    );
    let mode = if cli.jsonl {
        OutputMode::Jsonl
    } else {
        OutputMode::Plain
    };
    let mut sink = OutputSink::stdout(mode);

    let result = driver.run_session(&cli.prompt, &prompt_id, &mut sink).await;

    match &result {
        Ok(outcome) => {
            debug!(?outcome, "Session finished");
            telemetry.record(&TelemetryEvent::SessionEnded {
                prompt_id: prompt_id.clone(),
                outcome: outcome_name(outcome).to_string(),
            });
        }
        Err(e) => {
            telemetry.record(&TelemetryEvent::SessionFailed {
                prompt_id: prompt_id.clone(),
                error: e.to_string(),
            });
        }
    }
    if telemetry.is_active() {
        telemetry.shutdown();
    }

    result
        .map(|_| ())
        .with_context(|| format!("session failed (auth mode: {})", config.auth.describe()))
}

async fn build_client(cli: &Cli) -> Result<Arc<dyn AgentClient>> {
    match &cli.replay {
        Some(path) => {
            let client = ReplayClient::from_path(path).await?;
            Ok(Arc::new(client))
        }
        None => Err(CapError::NoClient(
            "pass --replay <FILE> or configure an agent client".to_string(),
        )
        .into()),
    }
}

fn outcome_name(outcome: &SessionOutcome) -> &'static str {
    match outcome {
        SessionOutcome::Completed => "completed",
        SessionOutcome::TurnLimit => "turn_limit",
        SessionOutcome::Canceled => "canceled",
        SessionOutcome::OutputClosed => "output_closed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_invocation() {
        let cli = Cli::try_parse_from(["capforge", "hello"]).unwrap();
        assert_eq!(cli.prompt, "hello");
        assert!(!cli.jsonl);
        assert!(cli.max_turns.is_none());
        assert!(cli.replay.is_none());
    }

    #[test]
    fn parses_negative_turn_limit() {
        let cli =
            Cli::try_parse_from(["capforge", "--max-turns", "-1", "--jsonl", "hi"]).unwrap();
        assert_eq!(cli.max_turns, Some(-1));
        assert!(cli.jsonl);
    }

    #[test]
    fn prompt_is_required() {
        assert!(Cli::try_parse_from(["capforge", "--jsonl"]).is_err());
    }

    #[test]
    fn outcome_names_are_stable() {
        assert_eq!(outcome_name(&SessionOutcome::Completed), "completed");
        assert_eq!(outcome_name(&SessionOutcome::TurnLimit), "turn_limit");
        assert_eq!(outcome_name(&SessionOutcome::Canceled), "canceled");
        assert_eq!(outcome_name(&SessionOutcome::OutputClosed), "output_closed");
    }
}
