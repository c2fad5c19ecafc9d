//! will-it-blend: bet on a command with a Twitch prediction
//!
//! Entry point. Parses flags, loads configuration, initialises structured
//! logging, and runs one prediction lifecycle around the given command.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use will_it_blend::auth::AuthHandshake;
use will_it_blend::config::{self, AppConfig, CliArgs, FileConfig};
use will_it_blend::engine::orchestrator::Orchestrator;
use will_it_blend::engine::runner::ShellCommandRunner;
use will_it_blend::platforms::twitch::TwitchClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let args = CliArgs::parse();

    init_logging();

    // -- Configuration ---------------------------------------------------

    let file = match config::config_path(args.config.as_deref()) {
        Some(path) => FileConfig::load(&path)?.unwrap_or_default(),
        None => FileConfig::default(),
    };
    let cfg = AppConfig::resolve(&args, file)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        title = %cfg.title,
        duration_secs = cfg.duration_secs,
        success = %cfg.success_label,
        failure = %cfg.failure_label,
        port = %cfg.port,
        token_supplied = cfg.token.is_some(),
        "will-it-blend starting up"
    );

    // -- Components ------------------------------------------------------

    let platform = TwitchClient::with_base_url(cfg.client_id.clone(), cfg.api_base_url.clone())?;
    let handshake = AuthHandshake::new(cfg.port, cfg.client_id.clone());
    let runner = ShellCommandRunner;

    let mut orchestrator = Orchestrator::new(&platform, &handshake, &runner);

    // -- Run -------------------------------------------------------------

    match orchestrator.run(cfg.into_run_config(args.command)).await {
        Ok(report) => {
            info!(
                prediction_id = %report.prediction.id,
                outcome = %report.outcome,
                winning_outcome_id = %report.winning_outcome_id,
                status_checks = report.status_checks,
                "Prediction Resolved"
            );
            Ok(())
        }
        Err(e) => {
            error!(phase = %orchestrator.phase(), "will-it-blend failed");
            Err(e.into())
        }
    }
}

/// Logs go to stderr so the command's own stdout stays clean.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("will_it_blend=info"));

    let json_logging = std::env::var("WILL_IT_BLEND_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
    }
}
