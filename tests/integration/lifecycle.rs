//! Full prediction lifecycle against the in-memory platform, with the
//! real command runner and a paused clock.

use async_trait::async_trait;
use secrecy::SecretString;
use std::time::Duration;

use will_it_blend::auth::TokenSource;
use will_it_blend::engine::orchestrator::{Orchestrator, Phase, RunConfig};
use will_it_blend::engine::runner::ShellCommandRunner;
use will_it_blend::types::*;

use crate::mock_platform::{Call, MockPlatform, BROADCASTER_ID, FAILURE_ID, PREDICTION_ID, SUCCESS_ID};

/// A token source that must never be consulted.
struct NoLogin;

#[async_trait]
impl TokenSource for NoLogin {
    async fn acquire_token(&self) -> Result<SecretString, AuthError> {
        panic!("token was supplied, browser login must not start");
    }
}

/// Hands out a fixed token as if the browser flow had completed.
struct BrowserLogin;

#[async_trait]
impl TokenSource for BrowserLogin {
    async fn acquire_token(&self) -> Result<SecretString, AuthError> {
        Ok(SecretString::new("from-browser".to_string()))
    }
}

fn run_config(command: &str) -> RunConfig {
    RunConfig {
        title: "t".to_string(),
        window_secs: 1,
        success_label: "Yes".to_string(),
        failure_label: "No".to_string(),
        command: command.to_string(),
        token: Some(SecretString::new("T".to_string())),
    }
}

#[tokio::test(start_paused = true)]
async fn test_successful_command_resolves_success_outcome() {
    let platform = MockPlatform::with_statuses(&[PredictionStatus::Active, PredictionStatus::Locked]);
    let runner = ShellCommandRunner;
    let mut orchestrator = Orchestrator::new(&platform, &NoLogin, &runner);

    let report = orchestrator.run(run_config("true")).await.unwrap();

    assert_eq!(report.outcome, CommandOutcome::Succeeded);
    assert_eq!(report.winning_outcome_id, SUCCESS_ID);
    assert_eq!(report.status_checks, 2);
    assert_eq!(orchestrator.phase(), &Phase::Resolved);

    let calls = platform.calls();
    assert_eq!(calls[0], Call::Identity { token: "T".to_string() });
    assert_eq!(
        calls[1],
        Call::Create {
            title: "t".to_string(),
            labels: ("Yes".to_string(), "No".to_string()),
            window_secs: 1,
        }
    );
    assert_eq!(platform.count(|c| matches!(c, Call::Create { .. })), 1);
    assert!(platform.count(|c| matches!(c, Call::Status { .. })) >= 1);
    assert_eq!(
        calls.last().unwrap(),
        &Call::Resolve {
            prediction_id: PREDICTION_ID.to_string(),
            winning_outcome_id: SUCCESS_ID.to_string(),
        }
    );
    assert_eq!(report.prediction.broadcaster_id, BROADCASTER_ID);
}

#[tokio::test(start_paused = true)]
async fn test_failing_command_resolves_failure_outcome() {
    let platform = MockPlatform::with_statuses(&[PredictionStatus::Locked]);
    let runner = ShellCommandRunner;
    let mut orchestrator = Orchestrator::new(&platform, &NoLogin, &runner);

    let report = orchestrator.run(run_config("sh -c 'exit 7'")).await.unwrap();

    assert_eq!(report.outcome, CommandOutcome::Failed);
    assert_eq!(
        platform.calls().last().unwrap(),
        &Call::Resolve {
            prediction_id: PREDICTION_ID.to_string(),
            winning_outcome_id: FAILURE_ID.to_string(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_unknown_program_resolves_failure_outcome() {
    let platform = MockPlatform::with_statuses(&[PredictionStatus::Locked]);
    let runner = ShellCommandRunner;
    let mut orchestrator = Orchestrator::new(&platform, &NoLogin, &runner);

    let report = orchestrator
        .run(run_config("definitely-not-a-real-program-3f9a"))
        .await
        .unwrap();

    assert_eq!(report.winning_outcome_id, FAILURE_ID);
}

#[tokio::test(start_paused = true)]
async fn test_never_locking_times_out_after_polling_budget() {
    let platform = MockPlatform::with_statuses(&[PredictionStatus::Active]);
    let runner = ShellCommandRunner;
    let mut orchestrator = Orchestrator::new(&platform, &NoLogin, &runner);

    let started = tokio::time::Instant::now();
    let err = orchestrator.run(run_config("true")).await.unwrap_err();

    assert!(matches!(err, RunError::LockTimeout { attempts: 18 }));
    assert_eq!(platform.count(|c| matches!(c, Call::Status { .. })), 18);
    assert_eq!(platform.count(|c| matches!(c, Call::Resolve { .. })), 0);
    // One second window plus 18 polls five seconds apart.
    assert!(started.elapsed() >= Duration::from_secs(91));
    assert!(matches!(orchestrator.phase(), Phase::Failed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_create_never_runs_command() {
    let platform = MockPlatform::with_statuses(&[PredictionStatus::Locked]).rejecting_create(400);
    let runner = ShellCommandRunner;
    let mut orchestrator = Orchestrator::new(&platform, &NoLogin, &runner);

    let err = orchestrator.run(run_config("true")).await.unwrap_err();

    assert!(matches!(
        err,
        RunError::Create(PlatformError::NonSuccessStatus { status: 400, .. })
    ));
    assert_eq!(platform.count(|c| matches!(c, Call::Status { .. })), 0);
    assert_eq!(platform.count(|c| matches!(c, Call::Resolve { .. })), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_token_goes_through_login() {
    let platform = MockPlatform::with_statuses(&[PredictionStatus::Locked]);
    let runner = ShellCommandRunner;
    let mut orchestrator = Orchestrator::new(&platform, &BrowserLogin, &runner);

    let mut config = run_config("true");
    config.token = None;
    orchestrator.run(config).await.unwrap();

    assert_eq!(
        platform.calls()[0],
        Call::Identity { token: "from-browser".to_string() }
    );
    assert!(orchestrator.history().contains(&Phase::Authenticating));
}
