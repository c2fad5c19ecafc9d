//! Prediction orchestrator.
//!
//! Drives one prediction through its lifecycle:
//!
//! `Idle → Authenticating → PredictionCreated → AwaitingLock → Locked →
//! CommandRunning → Resolved`, with `Failed` reachable from every phase.
//!
//! Everything runs sequentially on the caller's task. The only retry is the
//! bounded lock-polling loop; every other error ends the run.

use secrecy::SecretString;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::auth::TokenSource;
use crate::engine::outcome::winning_outcome_id;
use crate::engine::runner::CommandRunner;
use crate::platforms::{PredictionPlatform, PredictionRequest};
use crate::types::{CommandOutcome, Prediction, PredictionStatus, RunError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Seconds between lock status checks.
pub const POLL_INTERVAL_SECS: u64 = 5;

/// Status checks before giving up on the lock (90 seconds in total).
pub const POLL_MAX_ATTEMPTS: u32 = 18;

/// How the orchestrator waits for the platform to lock the prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(POLL_INTERVAL_SECS),
            max_attempts: POLL_MAX_ATTEMPTS,
        }
    }
}

/// Everything one run needs, already validated.
#[derive(Debug)]
pub struct RunConfig {
    pub title: String,
    pub window_secs: u32,
    pub success_label: String,
    pub failure_label: String,
    pub command: String,
    /// Pre-supplied bearer token. When absent the token source is asked.
    pub token: Option<SecretString>,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Authenticating,
    PredictionCreated,
    AwaitingLock,
    Locked,
    CommandRunning,
    Resolved,
    Failed(String),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Authenticating => write!(f, "authenticating"),
            Phase::PredictionCreated => write!(f, "prediction-created"),
            Phase::AwaitingLock => write!(f, "awaiting-lock"),
            Phase::Locked => write!(f, "locked"),
            Phase::CommandRunning => write!(f, "command-running"),
            Phase::Resolved => write!(f, "resolved"),
            Phase::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Summary of a run that reached `Resolved`.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub prediction: Prediction,
    pub outcome: CommandOutcome,
    pub winning_outcome_id: String,
    /// Status checks made before the lock was observed.
    pub status_checks: u32,
}

pub struct Orchestrator<'a> {
    platform: &'a dyn PredictionPlatform,
    tokens: &'a dyn TokenSource,
    runner: &'a dyn CommandRunner,
    poll: PollPolicy,
    current: Phase,
    history: Vec<Phase>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        platform: &'a dyn PredictionPlatform,
        tokens: &'a dyn TokenSource,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            platform,
            tokens,
            runner,
            poll: PollPolicy::default(),
            current: Phase::Idle,
            history: vec![Phase::Idle],
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Current phase.
    pub fn phase(&self) -> &Phase {
        &self.current
    }

    /// Every phase entered so far, in order.
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    fn transition(&mut self, next: Phase) {
        info!(from = %self.current, to = %next, "Phase transition");
        self.history.push(next.clone());
        self.current = next;
    }

    fn fail(&mut self, err: RunError) -> RunError {
        error!(error = %err, "Run failed");
        self.transition(Phase::Failed(err.to_string()));
        err
    }

    /// Run the full lifecycle for one prediction.
    pub async fn run(&mut self, config: RunConfig) -> Result<RunReport, RunError> {
        let platform = self.platform;
        let tokens = self.tokens;
        let runner = self.runner;

        // 1. Token
        let token = match config.token {
            Some(token) => token,
            None => {
                self.transition(Phase::Authenticating);
                match tokens.acquire_token().await {
                    Ok(token) => token,
                    Err(e) => return Err(self.fail(RunError::Auth(e))),
                }
            }
        };

        // 2. Identity, then create
        let broadcaster_id = match platform.get_identity(&token).await {
            Ok(id) => id,
            Err(e) => return Err(self.fail(RunError::Identity(e))),
        };
        info!(user_id = %broadcaster_id, "Authenticated");

        let request = PredictionRequest {
            broadcaster_id,
            title: config.title,
            success_label: config.success_label,
            failure_label: config.failure_label,
            window_secs: config.window_secs,
        };
        let prediction = match platform.create_prediction(&token, &request).await {
            Ok(p) => p,
            Err(e) => return Err(self.fail(RunError::Create(e))),
        };
        self.transition(Phase::PredictionCreated);

        // 3. The platform's own countdown; no point polling before it ends.
        self.transition(Phase::AwaitingLock);
        info!(
            prediction = %prediction,
            "Prediction running. Command will run after {} seconds",
            request.window_secs
        );
        tokio::time::sleep(Duration::from_secs(u64::from(request.window_secs))).await;

        // 4. Wait for the lock
        let status_checks = self.await_lock(&token, &prediction).await?;
        self.transition(Phase::Locked);

        // 5. Command runs only once the lock is confirmed
        self.transition(Phase::CommandRunning);
        let outcome = runner.run(&config.command).await;
        let winning = winning_outcome_id(&prediction, outcome).to_string();
        info!(outcome = %outcome, winning_outcome_id = %winning, "Command finished");

        // 6. Resolve
        if let Err(e) = platform
            .resolve_prediction(&token, &prediction.broadcaster_id, &prediction.id, &winning)
            .await
        {
            return Err(self.fail(RunError::Resolve(e)));
        }
        self.transition(Phase::Resolved);
        info!(prediction_id = %prediction.id, outcome = %outcome, "Prediction Resolved");

        Ok(RunReport {
            prediction,
            outcome,
            winning_outcome_id: winning,
            status_checks,
        })
    }

    /// Poll until the prediction is locked. Returns the number of checks made.
    async fn await_lock(
        &mut self,
        token: &SecretString,
        prediction: &Prediction,
    ) -> Result<u32, RunError> {
        let platform = self.platform;

        for attempt in 1..=self.poll.max_attempts {
            tokio::time::sleep(self.poll.interval).await;

            match platform
                .query_status(token, &prediction.broadcaster_id, &prediction.id)
                .await
            {
                Ok(PredictionStatus::Locked) => {
                    debug!(attempt, "Prediction locked");
                    return Ok(attempt);
                }
                Ok(status @ (PredictionStatus::Resolved | PredictionStatus::Canceled)) => {
                    warn!(attempt, status = %status, "Prediction closed remotely, still waiting for lock");
                }
                Ok(status) => {
                    debug!(attempt, status = %status, "Prediction not locked yet");
                }
                Err(e) => return Err(self.fail(RunError::Status(e))),
            }
        }

        Err(self.fail(RunError::LockTimeout {
            attempts: self.poll.max_attempts,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
