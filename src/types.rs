//! Shared types for will-it-blend.
//!
//! The data model used by the auth handshake, the platform client and the
//! orchestrator, plus the error types each of them reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Allowed callback ports
// ---------------------------------------------------------------------------

/// Ports registered as OAuth redirect targets for the application.
/// The platform rejects redirects to anything else.
pub const ALLOWED_PORTS: [u16; 9] = [1337, 3000, 4242, 6666, 6969, 8000, 8008, 8080, 42069];

/// A local port that is on the OAuth redirect allow-list.
///
/// The only way to build one is through `TryFrom<u16>` / `FromStr`, so a
/// value of this type is always safe to hand to the auth handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct AllowedPort(u16);

impl AllowedPort {
    pub const DEFAULT: AllowedPort = AllowedPort(42069);

    pub fn get(self) -> u16 {
        self.0
    }
}

impl Default for AllowedPort {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u16> for AllowedPort {
    type Error = ConfigError;

    fn try_from(port: u16) -> Result<Self, Self::Error> {
        if ALLOWED_PORTS.contains(&port) {
            Ok(Self(port))
        } else {
            Err(ConfigError::PortNotAllowed(port.to_string()))
        }
    }
}

impl From<AllowedPort> for u16 {
    fn from(port: AllowedPort) -> Self {
        port.0
    }
}

impl FromStr for AllowedPort {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let port: u16 = s
            .trim()
            .parse()
            .map_err(|_| ConfigError::PortNotAllowed(s.to_string()))?;
        Self::try_from(port)
    }
}

impl fmt::Display for AllowedPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

/// Lifecycle status of a remote prediction, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictionStatus {
    Active,
    Locked,
    Resolved,
    Canceled,
    /// Any status string this client does not know about.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionStatus::Active => write!(f, "ACTIVE"),
            PredictionStatus::Locked => write!(f, "LOCKED"),
            PredictionStatus::Resolved => write!(f, "RESOLVED"),
            PredictionStatus::Canceled => write!(f, "CANCELED"),
            PredictionStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Local copy of a prediction created on the platform.
///
/// The platform owns the resource; this holds the ids needed to poll and
/// resolve it. `success_outcome_id` is the first outcome the platform
/// echoed back and `failure_outcome_id` the second, matching the order
/// in which they were submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub broadcaster_id: String,
    pub title: String,
    /// Prediction window in seconds.
    pub window_secs: u32,
    pub success_outcome_id: String,
    pub failure_outcome_id: String,
    pub status: PredictionStatus,
    pub created_at: Option<DateTime<Utc>>,
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] \"{}\" ({}s window, {})",
            self.id, self.title, self.window_secs, self.status,
        )
    }
}

impl Prediction {
    /// Helper to build a test prediction with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        Prediction {
            id: "pred-001".to_string(),
            broadcaster_id: "1234".to_string(),
            title: "Will it blend?".to_string(),
            window_secs: 60,
            success_outcome_id: "outcome-yes".to_string(),
            failure_outcome_id: "outcome-no".to_string(),
            status: PredictionStatus::Active,
            created_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Command outcome
// ---------------------------------------------------------------------------

/// Binary result of running the user's command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Succeeded,
    Failed,
}

impl CommandOutcome {
    pub fn is_success(self) -> bool {
        self == CommandOutcome::Succeeded
    }
}

impl From<bool> for CommandOutcome {
    fn from(success: bool) -> Self {
        if success {
            CommandOutcome::Succeeded
        } else {
            CommandOutcome::Failed
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::Succeeded => write!(f, "succeeded"),
            CommandOutcome::Failed => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Invalid or missing settings, detected before any network call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "port {0} is not allowed: must be one of 1337, 3000, 4242, 6666, 6969, 8000, 8008, 8080, or 42069"
    )]
    PortNotAllowed(String),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Failures of the browser-based token handshake.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Could not start auth server at localhost:{port}: {source}")]
    BindFailure {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not open browser for Twitch OAuth flow: {0}")]
    BrowserLaunchFailure(#[source] std::io::Error),

    #[error("Auth callback body must be {{\"token\": string}}: {0}")]
    BadCallbackPayload(String),

    #[error("No OAuth callback received within {0:?}")]
    Timeout(Duration),

    #[error("Auth server stopped before a token was received")]
    ServerClosed,
}

/// Failures of a single platform REST call. `operation` names the call.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("{operation}: request failed: {source}")]
    RequestFailed {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation}: unauthorized (401): {body}")]
    Unauthorized { operation: &'static str, body: String },

    #[error("{operation}: platform returned {status}: {body}")]
    NonSuccessStatus {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("{operation}: failed to decode response body: {source}")]
    DecodeFailed {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{operation}: response data was empty")]
    EmptyResponseData { operation: &'static str },

    #[error("{operation}: expected exactly 2 outcomes, platform returned {count}")]
    UnexpectedOutcomeCount { operation: &'static str, count: usize },
}

/// Terminal failure of an orchestration run, one variant per phase.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Error authenticating with Twitch: {0}")]
    Auth(AuthError),

    #[error("Error getting user ID: {0}")]
    Identity(PlatformError),

    #[error("Error creating prediction: {0}")]
    Create(PlatformError),

    #[error("Error checking prediction status: {0}")]
    Status(PlatformError),

    #[error("Prediction did not lock as expected after {attempts} status checks")]
    LockTimeout { attempts: u32 },

    #[error("Error resolving prediction: {0}")]
    Resolve(PlatformError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
