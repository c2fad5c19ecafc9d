//! Platform integrations.
//!
//! Defines the `PredictionPlatform` trait the orchestrator drives, and the
//! Twitch Helix implementation of it.

pub mod twitch;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::types::{PlatformError, Prediction, PredictionStatus};

/// What to create: the title, the two outcome labels and the window.
///
/// Outcomes are always submitted as `[success_label, failure_label]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRequest {
    pub broadcaster_id: String,
    pub title: String,
    pub success_label: String,
    pub failure_label: String,
    pub window_secs: u32,
}

/// The four remote operations a prediction run needs.
///
/// Every call is authorised with the caller's bearer token. Implementors
/// do not retry; each failure is reported as a distinct `PlatformError`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PredictionPlatform: Send + Sync {
    /// Look up the account id of the token's owner.
    async fn get_identity(&self, token: &SecretString) -> Result<String, PlatformError>;

    /// Open a new prediction and return its ids.
    async fn create_prediction(
        &self,
        token: &SecretString,
        request: &PredictionRequest,
    ) -> Result<Prediction, PlatformError>;

    /// Current status of an existing prediction.
    async fn query_status(
        &self,
        token: &SecretString,
        broadcaster_id: &str,
        prediction_id: &str,
    ) -> Result<PredictionStatus, PlatformError>;

    /// Close the prediction with the given winning outcome.
    async fn resolve_prediction(
        &self,
        token: &SecretString,
        broadcaster_id: &str,
        prediction_id: &str,
        winning_outcome_id: &str,
    ) -> Result<(), PlatformError>;
}
