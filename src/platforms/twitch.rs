//! Twitch Helix predictions integration.
//!
//! API docs: https://dev.twitch.tv/docs/api/reference/#create-prediction
//! Base URL: https://api.twitch.tv/helix
//! Auth: `Authorization: Bearer {user token}` plus `Client-Id: {app id}`.
//! Scope: `channel:manage:predictions`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{PredictionPlatform, PredictionRequest};
use crate::types::{PlatformError, Prediction, PredictionStatus};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://api.twitch.tv/helix";

const OP_GET_IDENTITY: &str = "get identity";
const OP_CREATE: &str = "create prediction";
const OP_STATUS: &str = "query prediction status";
const OP_RESOLVE: &str = "resolve prediction";

// ---------------------------------------------------------------------------
// API types (Helix JSON <-> Rust)
// ---------------------------------------------------------------------------

/// Every Helix response wraps its payload in a `data` array.
#[derive(Debug, Deserialize)]
struct HelixResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct HelixUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct HelixOutcome {
    id: String,
}

/// Shape returned by create, get and end prediction. Only the fields we
/// use are deserialized.
#[derive(Debug, Deserialize)]
struct HelixPrediction {
    id: String,
    #[serde(default)]
    broadcaster_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    outcomes: Vec<HelixOutcome>,
    status: PredictionStatus,
    #[serde(default)]
    prediction_window: u32,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct OutcomeTitle<'a> {
    title: &'a str,
}

#[derive(Debug, Serialize)]
struct CreatePredictionBody<'a> {
    broadcaster_id: &'a str,
    title: &'a str,
    outcomes: [OutcomeTitle<'a>; 2],
    prediction_window: u32,
}

#[derive(Debug, Serialize)]
struct ResolvePredictionBody<'a> {
    broadcaster_id: &'a str,
    id: &'a str,
    status: PredictionStatus,
    winning_outcome_id: &'a str,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Twitch Helix client for the prediction resource.
pub struct TwitchClient {
    http: Client,
    client_id: String,
    base_url: String,
}

impl TwitchClient {
    /// Create a client against the public Helix API.
    pub fn new(client_id: impl Into<String>) -> Result<Self> {
        Self::with_base_url(client_id, DEFAULT_BASE_URL)
    }

    /// Create a client against a different base URL (a mock server in tests).
    pub fn with_base_url(client_id: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("will-it-blend/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for Twitch")?;

        Ok(Self {
            http,
            client_id: client_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    // -- Internal helpers ------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, builder: RequestBuilder, token: &SecretString) -> RequestBuilder {
        builder
            .bearer_auth(token.expose_secret())
            .header("Client-Id", &self.client_id)
    }

    /// Send a request and return the body of a 200 response.
    async fn send(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
    ) -> Result<String, PlatformError> {
        let resp = builder
            .send()
            .await
            .map_err(|source| PlatformError::RequestFailed { operation, source })?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            debug!(operation, status = %status, body = %body, "Twitch request rejected");
            return Err(if status == StatusCode::UNAUTHORIZED {
                PlatformError::Unauthorized { operation, body }
            } else {
                PlatformError::NonSuccessStatus {
                    operation,
                    status: status.as_u16(),
                    body,
                }
            });
        }

        resp.text()
            .await
            .map_err(|source| PlatformError::RequestFailed { operation, source })
    }

    /// Decode a Helix envelope and take its first element.
    fn first<T: DeserializeOwned>(operation: &'static str, body: &str) -> Result<T, PlatformError> {
        let envelope: HelixResponse<T> = serde_json::from_str(body)
            .map_err(|source| PlatformError::DecodeFailed { operation, source })?;

        envelope
            .data
            .into_iter()
            .next()
            .ok_or(PlatformError::EmptyResponseData { operation })
    }

    /// Bind the echoed outcomes by position: first is success, second is
    /// failure. Anything other than exactly two outcomes is rejected.
    fn to_prediction(
        raw: HelixPrediction,
        request: &PredictionRequest,
    ) -> Result<Prediction, PlatformError> {
        let count = raw.outcomes.len();
        let [success, failure]: [HelixOutcome; 2] = raw
            .outcomes
            .try_into()
            .map_err(|_| PlatformError::UnexpectedOutcomeCount {
                operation: OP_CREATE,
                count,
            })?;

        Ok(Prediction {
            id: raw.id,
            broadcaster_id: if raw.broadcaster_id.is_empty() {
                request.broadcaster_id.clone()
            } else {
                raw.broadcaster_id
            },
            title: if raw.title.is_empty() {
                request.title.clone()
            } else {
                raw.title
            },
            window_secs: if raw.prediction_window == 0 {
                request.window_secs
            } else {
                raw.prediction_window
            },
            success_outcome_id: success.id,
            failure_outcome_id: failure.id,
            status: raw.status,
            created_at: raw.created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// PredictionPlatform trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl PredictionPlatform for TwitchClient {
    async fn get_identity(&self, token: &SecretString) -> Result<String, PlatformError> {
        let req = self.authorized(self.http.get(self.url("/users")), token);
        let body = self.send(OP_GET_IDENTITY, req).await?;
        let user: HelixUser = Self::first(OP_GET_IDENTITY, &body)?;

        debug!(user_id = %user.id, "Twitch identity resolved");
        Ok(user.id)
    }

    async fn create_prediction(
        &self,
        token: &SecretString,
        request: &PredictionRequest,
    ) -> Result<Prediction, PlatformError> {
        let payload = CreatePredictionBody {
            broadcaster_id: &request.broadcaster_id,
            title: &request.title,
            outcomes: [
                OutcomeTitle {
                    title: &request.success_label,
                },
                OutcomeTitle {
                    title: &request.failure_label,
                },
            ],
            prediction_window: request.window_secs,
        };

        let req = self
            .authorized(self.http.post(self.url("/predictions")), token)
            .json(&payload);
        let body = self.send(OP_CREATE, req).await?;
        let raw: HelixPrediction = Self::first(OP_CREATE, &body)?;
        let prediction = Self::to_prediction(raw, request)?;

        info!(
            prediction_id = %prediction.id,
            success_outcome = %prediction.success_outcome_id,
            failure_outcome = %prediction.failure_outcome_id,
            window_secs = prediction.window_secs,
            "Twitch prediction created"
        );
        Ok(prediction)
    }

    async fn query_status(
        &self,
        token: &SecretString,
        broadcaster_id: &str,
        prediction_id: &str,
    ) -> Result<PredictionStatus, PlatformError> {
        let req = self
            .authorized(self.http.get(self.url("/predictions")), token)
            .query(&[("id", prediction_id), ("broadcaster_id", broadcaster_id)]);
        let body = self.send(OP_STATUS, req).await?;
        let raw: HelixPrediction = Self::first(OP_STATUS, &body)?;

        debug!(prediction_id, status = %raw.status, "Twitch prediction status");
        Ok(raw.status)
    }

    async fn resolve_prediction(
        &self,
        token: &SecretString,
        broadcaster_id: &str,
        prediction_id: &str,
        winning_outcome_id: &str,
    ) -> Result<(), PlatformError> {
        let payload = ResolvePredictionBody {
            broadcaster_id,
            id: prediction_id,
            status: PredictionStatus::Resolved,
            winning_outcome_id,
        };

        let req = self
            .authorized(self.http.patch(self.url("/predictions")), token)
            .json(&payload);
        self.send(OP_RESOLVE, req).await?;

        info!(prediction_id, winning_outcome_id, "Twitch prediction resolved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
