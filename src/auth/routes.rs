//! Callback route handlers.
//!
//! `GET /` serves the page that pulls the token out of the URL fragment;
//! `POST /auth` receives it. State is shared via `Arc<CallbackState>`.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::Html,
};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{info, warn};

use crate::types::AuthError;

/// The embedded callback page (compiled into the binary).
const INDEX_HTML: &str = include_str!("templates/index.html");

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Single-slot token receptacle plus the rendered callback page.
///
/// The sender is taken by the first valid callback, so the slot fills
/// exactly once.
pub struct CallbackState {
    sender: Mutex<Option<oneshot::Sender<SecretString>>>,
    page: String,
}

impl CallbackState {
    pub fn new(sender: oneshot::Sender<SecretString>, authorize_url: &str) -> Self {
        Self {
            sender: Mutex::new(Some(sender)),
            page: render_index(authorize_url),
        }
    }
}

pub type AppState = Arc<CallbackState>;

/// Body posted by the callback page.
#[derive(Debug, Deserialize)]
pub struct AuthCallback {
    pub token: String,
}

/// Fill the page template with the authorize URL.
pub fn render_index(authorize_url: &str) -> String {
    INDEX_HTML.replace("{{AUTHORIZE_URL}}", &authorize_url.replace('&', "&amp;"))
}

/// Parse a callback body. The page posts JSON but the content type is not
/// trusted, so the raw body is decoded here.
pub fn parse_callback(body: &[u8]) -> Result<AuthCallback, AuthError> {
    let callback: AuthCallback =
        serde_json::from_slice(body).map_err(|e| AuthError::BadCallbackPayload(e.to_string()))?;
    if callback.token.trim().is_empty() {
        return Err(AuthError::BadCallbackPayload("token was empty".to_string()));
    }
    Ok(callback)
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(state.page.clone())
}

/// POST /auth
pub async fn post_auth(State(state): State<AppState>, body: Bytes) -> (StatusCode, String) {
    let callback = match parse_callback(&body) {
        Ok(callback) => callback,
        Err(e) => {
            warn!(error = %e, "Rejected auth callback");
            return (StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let Some(sender) = state.sender.lock().await.take() else {
        warn!("Token already received, ignoring repeated auth callback");
        return (StatusCode::CONFLICT, "token already received".to_string());
    };

    if sender.send(SecretString::new(callback.token)).is_err() {
        warn!("Auth callback arrived after the handshake gave up");
        return (StatusCode::GONE, "no longer waiting for a token".to_string());
    }

    info!("Token received from browser");
    (StatusCode::OK, "ok".to_string())
}
