//! Browser-based Twitch OAuth (implicit grant) handshake.
//!
//! Starts a short-lived callback server on an allow-listed localhost port,
//! opens the user's browser at the authorize URL and waits for the page to
//! post the token back. The server is shut down as soon as the token
//! arrives, the wait times out, or the browser cannot be opened.

pub mod routes;

use async_trait::async_trait;
use axum::{
    routing::{get, post},
    Router,
};
use secrecy::SecretString;
use std::net::SocketAddr;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::types::{AllowedPort, AuthError};
use routes::{AppState, CallbackState};

pub const AUTHORIZE_URL: &str = "https://id.twitch.tv/oauth2/authorize";
pub const PREDICTIONS_SCOPE: &str = "channel:manage:predictions";

/// How long to wait for the browser to post a token back.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// How long the callback server gets to drain after shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Opens a URL in the user's browser.
pub type BrowserLauncher = fn(&str) -> std::io::Result<()>;

/// Something that can produce a bearer token for the platform.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn acquire_token(&self) -> Result<SecretString, AuthError>;
}

/// Build the callback router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/auth", post(routes::post_auth))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// One OAuth session: port, client id, scope and the wait policy.
pub struct AuthHandshake {
    port: AllowedPort,
    client_id: String,
    scope: String,
    timeout: Duration,
    launch_browser: BrowserLauncher,
}

impl AuthHandshake {
    pub fn new(port: AllowedPort, client_id: impl Into<String>) -> Self {
        Self {
            port,
            client_id: client_id.into(),
            scope: PREDICTIONS_SCOPE.to_string(),
            timeout: DEFAULT_CALLBACK_TIMEOUT,
            launch_browser: open_browser,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_browser_launcher(mut self, launcher: BrowserLauncher) -> Self {
        self.launch_browser = launcher;
        self
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    pub fn authorize_url(&self) -> String {
        format!(
            "{AUTHORIZE_URL}?client_id={}&redirect_uri={}&response_type=token&scope={}",
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri()),
            urlencoding::encode(&self.scope),
        )
    }

    /// Run the handshake and return the token posted by the browser.
    pub async fn acquire_token(&self) -> Result<SecretString, AuthError> {
        let port = self.port.get();
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| AuthError::BindFailure { port, source })?;

        let url = self.authorize_url();
        let (token_tx, token_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = build_router(Arc::new(CallbackState::new(token_tx, &url)));

        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });
        info!("Auth server started at http://localhost:{port}");

        let result = self.wait_for_token(&url, token_rx).await;

        // Free the port before anyone proceeds.
        let _ = shutdown_tx.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
            Ok(Ok(Ok(()))) => debug!(port, "Auth server stopped"),
            Ok(Ok(Err(e))) => warn!(port, error = %e, "Auth server exited with error"),
            Ok(Err(e)) => warn!(port, error = %e, "Auth server task failed"),
            Err(_) => {
                warn!(port, "Auth server did not stop in time, aborting");
                server.abort();
            }
        }

        result
    }

    async fn wait_for_token(
        &self,
        url: &str,
        token_rx: oneshot::Receiver<SecretString>,
    ) -> Result<SecretString, AuthError> {
        info!("Opening browser for Twitch OAuth flow.");
        info!(url = %url, "If no browser opens, visit this URL to log in");
        (self.launch_browser)(url).map_err(AuthError::BrowserLaunchFailure)?;

        match tokio::time::timeout(self.timeout, token_rx).await {
            Ok(Ok(token)) => Ok(token),
            Ok(Err(_)) => Err(AuthError::ServerClosed),
            Err(_) => Err(AuthError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl TokenSource for AuthHandshake {
    async fn acquire_token(&self) -> Result<SecretString, AuthError> {
        AuthHandshake::acquire_token(self).await
    }
}

/// Open `url` with the platform's default URL handler.
pub fn open_browser(url: &str) -> std::io::Result<()> {
    let mut cmd = match std::env::consts::OS {
        "macos" => {
            let mut c = Command::new("open");
            c.arg(url);
            c
        }
        "windows" => {
            let mut c = Command::new("rundll32");
            c.arg("url.dll,FileProtocolHandler").arg(url);
            c
        }
        "linux" | "freebsd" | "openbsd" | "netbsd" | "dragonfly" => {
            let mut c = Command::new("xdg-open");
            c.arg(url);
            c
        }
        other => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                format!("no browser launcher for platform {other}"),
            ))
        }
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
