//! Configuration: command-line flags, environment variables and an
//! optional TOML file.
//!
//! Precedence, highest first: flag, `WILL_IT_BLEND_*` environment variable,
//! config file (`~/.config/will-it-blend.toml` unless `--config` says
//! otherwise), built-in default. Everything is validated here so the
//! orchestrator only ever sees a usable configuration.

use anyhow::{Context, Result};
use clap::Parser;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::engine::orchestrator::RunConfig;
use crate::platforms::twitch::DEFAULT_BASE_URL;
use crate::types::{AllowedPort, ConfigError};

pub const DEFAULT_TITLE: &str = "Will it blend?";
pub const DEFAULT_DURATION_SECS: u32 = 60;
pub const DEFAULT_SUCCESS_LABEL: &str = "Yes";
pub const DEFAULT_FAILURE_LABEL: &str = "No";

/// Config file name under `~/.config`.
pub const CONFIG_FILE_NAME: &str = "will-it-blend.toml";

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Create a Twitch prediction, run a command, and resolve the prediction
/// from the command's exit status.
#[derive(Debug, Parser)]
#[command(name = "will-it-blend", version)]
#[command(after_help = "Example:\n  will-it-blend \"ls -a\"")]
pub struct CliArgs {
    /// Command to run once the prediction has locked
    pub command: String,

    /// Config file (default is $HOME/.config/will-it-blend.toml)
    #[arg(short, long, env = "WILL_IT_BLEND_CONFIG")]
    pub config: Option<PathBuf>,

    /// Prediction title
    #[arg(short, long, env = "WILL_IT_BLEND_TITLE")]
    pub title: Option<String>,

    /// Prediction window in seconds
    #[arg(short, long, env = "WILL_IT_BLEND_DURATION")]
    pub duration: Option<u32>,

    /// Outcome label used when the command succeeds
    #[arg(short, long, env = "WILL_IT_BLEND_SUCCESS")]
    pub success: Option<String>,

    /// Outcome label used when the command fails
    #[arg(short, long, env = "WILL_IT_BLEND_FAILURE")]
    pub failure: Option<String>,

    /// Local port for the OAuth callback: 1337, 3000, 4242, 6666, 6969, 8000, 8008, 8080 or 42069
    #[arg(short, long, env = "WILL_IT_BLEND_PORT")]
    pub port: Option<AllowedPort>,

    /// Twitch user access token; skips the browser login when set
    #[arg(long, env = "WILL_IT_BLEND_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Twitch application client id
    #[arg(long, env = "WILL_IT_BLEND_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Helix API base URL
    #[arg(long, env = "WILL_IT_BLEND_API_URL", hide = true)]
    pub api_base_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Config file
// ---------------------------------------------------------------------------

/// Contents of the TOML config file. Every key is optional.
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub title: Option<String>,
    pub duration: Option<u32>,
    pub success: Option<String>,
    pub failure: Option<String>,
    pub port: Option<AllowedPort>,
    pub token: Option<String>,
    pub client_id: Option<String>,
    pub api_base_url: Option<String>,
}

impl FileConfig {
    /// Load a config file. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file found");
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: FileConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!(path = %path.display(), "Using config file");
        Ok(Some(config))
    }
}

/// Explicit path if given, otherwise `~/.config/will-it-blend.toml`.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => home::home_dir().map(|home| home.join(".config").join(CONFIG_FILE_NAME)),
    }
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved and validated settings for one invocation.
#[derive(Debug)]
pub struct AppConfig {
    pub title: String,
    pub duration_secs: u32,
    pub success_label: String,
    pub failure_label: String,
    pub port: AllowedPort,
    pub token: Option<SecretString>,
    pub client_id: String,
    pub api_base_url: String,
}

impl AppConfig {
    /// Merge flags over the config file over defaults, then validate.
    pub fn resolve(args: &CliArgs, file: FileConfig) -> Result<Self, ConfigError> {
        let title = args
            .title
            .clone()
            .or(file.title)
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let duration_secs = args
            .duration
            .or(file.duration)
            .unwrap_or(DEFAULT_DURATION_SECS);
        let success_label = args
            .success
            .clone()
            .or(file.success)
            .unwrap_or_else(|| DEFAULT_SUCCESS_LABEL.to_string());
        let failure_label = args
            .failure
            .clone()
            .or(file.failure)
            .unwrap_or_else(|| DEFAULT_FAILURE_LABEL.to_string());
        let port = args.port.or(file.port).unwrap_or_default();
        let token = args
            .token
            .clone()
            .or(file.token)
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::new);
        let client_id = args
            .client_id
            .clone()
            .or(file.client_id)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ConfigError::Missing("client_id"))?;
        let api_base_url = args
            .api_base_url
            .clone()
            .or(file.api_base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        if duration_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "duration",
                message: "must be at least 1 second".to_string(),
            });
        }
        for (field, value) in [
            ("title", &title),
            ("success", &success_label),
            ("failure", &failure_label),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field,
                    message: "must not be empty".to_string(),
                });
            }
        }

        Ok(Self {
            title,
            duration_secs,
            success_label,
            failure_label,
            port,
            token,
            client_id,
            api_base_url,
        })
    }

    /// Hand the prediction settings to the orchestrator.
    pub fn into_run_config(self, command: String) -> RunConfig {
        RunConfig {
            title: self.title,
            window_secs: self.duration_secs,
            success_label: self.success_label,
            failure_label: self.failure_label,
            command,
            token: self.token,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
