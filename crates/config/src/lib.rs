//! Environment configuration for the dropship daemon.

use std::path::PathBuf;

/// Bot API token used to authenticate the endpoint session.
pub const ENV_BOT_TOKEN: &str = "DROPSHIP_BOT_TOKEN";
/// Recipient chat identifier for documents and notifications.
pub const ENV_CHAT_ID: &str = "DROPSHIP_CHAT_ID";
/// Directory watched for deposited archives (non-recursive).
pub const ENV_WATCH_DIR: &str = "DROPSHIP_WATCH_DIR";
/// Optional source image for the companion thumbnail.
pub const ENV_THUMB: &str = "DROPSHIP_THUMB";

/// Daemon configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub chat_id: String,
    pub watch_dir: PathBuf,
    pub thumbnail_source: Option<PathBuf>,
}

/// Errors from configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing or empty environment variable {0}")]
    Missing(&'static str),

    #[error("watch directory does not exist or is not a directory: {0}")]
    BadWatchDir(String),
}

impl Config {
    /// Loads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Inner implementation that accepts a variable lookup for testability.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token = require(&lookup, ENV_BOT_TOKEN)?;
        let chat_id = require(&lookup, ENV_CHAT_ID)?;

        let watch_dir = PathBuf::from(require(&lookup, ENV_WATCH_DIR)?);
        if !watch_dir.is_dir() {
            return Err(ConfigError::BadWatchDir(watch_dir.display().to_string()));
        }

        let thumbnail_source = lookup(ENV_THUMB)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            bot_token,
            chat_id,
            watch_dir,
            thumbnail_source,
        })
    }
}

fn require(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    lookup(name)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}
