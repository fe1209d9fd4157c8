//! Configuration for parlance sessions

use std::path::PathBuf;
use std::time::Duration;

use crate::persona::PersonaCatalog;
use crate::Result;

/// Default chat-completion endpoint (local Ollama)
pub const DEFAULT_CHAT_URL: &str = "http://localhost:11434/api/chat";

/// Default chat model
pub const DEFAULT_MODEL: &str = "llama3";

/// Default capture/playback locale (BCP 47)
pub const DEFAULT_LOCALE: &str = "en-US";

/// Default settle delay before the stop-capture step reads the buffer
pub const DEFAULT_STOP_SETTLE_MS: u64 = 300;

/// Default chat-completion request timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Session configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat-completion endpoint URL
    pub chat_url: String,

    /// Model identifier sent with every request
    pub model: String,

    /// Active locale for capture and playback, fixed per session
    pub locale: String,

    /// Settle delay between the stop-capture request and reading the
    /// buffer, giving trailing interim results time to land
    pub stop_settle: Duration,

    /// Chat-completion request timeout; expiry is an inference failure
    pub request_timeout: Duration,

    /// Persona catalog path; the embedded catalog is used when `None`
    pub persona_catalog: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chat_url: DEFAULT_CHAT_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            stop_settle: Duration::from_millis(DEFAULT_STOP_SETTLE_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            persona_catalog: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable
    #[must_use]
    pub fn load() -> Self {
        let defaults = Self::default();

        Self {
            chat_url: std::env::var("PARLANCE_CHAT_URL").unwrap_or(defaults.chat_url),
            model: std::env::var("PARLANCE_MODEL").unwrap_or(defaults.model),
            locale: std::env::var("PARLANCE_LOCALE").unwrap_or(defaults.locale),
            stop_settle: env_millis("PARLANCE_STOP_SETTLE_MS").unwrap_or(defaults.stop_settle),
            request_timeout: env_secs("PARLANCE_REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout),
            persona_catalog: std::env::var("PARLANCE_PERSONA_CATALOG")
                .ok()
                .map(PathBuf::from)
                .or_else(default_catalog_path),
        }
    }

    /// Load the persona catalog this configuration points at
    ///
    /// # Errors
    ///
    /// Returns an error if the configured file cannot be read or parsed,
    /// or if the embedded fallback is malformed.
    pub fn catalog(&self) -> Result<PersonaCatalog> {
        match &self.persona_catalog {
            Some(path) => PersonaCatalog::load(path),
            None => PersonaCatalog::embedded(),
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key).ok()?.parse().ok().map(Duration::from_millis)
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key).ok()?.parse().ok().map(Duration::from_secs)
}

/// Catalog path under the user config directory, if a file is present there
///
/// Uses `~/.config/parlance/catalog.json` on Linux
fn default_catalog_path() -> Option<PathBuf> {
    let path = directories::ProjectDirs::from("dev", "parlance", "parlance")
        .map(|d| d.config_dir().join("catalog.json"))?;
    path.exists().then_some(path)
}
