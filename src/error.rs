//! Error types for parlance sessions

use thiserror::Error;

/// Result type alias for parlance operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in a parlance session
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Persona not found in the catalog
    #[error("persona not found: {0}")]
    PersonaNotFound(String),

    /// Speech capture capability missing or failed to start
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// Chat-completion request or response failure
    #[error("inference error: {0}")]
    Inference(String),

    /// Speech playback error
    #[error("playback error: {0}")]
    Playback(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
