//! Error types for Jarvis

use thiserror::Error;

/// Result type alias for Jarvis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Jarvis
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Utterance classification error
    #[error("NLU error: {0}")]
    Nlu(String),

    /// Process launch error
    #[error("launch error: {0}")]
    Launch(String),

    /// Status overlay server error
    #[error("api error: {0}")]
    Api(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
