//! Error types for Parley

use thiserror::Error;

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Parley
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Rejected user input (empty or whitespace-only)
    #[error("validation error: {0}")]
    Validation(String),

    /// Speech was captured but nothing intelligible came back
    #[error("speech was unintelligible")]
    Unintelligible,

    /// Speech-to-text service error
    #[error("STT error: {0}")]
    Stt(String),

    /// Requested language model is not available for this key or region
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// Language model transport or protocol error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Audio device or codec error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML writing error
    #[error("toml error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Coarse failure families surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Empty input
    Validation,
    /// Unintelligible speech or recognizer service failure
    Recognition,
    /// Model unavailable or transport failure
    Model,
    /// Synthesis, codec or output device failure
    Playback,
    /// Everything else (config, IO)
    Other,
}

impl Error {
    /// Classify this error into its user-facing family
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Unintelligible | Self::Stt(_) => ErrorKind::Recognition,
            Self::ModelUnavailable(_) | Self::Llm(_) => ErrorKind::Model,
            Self::Tts(_) | Self::Audio(_) => ErrorKind::Playback,
            Self::Config(_)
            | Self::Io(_)
            | Self::Http(_)
            | Self::Serialization(_)
            | Self::Toml(_)
            | Self::TomlSerialize(_) => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::Validation(String::new()).kind(), ErrorKind::Validation);
        assert_eq!(Error::Unintelligible.kind(), ErrorKind::Recognition);
        assert_eq!(Error::Stt("down".into()).kind(), ErrorKind::Recognition);
        assert_eq!(Error::ModelUnavailable("x".into()).kind(), ErrorKind::Model);
        assert_eq!(Error::Llm("reset".into()).kind(), ErrorKind::Model);
        assert_eq!(Error::Tts("x".into()).kind(), ErrorKind::Playback);
        assert_eq!(Error::Audio("no device".into()).kind(), ErrorKind::Playback);
        assert_eq!(Error::Config("x".into()).kind(), ErrorKind::Other);
    }
}
