//! TOML configuration file loading
//!
//! Supports `~/.config/parley/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{RecognitionFallback, SttProvider, TtsProvider};
use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ParleyConfigFile {
    /// What to do when speech recognition fails ("abort" or "sentinel")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recognition_fallback: Option<RecognitionFallback>,

    /// Language model configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Speech-to-text configuration
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Text-to-speech configuration
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Microphone capture configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Per-call timeouts
    #[serde(default)]
    pub timeouts: TimeoutsFileConfig,

    /// Log file configuration
    #[serde(default)]
    pub logging: LoggingFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gemini-1.5-flash-latest")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// API base URL override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Speech-to-text configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SttFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<SttProvider>,

    /// Provider model (e.g. "whisper-1", "nova-2")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Locale tag passed to the recognizer (e.g. "en-IN")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Text-to-speech configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TtsFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<TtsProvider>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Voice identifier (e.g. "alloy", or an ElevenLabs voice ID)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Speed multiplier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,

    /// Language tag for synthesis (e.g. "en")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Microphone capture configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AudioFileConfig {
    /// Enable microphone and speaker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// RMS level above which a chunk counts as speech
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_threshold: Option<f32>,

    /// Silence that ends an utterance, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause_secs: Option<f32>,

    /// Give up listening after this many seconds without speech
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_timeout_secs: Option<u64>,

    /// Cut an utterance off after this many seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_utterance_secs: Option<u64>,
}

/// Per-call timeouts, in seconds
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TimeoutsFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recognition_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis_secs: Option<u64>,
}

/// Log file configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingFileConfig {
    /// Path of the append-only log file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ApiKeysFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deepgram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevenlabs: Option<String>,
}

/// Read the TOML config file from `path`, or the standard path when `None`
///
/// A missing file at the standard path yields defaults. A missing file at an
/// explicit path is an error, as is one that can't be read or parsed.
///
/// # Errors
///
/// Returns `Error::Config` naming the file and the problem
pub fn read_config_file(path: Option<&Path>) -> Result<ParleyConfigFile> {
    let explicit = path.is_some();
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return Ok(ParleyConfigFile::default());
    };

    if !path.exists() {
        if explicit {
            return Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return Ok(ParleyConfigFile::default());
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;

    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Like [`read_config_file`], but logs a warning and falls back to defaults
pub fn load_config_file(path: Option<&Path>) -> ParleyConfigFile {
    read_config_file(path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring config file, using defaults");
        ParleyConfigFile::default()
    })
}

/// Write `config` to `path`, creating parent directories
///
/// # Errors
///
/// Returns error if serialization or the write fails
pub fn save_config_file(path: &Path, config: &ParleyConfigFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "wrote config file");
    Ok(())
}

/// Return the config file path: `~/.config/parley/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("parley").join("config.toml"))
}
