//! Configuration management for Parley
//!
//! Layers, lowest to highest: built-in defaults, the TOML file, environment.
//! Credentials only ever come from the file or the environment.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default Gemini model
pub const DEFAULT_LLM_MODEL: &str = "gemini-1.5-flash-latest";

/// Default recognizer locale
pub const DEFAULT_LOCALE: &str = "en-IN";

/// Default synthesis language
pub const DEFAULT_LANGUAGE: &str = "en";

/// Parley configuration
#[derive(Debug)]
pub struct Config {
    /// Language model configuration
    pub llm: LlmConfig,

    /// Speech-to-text configuration
    pub stt: SttConfig,

    /// Text-to-speech configuration
    pub tts: TtsConfig,

    /// Microphone and speaker configuration
    pub audio: AudioConfig,

    /// Per-call timeouts
    pub timeouts: TimeoutConfig,

    /// Behaviour when speech recognition fails
    pub recognition_fallback: RecognitionFallback,

    /// Append-only log file
    pub log_file: PathBuf,
}

/// Language model configuration
#[derive(Debug)]
pub struct LlmConfig {
    /// Model identifier, fixed for the lifetime of the process
    pub model: String,

    /// API base URL override
    pub base_url: Option<String>,

    /// Gemini API key (`GEMINI_API_KEY` or `GOOGLE_API_KEY`)
    pub api_key: Option<SecretString>,
}

/// Speech-to-text configuration
#[derive(Debug)]
pub struct SttConfig {
    pub provider: SttProvider,

    /// Provider model
    pub model: String,

    /// Locale tag (e.g. "en-IN")
    pub locale: String,

    pub base_url: Option<String>,

    /// Key for the selected provider
    pub api_key: Option<SecretString>,
}

/// Text-to-speech configuration
#[derive(Debug)]
pub struct TtsConfig {
    pub provider: TtsProvider,

    pub model: String,

    pub voice: String,

    /// Speed multiplier (0.25 to 4.0)
    pub speed: f32,

    /// Language tag (e.g. "en")
    pub language: String,

    pub base_url: Option<String>,

    /// Key for the selected provider (unused by Google)
    pub api_key: Option<SecretString>,
}

/// Microphone and speaker configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Enable microphone and speaker
    pub enabled: bool,

    /// RMS level above which a chunk counts as speech
    pub energy_threshold: f32,

    /// Silence that ends an utterance
    pub pause: Duration,

    /// Give up listening after this long without speech
    pub listen_timeout: Duration,

    /// Longest utterance kept before it is cut off
    pub max_utterance: Duration,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // ~300 on a 16-bit scale
            energy_threshold: 0.01,
            pause: Duration::from_secs(1),
            listen_timeout: Duration::from_secs(10),
            max_utterance: Duration::from_secs(20),
        }
    }
}

/// Upper bounds for each collaborator call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub recording: Duration,
    pub recognition: Duration,
    pub model: Duration,
    pub synthesis: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            recording: Duration::from_secs(30),
            recognition: Duration::from_secs(20),
            model: Duration::from_secs(60),
            synthesis: Duration::from_secs(30),
        }
    }
}

/// Speech-to-text backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SttProvider {
    /// `OpenAI` Whisper
    #[default]
    Whisper,
    Deepgram,
}

impl SttProvider {
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Whisper => "whisper-1",
            Self::Deepgram => "nova-2",
        }
    }
}

/// Text-to-speech backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    /// Google Translate speech endpoint (no key)
    #[default]
    Google,
    #[serde(rename = "openai")]
    OpenAi,
    ElevenLabs,
}

impl TtsProvider {
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Google => "",
            Self::OpenAi => "tts-1",
            Self::ElevenLabs => "eleven_multilingual_v2",
        }
    }

    #[must_use]
    pub const fn default_voice(self) -> &'static str {
        match self {
            Self::Google => "",
            Self::OpenAi => "alloy",
            Self::ElevenLabs => "21m00Tcm4TlvDq8N6MaR",
        }
    }
}

/// What a failed recognition turns into
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionFallback {
    /// Abort the turn with a warning
    #[default]
    Abort,
    /// Submit the literal sentinel transcript as if it had been spoken
    Sentinel,
}

impl Config {
    /// Load configuration from the file (standard path unless `path` is given)
    /// and the process environment
    ///
    /// A file that can't be used is replaced by defaults. The problem is
    /// returned alongside so the caller can log it once logging is up.
    pub fn load(path: Option<&Path>) -> (Result<Self>, Option<Error>) {
        let (fc, file_error) = match file::read_config_file(path) {
            Ok(fc) => (fc, None),
            Err(e) => (file::ParleyConfigFile::default(), Some(e)),
        };
        (Self::resolve(fc, |key| std::env::var(key).ok()), file_error)
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is out of range
    pub fn resolve(
        fc: file::ParleyConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        // API keys (env > toml > None)
        let gemini_key = env("GEMINI_API_KEY")
            .or_else(|| env("GOOGLE_API_KEY"))
            .or(fc.api_keys.gemini);
        let openai_key = env("OPENAI_API_KEY").or(fc.api_keys.openai);
        let deepgram_key = env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram);
        let elevenlabs_key = env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs);

        let llm = LlmConfig {
            model: fc
                .llm
                .model
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            base_url: fc.llm.base_url,
            api_key: secret(gemini_key),
        };

        let stt_provider = fc.stt.provider.unwrap_or_default();
        let locale = fc
            .stt
            .locale
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string());
        if locale.trim().is_empty() {
            return Err(Error::Config("stt.locale must not be empty".to_string()));
        }
        let stt = SttConfig {
            provider: stt_provider,
            model: fc
                .stt
                .model
                .unwrap_or_else(|| stt_provider.default_model().to_string()),
            locale,
            base_url: fc.stt.base_url,
            api_key: secret(match stt_provider {
                SttProvider::Whisper => openai_key.clone(),
                SttProvider::Deepgram => deepgram_key,
            }),
        };

        let tts_provider = fc.tts.provider.unwrap_or_default();
        let speed = fc.tts.speed.unwrap_or(1.0);
        if !(0.25..=4.0).contains(&speed) {
            return Err(Error::Config(format!(
                "tts.speed must be between 0.25 and 4.0, got {speed}"
            )));
        }
        let tts = TtsConfig {
            provider: tts_provider,
            model: fc
                .tts
                .model
                .unwrap_or_else(|| tts_provider.default_model().to_string()),
            voice: fc
                .tts
                .voice
                .unwrap_or_else(|| tts_provider.default_voice().to_string()),
            speed,
            language: fc
                .tts
                .language
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            base_url: fc.tts.base_url,
            api_key: secret(match tts_provider {
                TtsProvider::Google => None,
                TtsProvider::OpenAi => openai_key,
                TtsProvider::ElevenLabs => elevenlabs_key,
            }),
        };

        let defaults = AudioConfig::default();
        let pause = match fc.audio.pause_secs {
            Some(secs) if secs > 0.0 => Duration::try_from_secs_f32(secs).map_err(|e| {
                Error::Config(format!("audio.pause_secs is out of range ({secs}): {e}"))
            })?,
            Some(secs) => {
                return Err(Error::Config(format!(
                    "audio.pause_secs must be positive, got {secs}"
                )));
            }
            None => defaults.pause,
        };
        let audio = AudioConfig {
            enabled: fc.audio.enabled.unwrap_or(defaults.enabled),
            energy_threshold: fc
                .audio
                .energy_threshold
                .unwrap_or(defaults.energy_threshold),
            pause,
            listen_timeout: fc
                .audio
                .listen_timeout_secs
                .map_or(defaults.listen_timeout, Duration::from_secs),
            max_utterance: fc
                .audio
                .max_utterance_secs
                .map_or(defaults.max_utterance, Duration::from_secs),
        };

        let defaults = TimeoutConfig::default();
        let timeouts = TimeoutConfig {
            recording: fc
                .timeouts
                .recording_secs
                .map_or(defaults.recording, Duration::from_secs),
            recognition: fc
                .timeouts
                .recognition_secs
                .map_or(defaults.recognition, Duration::from_secs),
            model: fc
                .timeouts
                .model_secs
                .map_or(defaults.model, Duration::from_secs),
            synthesis: fc
                .timeouts
                .synthesis_secs
                .map_or(defaults.synthesis, Duration::from_secs),
        };

        let log_file = env("PARLEY_LOG_FILE")
            .map(PathBuf::from)
            .or(fc.logging.file)
            .unwrap_or_else(default_log_file);

        Ok(Self {
            llm,
            stt,
            tts,
            audio,
            timeouts,
            recognition_fallback: fc.recognition_fallback.unwrap_or_default(),
            log_file,
        })
    }
}

fn secret(value: Option<String>) -> Option<SecretString> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

/// Default log file: `~/.parley/logs/parley.log`
#[must_use]
pub fn default_log_file() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("logs").join("parley.log"),
        |dirs| dirs.home_dir().join(".parley").join("logs").join("parley.log"),
    )
}
