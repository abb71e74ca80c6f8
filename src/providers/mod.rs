//! External collaborators
//!
//! Every cloud service and audio device the controller talks to sits behind
//! one of these traits, so the controller can be driven by real clients or by
//! test doubles.

mod gemini;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, SttProvider, TtsProvider};
use crate::voice::{AudioCapture, AudioPlayback, SpeechToText, TextToSpeech};
use crate::{Error, Result};

pub use gemini::GeminiClient;

/// Records one utterance from an input device
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Record until the speaker pauses, returning a WAV clip
    async fn record(&self) -> Result<Vec<u8>>;
}

/// Converts a recorded clip to text
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Transcribe a WAV clip spoken in `locale` (e.g. "en-IN")
    ///
    /// Returns `Error::Unintelligible` when nothing could be recognized and
    /// `Error::Stt` when the service could not be reached
    async fn transcribe(&self, wav: &[u8], locale: &str) -> Result<String>;
}

/// Generates a reply for a prompt
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Fixed model identity, for display
    fn model_name(&self) -> &str;

    /// Generate a reply
    ///
    /// Returns `Error::ModelUnavailable` when the model cannot be used with
    /// this credential and `Error::Llm` for transport failures
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Converts text to an audio clip
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` in `language`, returning MP3 bytes
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>>;
}

/// Plays an audio clip on an output device
#[async_trait]
pub trait Player: Send + Sync {
    /// Play an MP3 clip until it ends or `cancel` fires
    async fn play(&self, clip: Vec<u8>, cancel: CancellationToken) -> Result<()>;
}

/// Stand-in for a voice collaborator that could not be set up
///
/// Every call fails with the stored reason.
#[derive(Debug, Clone)]
pub struct Unconfigured {
    reason: String,
}

impl Unconfigured {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Microphone for Unconfigured {
    async fn record(&self) -> Result<Vec<u8>> {
        Err(Error::Audio(self.reason.clone()))
    }
}

#[async_trait]
impl Recognizer for Unconfigured {
    async fn transcribe(&self, _wav: &[u8], _locale: &str) -> Result<String> {
        Err(Error::Stt(self.reason.clone()))
    }
}

#[async_trait]
impl LanguageModel for Unconfigured {
    fn model_name(&self) -> &str {
        "unconfigured"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(Error::ModelUnavailable(self.reason.clone()))
    }
}

#[async_trait]
impl Synthesizer for Unconfigured {
    async fn synthesize(&self, _text: &str, _language: &str) -> Result<Vec<u8>> {
        Err(Error::Tts(self.reason.clone()))
    }
}

#[async_trait]
impl Player for Unconfigured {
    async fn play(&self, _clip: Vec<u8>, _cancel: CancellationToken) -> Result<()> {
        Err(Error::Audio(self.reason.clone()))
    }
}

/// The full set of collaborators a controller needs
#[derive(Clone)]
pub struct Collaborators {
    pub microphone: Arc<dyn Microphone>,
    pub recognizer: Arc<dyn Recognizer>,
    pub model: Arc<dyn LanguageModel>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub player: Arc<dyn Player>,
}

impl Collaborators {
    /// Build real clients from configuration
    ///
    /// The language model is mandatory. Voice collaborators that cannot be
    /// set up (missing key, no audio device, voice disabled) are replaced by
    /// [`Unconfigured`] so text chat keeps working.
    ///
    /// # Errors
    ///
    /// Returns error if the language model credential is missing
    pub fn from_config(config: &Config, voice_enabled: bool) -> Result<Self> {
        let key = config.llm.api_key.as_ref().ok_or_else(|| {
            Error::Config("Gemini API key required: set GEMINI_API_KEY".to_string())
        })?;
        let mut gemini =
            GeminiClient::new(key.expose_secret().to_string(), config.llm.model.clone())?;
        if let Some(url) = &config.llm.base_url {
            gemini = gemini.with_base_url(url.clone());
        }
        let model: Arc<dyn LanguageModel> = Arc::new(gemini);

        if !voice_enabled || !config.audio.enabled {
            tracing::info!("voice disabled - text chat only");
            let off = Arc::new(Unconfigured::new("voice is disabled"));
            return Ok(Self {
                microphone: off.clone(),
                recognizer: off.clone(),
                model,
                synthesizer: off.clone(),
                player: off,
            });
        }

        Ok(Self {
            microphone: microphone(config),
            recognizer: recognizer(config),
            model,
            synthesizer: synthesizer(config),
            player: player(),
        })
    }
}

/// Microphone from configuration, or [`Unconfigured`] if no input device opens
pub fn microphone(config: &Config) -> Arc<dyn Microphone> {
    match AudioCapture::new(config.audio.clone()) {
        Ok(capture) => Arc::new(capture),
        Err(e) => {
            tracing::warn!(error = %e, "microphone unavailable");
            Arc::new(Unconfigured::new(format!("microphone unavailable: {e}")))
        }
    }
}

/// Recognizer for the configured provider, or [`Unconfigured`] if its key is missing
pub fn recognizer(config: &Config) -> Arc<dyn Recognizer> {
    let key = config
        .stt
        .api_key
        .as_ref()
        .map(|k| k.expose_secret().to_string())
        .unwrap_or_default();

    let stt = match config.stt.provider {
        SttProvider::Whisper => SpeechToText::new_whisper(key, config.stt.model.clone()),
        SttProvider::Deepgram => SpeechToText::new_deepgram(key, config.stt.model.clone()),
    };

    match stt {
        Ok(stt) => match &config.stt.base_url {
            Some(url) => Arc::new(stt.with_base_url(url.clone())),
            None => Arc::new(stt),
        },
        Err(e) => {
            tracing::warn!(error = %e, "speech recognition unavailable");
            Arc::new(Unconfigured::new(e.to_string()))
        }
    }
}

/// Synthesizer for the configured provider, or [`Unconfigured`] if its key is missing
pub fn synthesizer(config: &Config) -> Arc<dyn Synthesizer> {
    let key = config
        .tts
        .api_key
        .as_ref()
        .map(|k| k.expose_secret().to_string())
        .unwrap_or_default();

    let tts = match config.tts.provider {
        TtsProvider::Google => Ok(TextToSpeech::new_google()),
        TtsProvider::OpenAi => TextToSpeech::new_openai_with_model(
            key,
            config.tts.voice.clone(),
            config.tts.speed,
            config.tts.model.clone(),
        ),
        TtsProvider::ElevenLabs => TextToSpeech::new_elevenlabs_with_model(
            key,
            config.tts.voice.clone(),
            config.tts.model.clone(),
        ),
    };

    match tts {
        Ok(tts) => match &config.tts.base_url {
            Some(url) => Arc::new(tts.with_base_url(url.clone())),
            None => Arc::new(tts),
        },
        Err(e) => {
            tracing::warn!(error = %e, "speech synthesis unavailable");
            Arc::new(Unconfigured::new(e.to_string()))
        }
    }
}

/// Default output device, or [`Unconfigured`] if none opens
pub fn player() -> Arc<dyn Player> {
    match AudioPlayback::new() {
        Ok(playback) => Arc::new(playback),
        Err(e) => {
            tracing::warn!(error = %e, "speaker unavailable");
            Arc::new(Unconfigured::new(format!("speaker unavailable: {e}")))
        }
    }
}
