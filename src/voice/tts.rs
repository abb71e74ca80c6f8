//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::providers::Synthesizer;
use crate::{Error, Result};

/// Longest text the Google speech endpoint accepts per request
const GOOGLE_CHUNK_CHARS: usize = 100;

/// TTS provider backend
#[derive(Clone, Copy, Debug)]
enum TtsProvider {
    Google,
    OpenAI,
    ElevenLabs,
}

impl TtsProvider {
    const fn default_base_url(self) -> &'static str {
        match self {
            Self::Google => "https://translate.google.com",
            Self::OpenAI => "https://api.openai.com",
            Self::ElevenLabs => "https://api.elevenlabs.io",
        }
    }
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice: String,
    speed: f32,
    model: String,
    provider: TtsProvider,
    base_url: String,
}

impl TextToSpeech {
    /// Create a new TTS instance using the Google Translate speech endpoint
    ///
    /// No key is needed; the language tag selects the voice.
    #[must_use]
    pub fn new_google() -> Self {
        Self::build(
            String::new(),
            String::new(),
            1.0,
            String::new(),
            TtsProvider::Google,
        )
    }

    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(api_key: String, voice: String, speed: f32) -> Result<Self> {
        Self::new_openai_with_model(api_key, voice, speed, "tts-1".to_string())
    }

    /// Create a new TTS instance using `OpenAI` with custom model
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai_with_model(
        api_key: String,
        voice: String,
        speed: f32,
        model: String,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for TTS: set OPENAI_API_KEY".to_string(),
            ));
        }

        Ok(Self::build(api_key, voice, speed, model, TtsProvider::OpenAI))
    }

    /// Create a new TTS instance using ElevenLabs with custom model
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs_with_model(
        api_key: String,
        voice_id: String,
        model: String,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS: set ELEVENLABS_API_KEY".to_string(),
            ));
        }

        // ElevenLabs doesn't use speed in the same way
        Ok(Self::build(
            api_key,
            voice_id,
            1.0,
            model,
            TtsProvider::ElevenLabs,
        ))
    }

    fn build(
        api_key: String,
        voice: String,
        speed: f32,
        model: String,
        provider: TtsProvider,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key),
            voice,
            speed,
            model,
            provider,
            base_url: provider.default_base_url().to_string(),
        }
    }

    /// Point the client at a different API host
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Synthesize using the Google Translate speech endpoint
    ///
    /// Long text is split into word-aligned chunks; MP3 frames from each
    /// response are concatenated.
    async fn synthesize_google(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        let chunks = chunk_text(text, GOOGLE_CHUNK_CHARS);
        let total = chunks.len();
        let mut audio = Vec::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let idx_param = idx.to_string();
            let total_param = total.to_string();
            let textlen = chunk.chars().count().to_string();

            let response = self
                .client
                .get(format!("{}/translate_tts", self.base_url))
                .query(&[
                    ("ie", "UTF-8"),
                    ("q", chunk.as_str()),
                    ("tl", language),
                    ("client", "tw-ob"),
                    ("ttsspeed", "1"),
                    ("idx", idx_param.as_str()),
                    ("total", total_param.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await
                .map_err(|e| Error::Tts(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Tts(format!("Google TTS error {status}: {body}")));
            }

            let bytes = response.bytes().await.map_err(|e| Error::Tts(e.to_string()))?;
            audio.extend_from_slice(&bytes);
        }

        Ok(audio)
    }

    /// Synthesize using OpenAI TTS
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Tts(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await.map_err(|e| Error::Tts(e.to_string()))?;
        Ok(audio.to_vec())
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!("{}/v1/text-to-speech/{}", self.base_url, self.voice);

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Tts(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await.map_err(|e| Error::Tts(e.to_string()))?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    /// Synthesize text to MP3
    ///
    /// `language` drives the Google voice; `OpenAI` and ElevenLabs detect the
    /// language from the text.
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        tracing::debug!(provider = ?self.provider, chars = text.len(), language, "synthesizing speech");

        let audio = match self.provider {
            TtsProvider::Google => self.synthesize_google(text, language).await?,
            TtsProvider::OpenAI => self.synthesize_openai(text).await?,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text).await?,
        };

        if audio.is_empty() {
            return Err(Error::Tts("provider returned no audio".to_string()));
        }

        tracing::debug!(bytes = audio.len(), "synthesis complete");
        Ok(audio)
    }
}

/// Split text into chunks of at most `max_chars` characters on word boundaries
///
/// Words longer than `max_chars` are split mid-word.
#[must_use]
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { word_len + 1 };
        if current_len + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
