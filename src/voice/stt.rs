//! Speech-to-text (STT) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::providers::Recognizer;
use crate::{Error, Result};

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug)]
enum SttProvider {
    Whisper,
    Deepgram,
}

impl SttProvider {
    const fn default_base_url(self) -> &'static str {
        match self {
            Self::Whisper => "https://api.openai.com",
            Self::Deepgram => "https://api.deepgram.com",
        }
    }
}

/// Transcribes speech to text
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    provider: SttProvider,
    base_url: String,
}

impl SpeechToText {
    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_whisper(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper: set OPENAI_API_KEY".to_string(),
            ));
        }

        Ok(Self::build(api_key, model, SttProvider::Whisper))
    }

    /// Create a new STT instance using Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_deepgram(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "Deepgram API key required: set DEEPGRAM_API_KEY".to_string(),
            ));
        }

        Ok(Self::build(api_key, model, SttProvider::Deepgram))
    }

    fn build(api_key: String, model: String, provider: SttProvider) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key),
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

    /// Transcribe using OpenAI Whisper
    async fn transcribe_whisper(&self, audio: &[u8], locale: &str) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), locale, "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", primary_language(locale));

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                Error::Stt(e.to_string())
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            Error::Stt(e.to_string())
        })?;

        Ok(result.text)
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: &[u8], locale: &str) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), locale, "starting Deepgram transcription");

        let response = self
            .client
            .post(format!("{}/v1/listen", self.base_url))
            .query(&[
                ("model", self.model.as_str()),
                ("language", locale),
                ("punctuate", "true"),
            ])
            .header(
                "Authorization",
                format!("Token {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Deepgram request failed");
                Error::Stt(e.to_string())
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Deepgram response");
            Error::Stt(e.to_string())
        })?;

        let transcript = result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .unwrap_or_default();

        Ok(transcript)
    }
}

#[async_trait]
impl Recognizer for SpeechToText {
    /// Transcribe WAV audio to lowercase text
    async fn transcribe(&self, wav: &[u8], locale: &str) -> Result<String> {
        let raw = match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(wav, locale).await?,
            SttProvider::Deepgram => self.transcribe_deepgram(wav, locale).await?,
        };

        let transcript = normalize_transcript(&raw).ok_or(Error::Unintelligible)?;
        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

/// Trim and lowercase a transcript; `None` if nothing was recognized
fn normalize_transcript(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}

/// ISO-639-1 part of a locale tag ("en-IN" -> "en")
fn primary_language(locale: &str) -> String {
    locale
        .split(['-', '_'])
        .next()
        .unwrap_or(locale)
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_language() {
        assert_eq!(primary_language("en-IN"), "en");
        assert_eq!(primary_language("pt_BR"), "pt");
        assert_eq!(primary_language("DE"), "de");
    }

    #[test]
    fn test_normalize_transcript() {
        assert_eq!(
            normalize_transcript("  What Time Is It? ").as_deref(),
            Some("what time is it?")
        );
        assert_eq!(normalize_transcript("   "), None);
    }

    #[test]
    fn test_keys_required() {
        assert!(SpeechToText::new_whisper(String::new(), "whisper-1".into()).is_err());
        assert!(SpeechToText::new_deepgram(String::new(), "nova-2".into()).is_err());
    }
}
