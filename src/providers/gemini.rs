//! Google Gemini language model client

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::LanguageModel;
use crate::{Error, Result};

/// Default Gemini API endpoint
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Request body for `generateContent`
#[derive(serde::Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(serde::Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: [RequestPart<'a>; 1],
}

#[derive(serde::Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

/// Response from `generateContent`
#[derive(serde::Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(serde::Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(serde::Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(serde::Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Error envelope returned by the Gemini API
#[derive(serde::Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(serde::Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Generates replies with a fixed Gemini model
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a new Gemini client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Gemini API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key),
            model,
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API host
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "requesting Gemini completion");

        let request = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "Gemini request failed");
                Error::Llm(e.to_string())
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(&self.model, status, &body));
        }

        let result: GenerateResponse = response.json().await.map_err(|e| {
            tracing::debug!(error = %e, "failed to parse Gemini response");
            Error::Llm(e.to_string())
        })?;

        let text: String = result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::Llm("Gemini returned no text".to_string()));
        }

        tracing::info!(model = %self.model, reply_len = text.len(), "completion received");
        Ok(text)
    }
}

/// Map a non-success response onto unavailable-model or transport failure
fn classify_failure(model: &str, status: reqwest::StatusCode, body: &str) -> Error {
    let api_error = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let message = api_error
        .as_ref()
        .map_or_else(|| body.to_string(), |e| e.message.clone());
    let api_status = api_error.as_ref().map_or("", |e| e.status.as_str());

    let unavailable = status == reqwest::StatusCode::NOT_FOUND
        || status == reqwest::StatusCode::FORBIDDEN
        || matches!(api_status, "NOT_FOUND" | "PERMISSION_DENIED" | "FAILED_PRECONDITION");

    tracing::debug!(model, status = %status, api_status, message = %message, "Gemini API error");

    if unavailable {
        Error::ModelUnavailable(format!(
            "model '{model}' is not available for this API key or region: {message}"
        ))
    } else {
        Error::Llm(format!("Gemini API error {status}: {message}"))
    }
}
