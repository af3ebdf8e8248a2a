//! OpenAI-compatible HTTP client.
//!
//! `OpenAiClient` makes blocking requests to the chat-completions and
//! audio-transcription endpoints. Every call is single-shot; failures are
//! returned to the caller, which decides whether to fall back.

use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::models::{ChatMessage, Classification};

use super::classify::{
    CLASSIFY_SYSTEM_PROMPT, chat_system_prompt, classify_user_prompt, parse_classification,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Errors that can occur when talking to the language-model API.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Connection failures, DNS resolution, unreadable response bodies.
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The request or response timed out.
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// Non-success HTTP status.
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The API answered, but not with what was expected.
    #[error("LLM API error: {message}")]
    Api { message: String },

    /// The configured base URL does not parse.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// No API key was configured.
    #[error("No API key configured; set OPENAI_API_KEY")]
    MissingApiKey,
}

impl LlmError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else {
            Self::Network(err)
        }
    }
}

/// Language-model capabilities used by the knowledge service.
///
/// Implemented by [`OpenAiClient`]; tests provide their own implementations.
pub trait Assistant: Send + Sync {
    /// Classifies captured input. `context` is passed to the model verbatim.
    fn classify(
        &self,
        content: &str,
        context: Option<&serde_json::Value>,
    ) -> Result<Classification, LlmError>;

    /// Produces a conversational reply to `message`, given earlier turns and
    /// optional text about the vault.
    fn chat(
        &self,
        message: &str,
        history: &[ChatMessage],
        vault_context: Option<&str>,
    ) -> Result<String, LlmError>;

    /// Transcribes an audio clip to text. `file_name` carries the format hint.
    fn transcribe(&self, audio: &[u8], file_name: &str) -> Result<String, LlmError>;

    /// Whether this assistant can reach a model at all.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Builder for [`OpenAiClient`].
///
/// Each setting resolves from the builder first, then the environment, then
/// a default:
///
/// | setting     | variable             | default                     |
/// |-------------|----------------------|-----------------------------|
/// | base URL    | `OPENAI_BASE_URL`    | `https://api.openai.com/v1` |
/// | API key     | `OPENAI_API_KEY`     | required                    |
/// | model       | `OPENAI_MODEL`       | `gpt-4-turbo-preview`       |
/// | temperature | `OPENAI_TEMPERATURE` | `0.7`                       |
///
/// # Examples
///
/// ```
/// use kvault::llm::OpenAiClientBuilder;
///
/// let client = OpenAiClientBuilder::new()
///     .base_url("http://localhost:8080/v1")
///     .api_key("test-key")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.base_url(), "http://localhost:8080/v1");
/// ```
#[derive(Debug, Default)]
pub struct OpenAiClientBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
}

impl OpenAiClientBuilder {
    /// Creates a builder with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API base URL, e.g. `https://api.openai.com/v1`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the bearer token.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the chat model name.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// [`LlmError::MissingApiKey`] when no key is set by builder or
    /// environment, [`LlmError::InvalidUrl`] when the base URL does not parse.
    pub fn build(self) -> Result<OpenAiClient, LlmError> {
        let base_url = self
            .base_url
            .or_else(|| non_empty_var("OPENAI_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = base_url.trim_end_matches('/').to_string();

        let api_key = self
            .api_key
            .or_else(|| non_empty_var("OPENAI_API_KEY"))
            .ok_or(LlmError::MissingApiKey)?;

        let model = self
            .model
            .or_else(|| non_empty_var("OPENAI_MODEL"))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let temperature = self
            .temperature
            .or_else(|| non_empty_var("OPENAI_TEMPERATURE").and_then(|t| t.parse().ok()))
            .unwrap_or(DEFAULT_TEMPERATURE);

        reqwest::Url::parse(&base_url)
            .map_err(|e| LlmError::InvalidUrl(format!("{base_url}: {e}")))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(LlmError::Network)?;

        Ok(OpenAiClient {
            client,
            base_url,
            api_key,
            model,
            temperature,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Blocking client for an OpenAI-compatible API.
///
/// Construct it with [`OpenAiClientBuilder`].
pub struct OpenAiClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    /// The API base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The chat model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The sampling temperature.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn completion_body(&self, messages: Vec<serde_json::Value>, json_mode: bool) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }

    fn complete(&self, body: &serde_json::Value) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .map_err(LlmError::from_reqwest)?;

        let json = read_json(response)?;
        completion_text(&json)
    }
}

impl Assistant for OpenAiClient {
    fn classify(
        &self,
        content: &str,
        context: Option<&serde_json::Value>,
    ) -> Result<Classification, LlmError> {
        let messages = vec![
            json!({"role": "system", "content": CLASSIFY_SYSTEM_PROMPT}),
            json!({"role": "user", "content": classify_user_prompt(content, context)}),
        ];
        let reply = self.complete(&self.completion_body(messages, true))?;
        debug!(model = %self.model, "Received classification");
        parse_classification(&reply, content)
    }

    fn chat(
        &self,
        message: &str,
        history: &[ChatMessage],
        vault_context: Option<&str>,
    ) -> Result<String, LlmError> {
        let messages = chat_messages(message, history, vault_context)?;
        self.complete(&self.completion_body(messages, false))
    }

    fn transcribe(&self, audio: &[u8], file_name: &str) -> Result<String, LlmError> {
        let form = Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .text("response_format", "json")
            .part("file", Part::bytes(audio.to_vec()).file_name(file_name.to_string()));

        let response = self
            .client
            .post(self.endpoint("audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .map_err(LlmError::from_reqwest)?;

        let json = read_json(response)?;
        json.get("text")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| LlmError::Api {
                message: "Missing 'text' field in transcription response".to_string(),
            })
    }
}

/// Stand-in used when no API key is configured.
///
/// Every call fails with [`LlmError::MissingApiKey`], so captures fall back to
/// the default classification and chat replies carry the error text.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredAssistant;

impl Assistant for UnconfiguredAssistant {
    fn classify(&self, _: &str, _: Option<&serde_json::Value>) -> Result<Classification, LlmError> {
        Err(LlmError::MissingApiKey)
    }

    fn chat(&self, _: &str, _: &[ChatMessage], _: Option<&str>) -> Result<String, LlmError> {
        Err(LlmError::MissingApiKey)
    }

    fn transcribe(&self, _: &[u8], _: &str) -> Result<String, LlmError> {
        Err(LlmError::MissingApiKey)
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// System prompt, then history in order, then the new user message.
fn chat_messages(
    message: &str,
    history: &[ChatMessage],
    vault_context: Option<&str>,
) -> Result<Vec<serde_json::Value>, LlmError> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(json!({"role": "system", "content": chat_system_prompt(vault_context)}));
    for turn in history {
        messages.push(serde_json::to_value(turn).map_err(LlmError::Serialization)?);
    }
    messages.push(serde_json::to_value(ChatMessage::user(message)).map_err(LlmError::Serialization)?);
    Ok(messages)
}

fn read_json(response: reqwest::blocking::Response) -> Result<serde_json::Value, LlmError> {
    let status = response.status();
    if !status.is_success() {
        return Err(LlmError::Http {
            status: status.as_u16(),
        });
    }
    response.json().map_err(LlmError::from_reqwest)
}

/// Pulls `choices[0].message.content` out of a completion response.
fn completion_text(json: &serde_json::Value) -> Result<String, LlmError> {
    if let Some(message) = json.pointer("/error/message").and_then(|m| m.as_str()) {
        return Err(LlmError::Api {
            message: message.to_string(),
        });
    }
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| LlmError::Api {
            message: "Missing 'choices[0].message.content' in API response".to_string(),
        })
}
