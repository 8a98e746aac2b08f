//! Core `Conversant` trait and `ApiConversant` implementation.
//!
//! `ApiConversant` calls any OpenAI-compatible `/v1/chat/completions`
//! endpoint — OpenAI, Ollama (OpenAI mode), Groq, LM Studio, vLLM, etc.
//! Connection details come from [`ApiConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::ApiConfig;
use crate::history::Turn;

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur during a conversational exchange.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// The endpoint answered with a non-success status.
    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Conversant trait
// ---------------------------------------------------------------------------

/// Conversational inference over a full dialogue history.
///
/// Implementors receive the history read-only and return the reply text.
/// Appending the reply to the history is the session's job, not the
/// conversant's.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn Conversant>`.
#[async_trait]
pub trait Conversant: Send + Sync {
    async fn send(&self, history: &[Turn]) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// ApiConversant
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    temperature: f32,
    stream: bool,
}

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint with the
/// whole history as `messages`.
pub struct ApiConversant {
    client: reqwest::Client,
    api: ApiConfig,
    model: String,
    temperature: f32,
}

impl ApiConversant {
    /// Build from connection settings, the session's `conversant_model`, and
    /// a sampling temperature.
    ///
    /// The HTTP client is pre-configured with `api.timeout_secs`.  A default
    /// client is used if the builder fails.
    pub fn from_config(api: &ApiConfig, model: impl Into<String>, temperature: f32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(api.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api: api.clone(),
            model: model.into(),
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Conversant for ApiConversant {
    /// Send the history and return the first choice's content.
    ///
    /// A response with no content yields an empty answer rather than an
    /// error.  The `Authorization: Bearer …` header is attached only when a
    /// non-empty key is configured.
    async fn send(&self, history: &[Turn]) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: history,
            temperature: self.temperature,
            stream: false,
        };

        let mut req = self
            .client
            .post(self.api.endpoint("/v1/chat/completions"))
            .json(&body);

        if let Some(key) = self.api.resolved_api_key() {
            req = req.bearer_auth(key);
        }

        log::debug!(
            "llm: sending {} turn(s) to model {}",
            history.len(),
            self.model
        );

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(extract_answer(&json))
    }
}

/// Pull `choices[0].message.content` out of a chat-completions body.
fn extract_answer(json: &serde_json::Value) -> String {
    json["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
