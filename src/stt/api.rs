//! Remote transcription through an OpenAI-compatible
//! `/v1/audio/transcriptions` endpoint.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ApiConfig;
use crate::stt::engine::{primary_language, SttError, Transcriber};

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// [`Transcriber`] that uploads the captured WAV as multipart form data.
///
/// All connection details come from [`ApiConfig`]; the model is the
/// session's `transcriber_model`.
pub struct ApiTranscriber {
    client: reqwest::Client,
    api: ApiConfig,
    model: String,
}

impl ApiTranscriber {
    /// Build from connection settings and a model id (e.g. `"whisper-1"`).
    pub fn from_config(api: &ApiConfig, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(api.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api: api.clone(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Transcriber for ApiTranscriber {
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<String, SttError> {
        if audio.is_empty() {
            return Err(SttError::EmptyAudio);
        }
        log::debug!(
            "stt: uploading {} bytes to {} (model={})",
            audio.len(),
            self.api.base_url,
            self.model
        );

        let file = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| SttError::Request(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "json");

        let lang = primary_language(language);
        if !lang.is_empty() {
            form = form.text("language", lang);
        }

        let mut req = self
            .client
            .post(self.api.endpoint("/v1/audio/transcriptions"))
            .multipart(form);

        // Local OpenAI-compatible servers often run without authentication.
        if let Some(key) = self.api.resolved_api_key() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SttError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| SttError::Parse(e.to_string()))?;

        Ok(parsed.text.trim().to_string())
    }
}
