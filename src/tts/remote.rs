//! Remote synthesis through an OpenAI-compatible `/v1/audio/speech`
//! endpoint, played back locally.

use serde::Serialize;

use crate::audio::{decode_wav, play_blocking};
use crate::config::ApiConfig;
use crate::tts::speaker::TtsError;

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// Synthesises speech remotely and plays the returned WAV.
pub struct RemoteVoice {
    client: reqwest::Client,
    api: ApiConfig,
    model: String,
    voice: String,
}

impl RemoteVoice {
    pub fn from_config(api: &ApiConfig, model: impl Into<String>, voice: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(api.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api: api.clone(),
            model: model.into(),
            voice: voice.into(),
        }
    }

    /// Request synthesis of `text` and return the WAV bytes.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TtsError> {
        let body = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: "wav",
        };

        let mut req = self
            .client
            .post(self.api.endpoint("/v1/audio/speech"))
            .json(&body);

        if let Some(key) = self.api.resolved_api_key() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Synthesise `text` and block (on the blocking pool) until playback
    /// completes.
    pub async fn speak(&self, text: &str) -> Result<(), TtsError> {
        let wav = self.synthesize(text).await?;
        let decoded = decode_wav(&wav).map_err(|e| TtsError::InvalidAudio(e.to_string()))?;

        log::debug!(
            "tts: playing {:.2} s of remote speech (voice={})",
            decoded.duration_secs(),
            self.voice
        );

        tokio::task::spawn_blocking(move || play_blocking(&decoded.samples, decoded.sample_rate))
            .await
            .map_err(|e| TtsError::Worker(e.to_string()))??;
        Ok(())
    }
}
