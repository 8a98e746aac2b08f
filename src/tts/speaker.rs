//! Core `Speaker` trait, error type, and the engine-dispatching binding.

use async_trait::async_trait;
use thiserror::Error;

use crate::audio::PlaybackError;
use crate::config::{AppConfig, VoiceEngine};
use crate::tts::device::DeviceVoice;
use crate::tts::remote::RemoteVoice;

// ---------------------------------------------------------------------------
// TtsError
// ---------------------------------------------------------------------------

/// Errors raised while synthesising or playing a reply.
#[derive(Debug, Error)]
pub enum TtsError {
    /// The platform voice program could not be launched.
    #[error("device voice {program:?} unavailable: {reason}")]
    DeviceUnavailable { program: String, reason: String },

    /// The platform voice program ran but reported failure.
    #[error("device voice {program:?} failed ({status}): {stderr}")]
    DeviceFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("speech request timed out")]
    Timeout,

    /// The synthesis endpoint answered with a non-success status.
    #[error("speech API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The synthesised audio could not be decoded.
    #[error("invalid synthesised audio: {0}")]
    InvalidAudio(String),

    #[error("playback failed: {0}")]
    Playback(#[from] PlaybackError),

    /// A background task failed to complete.
    #[error("speech worker failed: {0}")]
    Worker(String),
}

impl From<reqwest::Error> for TtsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TtsError::Timeout
        } else {
            TtsError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Speaker trait
// ---------------------------------------------------------------------------

/// Voice synthesis and playback capability.
///
/// Success means playback was initiated (device engine) or completed
/// (remote engine).  No state is kept between calls.
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self, text: &str, language: &str, engine: VoiceEngine) -> Result<(), TtsError>;
}

// ---------------------------------------------------------------------------
// VoiceSpeaker
// ---------------------------------------------------------------------------

/// [`Speaker`] that routes each call to the platform voice or the remote
/// synthesis API according to the requested [`VoiceEngine`].
pub struct VoiceSpeaker {
    device: DeviceVoice,
    remote: RemoteVoice,
}

impl VoiceSpeaker {
    pub fn new(device: DeviceVoice, remote: RemoteVoice) -> Self {
        Self { device, remote }
    }

    /// Build both engines from application settings.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            DeviceVoice::new(config.speech.device_command.clone()),
            RemoteVoice::from_config(
                &config.api,
                config.speech.remote_model.clone(),
                config.speech.remote_voice.clone(),
            ),
        )
    }
}

#[async_trait]
impl Speaker for VoiceSpeaker {
    async fn speak(&self, text: &str, language: &str, engine: VoiceEngine) -> Result<(), TtsError> {
        if text.trim().is_empty() {
            return Ok(());
        }

        log::debug!("tts: speaking {} chars via {engine} voice", text.len());
        match engine {
            VoiceEngine::Device => self.device.speak(text, language).await,
            VoiceEngine::Remote => self.remote.speak(text).await,
        }
    }
}
