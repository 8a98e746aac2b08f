//! Core transcriber trait and error type.
//!
//! # Overview
//!
//! [`Transcriber`] is the interface the session depends on.  It is
//! object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn Transcriber>`.
//!
//! Two production bindings exist:
//! * [`ApiTranscriber`](crate::stt::ApiTranscriber) — remote
//!   `/v1/audio/transcriptions` endpoint.
//! * [`WhisperTranscriber`](crate::stt::WhisperTranscriber) — local
//!   whisper.cpp model.
//!
//! [`MockTranscriber`] (available under `#[cfg(test)]`) returns a
//! pre-configured response without touching any model or network.

use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// All errors that can arise from the STT subsystem.
#[derive(Debug, Clone, Error)]
pub enum SttError {
    /// The audio payload contained no bytes at all.
    #[error("no audio to transcribe")]
    EmptyAudio,

    /// The audio payload could not be decoded.
    #[error("invalid audio: {0}")]
    InvalidAudio(String),

    /// The decoded audio is shorter than the local engine accepts.
    #[error("audio too short — minimum 0.5 s")]
    AudioTooShort,

    /// The decoded audio is longer than the local engine accepts.
    #[error("audio too long — maximum 60 s")]
    AudioTooLong,

    /// The GGML model file was not found at the given path.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// `whisper_rs` failed to initialise a context or state.
    #[error("whisper context initialisation failed: {0}")]
    ContextInit(String),

    /// An error occurred during the inference pass.
    #[error("transcription error: {0}")]
    Transcription(String),

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("transcription request timed out")]
    Timeout,

    /// The endpoint answered with a non-success status.
    #[error("transcription API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The response body could not be parsed.
    #[error("failed to parse transcription response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SttError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SttError::Timeout
        } else {
            SttError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Speech-to-text capability.
///
/// # Contract
///
/// - `audio` is the container produced by the capture adapter (WAV).
/// - `language` is a BCP-47-style tag used as a recognition hint.
/// - An empty transcript is a valid result, not an error.
/// - No state is retained between calls.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<String, SttError>;
}

// Compile-time assertion: Box<dyn Transcriber> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Transcriber>) {}
};

/// Reduce a BCP-47 tag to its primary language subtag, lower-cased.
///
/// Whisper and the OpenAI transcription API accept ISO-639-1 codes only.
///
/// ```
/// use voice_chat::stt::primary_language;
///
/// assert_eq!(primary_language("en-US"), "en");
/// assert_eq!(primary_language("pt_BR"), "pt");
/// assert_eq!(primary_language("TH"), "th");
/// ```
pub fn primary_language(tag: &str) -> String {
    tag.split(|c: char| c == '-' || c == '_')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// MockTranscriber  (test-only)
// ---------------------------------------------------------------------------

/// A test double that returns a pre-configured response.
///
/// Records the language of the last call so tests can check that the
/// session forwards its configured language.
#[cfg(test)]
pub struct MockTranscriber {
    response: Result<String, SttError>,
    last_language: std::sync::Mutex<Option<String>>,
}

#[cfg(test)]
impl MockTranscriber {
    /// Create a mock that always returns `Ok(text)`.
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
            last_language: std::sync::Mutex::new(None),
        }
    }

    /// Create a mock that always returns `Err(error)`.
    pub fn err(error: SttError) -> Self {
        Self {
            response: Err(error),
            last_language: std::sync::Mutex::new(None),
        }
    }

    pub fn last_language(&self) -> Option<String> {
        self.last_language.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<String, SttError> {
        *self.last_language.lock().unwrap() = Some(language.to_string());
        // Enforce the empty-audio contract even in the mock.
        if audio.is_empty() {
            return Err(SttError::EmptyAudio);
        }
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_ok_returns_configured_text() {
        let engine = MockTranscriber::ok("hello");
        assert_eq!(engine.transcribe(b"RIFF", "en").await.unwrap(), "hello");
        assert_eq!(engine.last_language().as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn mock_err_returns_configured_error() {
        let engine = MockTranscriber::err(SttError::Transcription("boom".into()));
        let err = engine.transcribe(b"RIFF", "en").await.unwrap_err();
        assert!(matches!(err, SttError::Transcription(_)));
    }

    #[tokio::test]
    async fn mock_rejects_empty_audio() {
        let engine = MockTranscriber::ok("text");
        let err = engine.transcribe(&[], "en").await.unwrap_err();
        assert!(matches!(err, SttError::EmptyAudio));
    }

    #[tokio::test]
    async fn mock_may_return_empty_transcript() {
        let engine = MockTranscriber::ok("");
        assert_eq!(engine.transcribe(b"RIFF", "en").await.unwrap(), "");
    }

    #[test]
    fn box_dyn_transcriber_compiles() {
        let _engine: Box<dyn Transcriber> = Box::new(MockTranscriber::ok("ok"));
    }

    #[test]
    fn primary_language_handles_plain_codes() {
        assert_eq!(primary_language("de"), "de");
        assert_eq!(primary_language("zh-Hant-TW"), "zh");
        assert_eq!(primary_language(""), "");
    }

    #[test]
    fn api_error_display_includes_status() {
        let e = SttError::Api {
            status: 401,
            body: "bad key".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("401") && msg.contains("bad key"));
    }
}
