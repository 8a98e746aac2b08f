//! STT (speech-to-text) module.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                Transcriber (trait)                   │
//! │                                                      │
//! │   ┌───────────────┐          ┌──────────────────┐    │
//! │   │ ApiTranscriber│          │WhisperTranscriber│    │
//! │   │ multipart POST│          │ decode_wav       │    │
//! │   │ /v1/audio/…   │          │ whisper-rs state │    │
//! │   └───────┬───────┘          └────────┬─────────┘    │
//! │           └──────────┬────────────────┘              │
//! │                      ▼                               │
//! │          transcribe(wav bytes, language) → text      │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod engine;
pub mod transcribe;
pub mod whisper;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use api::ApiTranscriber;
pub use engine::{primary_language, SttError, Transcriber};
pub use transcribe::{SamplingStrategy, Segment, TranscribeParams, TranscriptionResult};
pub use whisper::WhisperTranscriber;

// test-only re-export so the session tests can import MockTranscriber.
#[cfg(test)]
pub use engine::MockTranscriber;
