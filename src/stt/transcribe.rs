//! Local Whisper inference parameters and result types.
//!
//! [`TranscribeParams`] carries the settings for one whisper.cpp run made
//! by [`WhisperTranscriber`](crate::stt::WhisperTranscriber).
//! [`TranscriptionResult`] is returned by
//! [`WhisperTranscriber::transcribe_full`](crate::stt::WhisperTranscriber::transcribe_full).

// ---------------------------------------------------------------------------
// SamplingStrategy
// ---------------------------------------------------------------------------

/// Mirrors `whisper_rs::SamplingStrategy` but is owned and `Clone`.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingStrategy {
    /// Single-pass decoding; lowest latency.
    Greedy {
        /// Number of candidate tokens evaluated per step.
        best_of: i32,
    },
    /// Beam-search decoding; slower, slightly more accurate.
    BeamSearch {
        beam_size: i32,
        /// Patience factor (≥1.0 = standard beam search).
        patience: f32,
    },
}

impl Default for SamplingStrategy {
    fn default() -> Self {
        Self::Greedy { best_of: 1 }
    }
}

// ---------------------------------------------------------------------------
// TranscribeParams
// ---------------------------------------------------------------------------

/// Parameters for a local Whisper run.
///
/// The language is not stored here; it is supplied per call by the session.
///
/// ```
/// use voice_chat::stt::{SamplingStrategy, TranscribeParams};
///
/// let params = TranscribeParams {
///     strategy: SamplingStrategy::BeamSearch { beam_size: 5, patience: 1.0 },
///     ..TranscribeParams::default()
/// };
/// assert!(params.n_threads >= 1);
/// ```
#[derive(Debug, Clone)]
pub struct TranscribeParams {
    pub strategy: SamplingStrategy,

    /// CPU threads handed to Whisper.  Defaults to [`optimal_threads()`].
    pub n_threads: i32,

    /// Suppress Whisper's progress output to stderr.
    pub suppress_progress: bool,

    /// Request GPU offload when the build supports it.
    pub use_gpu: bool,
}

impl Default for TranscribeParams {
    fn default() -> Self {
        Self {
            strategy: SamplingStrategy::default(),
            n_threads: optimal_threads(),
            suppress_progress: true,
            use_gpu: false,
        }
    }
}

/// Number of CPU threads to use for inference, capped at 8.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// The output of a successful local transcription.
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    /// Concatenated transcript, trimmed.
    pub text: String,

    pub segments: Vec<Segment>,

    /// Wall-clock inference time in milliseconds.
    pub duration_ms: u128,
}

/// A single time-aligned text chunk produced by Whisper.
#[derive(Debug, Clone)]
pub struct Segment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}
