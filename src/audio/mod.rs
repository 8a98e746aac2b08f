//! Audio I/O — microphone capture, format conversion, playback.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback (capture thread) → Vec<f32>
//!           → downmix_to_mono → resample_to_16k → encode_wav → bytes
//!
//! WAV bytes → decode_wav → resample(device rate) → cpal output stream
//! ```
//!
//! The session only sees the [`AudioCapture`] trait; [`CpalCapture`] is the
//! production binding.

pub mod capture;
pub mod playback;
pub mod resample;
pub mod wav;

pub use capture::{AudioCapture, CaptureError, CpalCapture};
pub use playback::{play_blocking, PlaybackError};
pub use resample::{downmix_to_mono, resample, resample_to_16k, SPEECH_SAMPLE_RATE};
pub use wav::{decode_wav, encode_wav, DecodedAudio};
