//! Push-to-talk voice conversations: capture speech, transcribe it, hold a
//! multi-turn dialogue with a chat model, and speak the replies.
//!
//! * [`audio`] — microphone capture, playback, WAV and resampling helpers.
//! * [`stt`] — speech-to-text behind the [`stt::Transcriber`] trait.
//! * [`llm`] — chat completion behind the [`llm::Conversant`] trait.
//! * [`tts`] — speech synthesis behind the [`tts::Speaker`] trait.
//! * [`history`] — the role-tagged dialogue log.
//! * [`pipeline`] — [`pipeline::VoiceSession`], which drives one exchange
//!   at a time through the capabilities above.
//! * [`config`] — TOML settings and platform paths.

pub mod audio;
pub mod config;
pub mod history;
pub mod llm;
pub mod pipeline;
pub mod stt;
pub mod tts;
