//! Speech synthesis for assistant replies.
//!
//! * [`Speaker`] — async trait the session speaks through.
//! * [`VoiceSpeaker`] — dispatches to [`DeviceVoice`] or [`RemoteVoice`]
//!   per call, according to [`VoiceEngine`](crate::config::VoiceEngine).
//! * [`TtsError`] — error variants for synthesis and playback.

pub mod device;
pub mod remote;
pub mod speaker;

pub use device::{DeviceVoice, VoiceCommand};
pub use remote::RemoteVoice;
pub use speaker::{Speaker, TtsError, VoiceSpeaker};
