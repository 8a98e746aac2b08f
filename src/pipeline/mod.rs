//! Session orchestration for push-to-talk voice conversations.
//!
//! This module wires the capture → transcribe → converse → speak flow and
//! owns the dialogue state that spans exchanges.
//!
//! # Architecture
//!
//! ```text
//! caller (console loop, UI, …)
//!        │
//!        ├─ begin_capture()            → AudioCapture::start      [Capturing]
//!        │
//!        └─ end_capture_and_respond()
//!              │
//!              ├─ AudioCapture::stop   → WAV bytes                 [Stopping]
//!              ├─ Transcriber          → transcript                [Transcribing]
//!              ├─ Conversant(history)  → answer                    [Conversing]
//!              └─ Speaker(answer)                                  [Speaking]
//!
//! VoiceSession { Mutex<SessionState>, Mutex<DialogueHistory> }
//! ```
//!
//! Each capability is an `Arc<dyn Trait>` so any of them can be swapped for
//! another backend or a test double.

pub mod session;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use session::{SessionError, Stage, TurnOutcome, VoiceSession};
pub use state::SessionState;
