//! Session state machine.
//!
//! [`SessionState`] is the phase a [`VoiceSession`](super::VoiceSession) is
//! in.  Callers read it via [`VoiceSession::state`](super::VoiceSession::state)
//! to decide which entry point is currently legal.

use std::fmt;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Phases of one voice exchange.
///
/// ```text
/// Idle ──begin_capture──▶ Capturing
///      ──end_capture_and_respond──▶ Stopping
///                                   ──audio ready──▶ Transcribing
///                                                    ──transcript──▶ Conversing
///                                                                    ──answer──▶ Speaking
///                                                                                ──done──▶ Idle
/// any busy state ──error or cancellation──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No exchange in progress; `begin_capture` is accepted.
    #[default]
    Idle,

    /// The microphone is recording; `end_capture_and_respond` is accepted.
    Capturing,

    /// Capture is being finalised into an audio payload.
    Stopping,

    /// The transcriber is running.
    Transcribing,

    /// The conversant is producing an answer.
    Conversing,

    /// The answer is being voiced.
    Speaking,
}

impl SessionState {
    /// Returns `true` while an exchange is being processed, i.e. neither
    /// entry point is accepted.
    ///
    /// ```
    /// use voice_chat::pipeline::SessionState;
    ///
    /// assert!(!SessionState::Idle.is_busy());
    /// assert!(!SessionState::Capturing.is_busy());
    /// assert!(SessionState::Transcribing.is_busy());
    /// assert!(SessionState::Speaking.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SessionState::Stopping
                | SessionState::Transcribing
                | SessionState::Conversing
                | SessionState::Speaking
        )
    }

    /// A short human-readable label suitable for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Capturing => "Capturing",
            SessionState::Stopping => "Stopping",
            SessionState::Transcribing => "Transcribing",
            SessionState::Conversing => "Conversing",
            SessionState::Speaking => "Speaking",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- SessionState::is_busy ---

    #[test]
    fn idle_and_capturing_are_not_busy() {
        assert!(!SessionState::Idle.is_busy());
        assert!(!SessionState::Capturing.is_busy());
    }

    #[test]
    fn processing_states_are_busy() {
        for state in [
            SessionState::Stopping,
            SessionState::Transcribing,
            SessionState::Conversing,
            SessionState::Speaking,
        ] {
            assert!(state.is_busy(), "{state} should be busy");
        }
    }

    // ---- SessionState::label ---

    #[test]
    fn label_matches_display() {
        assert_eq!(SessionState::Conversing.label(), "Conversing");
        assert_eq!(SessionState::Stopping.to_string(), "Stopping");
    }

    #[test]
    fn default_state_is_idle() {
        assert_eq!(SessionState::default(), SessionState::Idle);
    }
}
