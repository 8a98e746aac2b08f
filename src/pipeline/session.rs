//! Voice session orchestrator: capture → transcribe → converse → speak.
//!
//! [`VoiceSession`] owns the [`DialogueHistory`] and the [`SessionState`],
//! and drives the four capabilities it was built with.
//!
//! # Exchange flow
//!
//! ```text
//! begin_capture()
//!   └─▶ capture.start()                                   [Capturing]
//!
//! end_capture_and_respond()
//!   └─▶ capture.stop()                → audio            [Stopping]
//!         └─▶ transcriber.transcribe  → transcript       [Transcribing]
//!               └─▶ append user turn, conversant.send     [Conversing]
//!                     └─▶ append assistant turn
//!                           └─▶ speaker.speak(answer)     [Speaking]
//!                                 └─▶ TurnOutcome         [Idle]
//! ```
//!
//! The first failing stage ends the exchange: its error is returned tagged
//! with the stage, later stages are skipped, and the session is back in
//! `Idle`.  Turns already appended stay in the history.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::audio::{AudioCapture, CaptureError};
use crate::config::SessionConfig;
use crate::history::{DialogueHistory, Turn};
use crate::llm::{Conversant, LlmError};
use crate::stt::{SttError, Transcriber};
use crate::tts::{Speaker, TtsError};

use super::state::SessionState;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// The pipeline stage an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CaptureStart,
    CaptureStop,
    Transcribe,
    Converse,
    Speak,
    /// The session itself rejected the call.
    Session,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::CaptureStart => "capture-start",
            Stage::CaptureStop => "capture-stop",
            Stage::Transcribe => "transcribe",
            Stage::Converse => "converse",
            Stage::Speak => "speak",
            Stage::Session => "session",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Errors surfaced by the session entry points.
///
/// Every stage failure keeps the underlying adapter error as its
/// [`source`](std::error::Error::source).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("capture-start failed: {0}")]
    CaptureStart(#[source] CaptureError),

    #[error("capture-stop failed: {0}")]
    CaptureStop(#[source] CaptureError),

    #[error("transcribe failed: {0}")]
    Transcription(#[source] SttError),

    #[error("converse failed: {0}")]
    Conversation(#[source] LlmError),

    #[error("speak failed: {0}")]
    Speech(#[source] TtsError),

    /// An entry point was called in a state that does not accept it.
    #[error("{operation} is not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

impl SessionError {
    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            SessionError::CaptureStart(_) => Stage::CaptureStart,
            SessionError::CaptureStop(_) => Stage::CaptureStop,
            SessionError::Transcription(_) => Stage::Transcribe,
            SessionError::Conversation(_) => Stage::Converse,
            SessionError::Speech(_) => Stage::Speak,
            SessionError::InvalidState { .. } => Stage::Session,
        }
    }
}

// ---------------------------------------------------------------------------
// TurnOutcome
// ---------------------------------------------------------------------------

/// Result of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// What the user said, as transcribed.
    pub transcript: String,
    /// The conversant's reply, as spoken.
    pub answer: String,
}

// ---------------------------------------------------------------------------
// VoiceSession
// ---------------------------------------------------------------------------

/// Drives one conversation made of push-to-talk exchanges.
///
/// Both entry points take `&self`, so a session can be shared behind an
/// `Arc`; the state machine rejects overlapping calls with
/// [`SessionError::InvalidState`].
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use voice_chat::audio::CpalCapture;
/// use voice_chat::config::AppConfig;
/// use voice_chat::llm::ApiConversant;
/// use voice_chat::pipeline::VoiceSession;
/// use voice_chat::stt::ApiTranscriber;
/// use voice_chat::tts::VoiceSpeaker;
///
/// # async fn example() -> Result<(), voice_chat::pipeline::SessionError> {
/// let config = AppConfig::default();
/// let session = VoiceSession::new(
///     config.session.clone(),
///     Arc::new(CpalCapture::new(None)),
///     Arc::new(ApiTranscriber::from_config(&config.api, &config.session.transcriber_model)),
///     Arc::new(ApiConversant::from_config(
///         &config.api,
///         &config.session.conversant_model,
///         config.conversation.temperature,
///     )),
///     Arc::new(VoiceSpeaker::from_config(&config)),
/// );
///
/// session.begin_capture().await?;
/// // ... user speaks ...
/// let outcome = session.end_capture_and_respond().await?;
/// println!("you: {}\nassistant: {}", outcome.transcript, outcome.answer);
/// # Ok(())
/// # }
/// ```
pub struct VoiceSession {
    config: SessionConfig,
    capture: Arc<dyn AudioCapture>,
    transcriber: Arc<dyn Transcriber>,
    conversant: Arc<dyn Conversant>,
    speaker: Arc<dyn Speaker>,
    state: Mutex<SessionState>,
    history: Mutex<DialogueHistory>,
}

impl VoiceSession {
    /// Create an idle session with an empty, unbounded history.
    ///
    /// Never fails; adapter problems surface on first use.
    pub fn new(
        config: SessionConfig,
        capture: Arc<dyn AudioCapture>,
        transcriber: Arc<dyn Transcriber>,
        conversant: Arc<dyn Conversant>,
        speaker: Arc<dyn Speaker>,
    ) -> Self {
        Self {
            config,
            capture,
            transcriber,
            conversant,
            speaker,
            state: Mutex::new(SessionState::Idle),
            history: Mutex::new(DialogueHistory::new()),
        }
    }

    /// Start from `history` instead of an empty log, e.g. one seeded with a
    /// system prompt via [`DialogueHistory::seeded`].
    pub fn with_history(self, history: DialogueHistory) -> Self {
        Self {
            history: Mutex::new(history),
            ..self
        }
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Start recording.  Accepted only while `Idle`.
    ///
    /// On failure the session stays `Idle` and the error is tagged
    /// `capture-start`.
    pub async fn begin_capture(&self) -> Result<(), SessionError> {
        self.transition(SessionState::Idle, SessionState::Capturing, "begin_capture")?;
        let reset = ResetOnDrop::new(&self.state);

        log::debug!("session: Idle → Capturing");
        match self.capture.start().await {
            Ok(()) => {
                reset.disarm();
                Ok(())
            }
            Err(e) => {
                log::error!("session: capture-start failed: {e}");
                Err(SessionError::CaptureStart(e))
            }
        }
    }

    /// Stop recording and run the rest of the exchange.  Accepted only while
    /// `Capturing`.
    ///
    /// Whatever happens, including the returned future being dropped part
    /// way, the session ends in `Idle`.
    pub async fn end_capture_and_respond(&self) -> Result<TurnOutcome, SessionError> {
        self.transition(
            SessionState::Capturing,
            SessionState::Stopping,
            "end_capture_and_respond",
        )?;
        let _reset = ResetOnDrop::new(&self.state);

        log::debug!("session: Capturing → Stopping");
        let result = self.run_exchange().await;
        if let Err(e) = &result {
            log::error!("session: {e}");
        }
        result
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    /// Owned copy of the dialogue so far, oldest first.
    pub fn history(&self) -> Vec<Turn> {
        lock(&self.history).snapshot()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Exchange
    // -----------------------------------------------------------------------

    async fn run_exchange(&self) -> Result<TurnOutcome, SessionError> {
        // ── 1. Stop capture ──────────────────────────────────────────────
        let audio = self
            .capture
            .stop()
            .await
            .map_err(SessionError::CaptureStop)?;
        log::debug!("session: captured {} bytes of audio", audio.len());

        // ── 2. Transcribe ────────────────────────────────────────────────
        self.set_state(SessionState::Transcribing);
        let transcript = self
            .transcriber
            .transcribe(&audio, &self.config.language)
            .await
            .map_err(SessionError::Transcription)?;

        if transcript.trim().is_empty() {
            log::warn!("session: empty transcript, forwarding to the conversant anyway");
        } else {
            log::debug!("session: transcript = {transcript:?}");
        }

        // ── 3. Converse ──────────────────────────────────────────────────
        self.set_state(SessionState::Conversing);
        let context = {
            let mut history = lock(&self.history);
            history.append(Turn::user(transcript.clone()));
            history.snapshot()
        };

        let answer = self
            .conversant
            .send(&context)
            .await
            .map_err(SessionError::Conversation)?;
        lock(&self.history).append(Turn::assistant(answer.clone()));
        log::debug!("session: answer = {answer:?}");

        // ── 4. Speak ─────────────────────────────────────────────────────
        self.set_state(SessionState::Speaking);
        if answer.trim().is_empty() {
            log::debug!("session: empty answer, nothing to speak");
        } else {
            self.speaker
                .speak(&answer, &self.config.language, self.config.voice_engine)
                .await
                .map_err(SessionError::Speech)?;
        }

        Ok(TurnOutcome { transcript, answer })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Atomically move `from → to`, or reject `operation`.
    fn transition(
        &self,
        from: SessionState,
        to: SessionState,
        operation: &'static str,
    ) -> Result<(), SessionError> {
        let mut state = lock(&self.state);
        if *state != from {
            log::warn!("session: rejected {operation} while {}", *state);
            return Err(SessionError::InvalidState {
                operation,
                state: *state,
            });
        }
        *state = to;
        Ok(())
    }

    fn set_state(&self, next: SessionState) {
        let mut state = lock(&self.state);
        log::debug!("session: {} → {next}", *state);
        *state = next;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// ResetOnDrop
// ---------------------------------------------------------------------------

/// Puts the session back to `Idle` when dropped, unless disarmed.
struct ResetOnDrop<'a> {
    state: &'a Mutex<SessionState>,
    armed: bool,
}

impl<'a> ResetOnDrop<'a> {
    fn new(state: &'a Mutex<SessionState>) -> Self {
        Self { state, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            *lock(self.state) = SessionState::Idle;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VoiceEngine;
    use crate::history::Role;
    use crate::stt::MockTranscriber;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::sync::Notify;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Capture that hands back a fixed payload.
    #[derive(Default)]
    struct StubCapture {
        fail_start: bool,
        fail_stop: bool,
    }

    #[async_trait]
    impl AudioCapture for StubCapture {
        async fn start(&self) -> Result<(), CaptureError> {
            if self.fail_start {
                return Err(CaptureError::PermissionDenied("microphone".into()));
            }
            Ok(())
        }

        async fn stop(&self) -> Result<Vec<u8>, CaptureError> {
            if self.fail_stop {
                return Err(CaptureError::Worker("stream vanished".into()));
            }
            Ok(b"RIFF....WAVE".to_vec())
        }
    }

    /// Conversant that replays queued replies and records what it was sent.
    /// Once the queue is empty it answers `"ok"`.
    #[derive(Default)]
    struct ScriptedConversant {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        received: Mutex<Vec<Vec<Turn>>>,
    }

    impl ScriptedConversant {
        fn replying(replies: impl IntoIterator<Item = Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                received: Mutex::new(Vec::new()),
            }
        }

        fn received(&self) -> Vec<Vec<Turn>> {
            self.received.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Conversant for ScriptedConversant {
        async fn send(&self, history: &[Turn]) -> Result<String, LlmError> {
            self.received.lock().unwrap().push(history.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("ok".into()))
        }
    }

    /// Conversant that blocks until released.
    struct GatedConversant {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl Conversant for GatedConversant {
        async fn send(&self, _history: &[Turn]) -> Result<String, LlmError> {
            self.gate.notified().await;
            Ok("released".into())
        }
    }

    /// Speaker that records every call.
    #[derive(Default)]
    struct RecordingSpeaker {
        fail: bool,
        spoken: Mutex<Vec<(String, String, VoiceEngine)>>,
    }

    impl RecordingSpeaker {
        fn spoken(&self) -> Vec<(String, String, VoiceEngine)> {
            self.spoken.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Speaker for RecordingSpeaker {
        async fn speak(
            &self,
            text: &str,
            language: &str,
            engine: VoiceEngine,
        ) -> Result<(), TtsError> {
            self.spoken
                .lock()
                .unwrap()
                .push((text.into(), language.into(), engine));
            if self.fail {
                return Err(TtsError::DeviceUnavailable {
                    program: "espeak-ng".into(),
                    reason: "not installed".into(),
                });
            }
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    struct Harness {
        session: VoiceSession,
        transcriber: Arc<MockTranscriber>,
        conversant: Arc<ScriptedConversant>,
        speaker: Arc<RecordingSpeaker>,
    }

    fn harness_with(
        capture: StubCapture,
        transcriber: MockTranscriber,
        conversant: ScriptedConversant,
        speaker: RecordingSpeaker,
    ) -> Harness {
        let transcriber = Arc::new(transcriber);
        let conversant = Arc::new(conversant);
        let speaker = Arc::new(speaker);
        let session = VoiceSession::new(
            SessionConfig::default(),
            Arc::new(capture),
            transcriber.clone(),
            conversant.clone(),
            speaker.clone(),
        );
        Harness {
            session,
            transcriber,
            conversant,
            speaker,
        }
    }

    fn harness(transcript: &str, answer: &str) -> Harness {
        harness_with(
            StubCapture::default(),
            MockTranscriber::ok(transcript),
            ScriptedConversant::replying([Ok(answer.to_string())]),
            RecordingSpeaker::default(),
        )
    }

    async fn exchange(session: &VoiceSession) -> Result<TurnOutcome, SessionError> {
        session.begin_capture().await?;
        session.end_capture_and_respond().await
    }

    // -----------------------------------------------------------------------
    // Construction and state machine
    // -----------------------------------------------------------------------

    #[test]
    fn new_session_is_idle_with_empty_history() {
        let h = harness("hi", "hello");
        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(h.session.history().is_empty());
        assert_eq!(h.session.config().language, "en");
    }

    #[test]
    fn session_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<VoiceSession>();
    }

    #[tokio::test]
    async fn begin_capture_moves_to_capturing() {
        let h = harness("hi", "hello");
        h.session.begin_capture().await.unwrap();
        assert_eq!(h.session.state(), SessionState::Capturing);
    }

    #[tokio::test]
    async fn begin_capture_twice_is_rejected() {
        let h = harness("hi", "hello");
        h.session.begin_capture().await.unwrap();

        let err = h.session.begin_capture().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidState {
                operation: "begin_capture",
                state: SessionState::Capturing,
            }
        ));
        assert_eq!(err.stage(), Stage::Session);
        assert_eq!(h.session.state(), SessionState::Capturing);
    }

    #[tokio::test]
    async fn end_without_capture_is_rejected() {
        let h = harness("hi", "hello");
        let err = h.session.end_capture_and_respond().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidState {
                state: SessionState::Idle,
                ..
            }
        ));
        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(h.conversant.received().is_empty());
    }

    // -----------------------------------------------------------------------
    // Successful exchanges
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn exchange_returns_outcome_and_appends_two_turns() {
        let h = harness("hello", "hi there");

        let outcome = exchange(&h.session).await.unwrap();

        assert_eq!(
            outcome,
            TurnOutcome {
                transcript: "hello".into(),
                answer: "hi there".into(),
            }
        );
        assert_eq!(
            h.session.history(),
            vec![Turn::user("hello"), Turn::assistant("hi there")]
        );
        assert_eq!(h.session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn conversant_sees_full_history_ending_with_new_user_turn() {
        let h = harness_with(
            StubCapture::default(),
            MockTranscriber::ok("again"),
            ScriptedConversant::replying([Ok("first".into()), Ok("second".into())]),
            RecordingSpeaker::default(),
        );

        exchange(&h.session).await.unwrap();
        exchange(&h.session).await.unwrap();

        let received = h.conversant.received();
        assert_eq!(received[0], vec![Turn::user("again")]);
        assert_eq!(
            received[1],
            vec![
                Turn::user("again"),
                Turn::assistant("first"),
                Turn::user("again"),
            ]
        );
    }

    #[tokio::test]
    async fn history_grows_by_two_per_exchange_even_with_identical_text() {
        let h = harness_with(
            StubCapture::default(),
            MockTranscriber::ok("same"),
            ScriptedConversant::replying([Ok("same".into()), Ok("same".into())]),
            RecordingSpeaker::default(),
        );

        exchange(&h.session).await.unwrap();
        assert_eq!(h.session.history().len(), 2);
        exchange(&h.session).await.unwrap();
        assert_eq!(h.session.history().len(), 4);

        let roles: Vec<Role> = h.session.history().iter().map(Turn::role).collect();
        assert_eq!(
            roles,
            [Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
    }

    #[tokio::test]
    async fn language_and_voice_engine_are_forwarded() {
        let transcriber = Arc::new(MockTranscriber::ok("hola"));
        let speaker = Arc::new(RecordingSpeaker::default());
        let config = SessionConfig {
            language: "es-MX".into(),
            voice_engine: VoiceEngine::Remote,
            ..SessionConfig::default()
        };
        let session = VoiceSession::new(
            config,
            Arc::new(StubCapture::default()),
            transcriber.clone(),
            Arc::new(ScriptedConversant::replying([Ok("buenas".into())])),
            speaker.clone(),
        );

        exchange(&session).await.unwrap();

        assert_eq!(transcriber.last_language().as_deref(), Some("es-MX"));
        assert_eq!(
            speaker.spoken(),
            vec![("buenas".to_string(), "es-MX".to_string(), VoiceEngine::Remote)]
        );
    }

    #[tokio::test]
    async fn empty_transcript_is_still_sent_to_conversant() {
        let h = harness("", "I didn't catch that");

        let outcome = exchange(&h.session).await.unwrap();

        assert_eq!(outcome.transcript, "");
        assert_eq!(h.conversant.received(), vec![vec![Turn::user("")]]);
        assert_eq!(h.session.history().len(), 2);
    }

    #[tokio::test]
    async fn empty_answer_skips_speaking() {
        let h = harness_with(
            StubCapture::default(),
            MockTranscriber::ok("hello"),
            ScriptedConversant::replying([Ok(String::new())]),
            RecordingSpeaker {
                fail: true,
                ..RecordingSpeaker::default()
            },
        );

        let outcome = exchange(&h.session).await.unwrap();

        assert_eq!(outcome.answer, "");
        assert!(h.speaker.spoken().is_empty());
        assert_eq!(h.session.history().last(), Some(&Turn::assistant("")));
    }

    #[tokio::test]
    async fn seeded_system_prompt_leads_every_request() {
        let h = harness("hi", "hello");
        let session = h
            .session
            .with_history(DialogueHistory::seeded(Some("Answer in one sentence."), None));

        exchange(&session).await.unwrap();

        let sent = &h.conversant.received()[0];
        assert_eq!(sent[0], Turn::system("Answer in one sentence."));
        assert_eq!(sent[1], Turn::user("hi"));
        assert_eq!(session.history().len(), 3);
    }

    #[tokio::test]
    async fn bounded_history_keeps_the_most_recent_turns() {
        let h = harness_with(
            StubCapture::default(),
            MockTranscriber::ok("q"),
            ScriptedConversant::default(),
            RecordingSpeaker::default(),
        );
        let session = h.session.with_history(DialogueHistory::with_max_turns(2));

        for _ in 0..3 {
            exchange(&session).await.unwrap();
        }

        assert_eq!(
            session.history(),
            vec![Turn::user("q"), Turn::assistant("ok")]
        );
    }

    #[tokio::test]
    async fn zero_turn_cap_still_sends_the_new_utterance() {
        let h = harness("hello", "hi there");
        let session = h
            .session
            .with_history(DialogueHistory::seeded(Some("sys"), Some(0)));

        exchange(&session).await.unwrap();
        exchange(&session).await.unwrap();

        let received = h.conversant.received();
        assert_eq!(received.len(), 2);
        for sent in &received {
            assert_eq!(sent, &vec![Turn::system("sys"), Turn::user("hello")]);
        }
        assert_eq!(
            session.history(),
            vec![Turn::system("sys"), Turn::assistant("ok")]
        );
    }

    // -----------------------------------------------------------------------
    // Stage failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn capture_start_failure_leaves_session_idle() {
        let h = harness_with(
            StubCapture {
                fail_start: true,
                ..StubCapture::default()
            },
            MockTranscriber::ok("unused"),
            ScriptedConversant::default(),
            RecordingSpeaker::default(),
        );

        let err = h.session.begin_capture().await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::CaptureStart(CaptureError::PermissionDenied(_))
        ));
        assert_eq!(err.stage(), Stage::CaptureStart);
        assert_eq!(h.session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn capture_stop_failure_skips_later_stages() {
        let h = harness_with(
            StubCapture {
                fail_stop: true,
                ..StubCapture::default()
            },
            MockTranscriber::ok("unused"),
            ScriptedConversant::default(),
            RecordingSpeaker::default(),
        );

        let err = exchange(&h.session).await.unwrap_err();

        assert_eq!(err.stage(), Stage::CaptureStop);
        assert!(h.transcriber.last_language().is_none());
        assert!(h.conversant.received().is_empty());
        assert!(h.session.history().is_empty());
        assert_eq!(h.session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn transcription_failure_leaves_history_untouched() {
        let h = harness_with(
            StubCapture::default(),
            MockTranscriber::err(SttError::Timeout),
            ScriptedConversant::default(),
            RecordingSpeaker::default(),
        );

        let err = exchange(&h.session).await.unwrap_err();

        assert!(matches!(err, SessionError::Transcription(SttError::Timeout)));
        assert!(h.conversant.received().is_empty());
        assert!(h.session.history().is_empty());
        assert_eq!(h.session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn conversation_failure_keeps_the_user_turn() {
        let h = harness_with(
            StubCapture::default(),
            MockTranscriber::ok("are you there"),
            ScriptedConversant::replying([Err(LlmError::Api {
                status: 503,
                body: "overloaded".into(),
            })]),
            RecordingSpeaker::default(),
        );

        let err = exchange(&h.session).await.unwrap_err();

        assert_eq!(err.stage(), Stage::Converse);
        assert_eq!(h.session.history(), vec![Turn::user("are you there")]);
        assert!(h.speaker.spoken().is_empty());
        assert_eq!(h.session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn speech_failure_keeps_both_turns() {
        let h = harness_with(
            StubCapture::default(),
            MockTranscriber::ok("say something"),
            ScriptedConversant::replying([Ok("something".into())]),
            RecordingSpeaker {
                fail: true,
                ..RecordingSpeaker::default()
            },
        );

        let err = exchange(&h.session).await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::Speech(TtsError::DeviceUnavailable { .. })
        ));
        assert_eq!(
            h.session.history(),
            vec![Turn::user("say something"), Turn::assistant("something")]
        );
        assert_eq!(h.session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn session_recovers_after_a_failed_exchange() {
        let h = harness_with(
            StubCapture::default(),
            MockTranscriber::ok("retry"),
            ScriptedConversant::replying([Err(LlmError::Timeout), Ok("fine".into())]),
            RecordingSpeaker::default(),
        );

        assert!(exchange(&h.session).await.is_err());
        let outcome = exchange(&h.session).await.unwrap();

        assert_eq!(outcome.answer, "fine");
        // The dangling user turn from the failed exchange is still there.
        assert_eq!(
            h.session.history(),
            vec![
                Turn::user("retry"),
                Turn::user("retry"),
                Turn::assistant("fine"),
            ]
        );
    }

    #[test]
    fn error_display_and_source_name_the_stage_and_cause() {
        use std::error::Error as _;

        let err = SessionError::Conversation(LlmError::Timeout);
        assert_eq!(err.to_string(), "converse failed: LLM request timed out");
        assert!(err.source().is_some());
        assert_eq!(Stage::CaptureStop.to_string(), "capture-stop");
    }

    // -----------------------------------------------------------------------
    // Concurrency and cancellation
    // -----------------------------------------------------------------------

    fn gated_session(gate: Arc<Notify>) -> VoiceSession {
        VoiceSession::new(
            SessionConfig::default(),
            Arc::new(StubCapture::default()),
            Arc::new(MockTranscriber::ok("wait")),
            Arc::new(GatedConversant { gate }),
            Arc::new(RecordingSpeaker::default()),
        )
    }

    #[tokio::test]
    async fn calls_during_an_exchange_are_rejected() {
        let gate = Arc::new(Notify::new());
        let session = Arc::new(gated_session(gate.clone()));
        session.begin_capture().await.unwrap();

        let running = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.end_capture_and_respond().await })
        };

        tokio::time::timeout(Duration::from_secs(5), async {
            while session.state() != SessionState::Conversing {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("exchange never reached Conversing");

        assert!(session.state().is_busy());
        assert!(matches!(
            session.begin_capture().await,
            Err(SessionError::InvalidState {
                state: SessionState::Conversing,
                ..
            })
        ));
        assert!(matches!(
            session.end_capture_and_respond().await,
            Err(SessionError::InvalidState { .. })
        ));

        gate.notify_one();
        let outcome = running.await.unwrap().unwrap();
        assert_eq!(outcome.answer, "released");
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn dropping_an_exchange_returns_to_idle() {
        let gate = Arc::new(Notify::new());
        let session = gated_session(gate);
        session.begin_capture().await.unwrap();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(50),
            session.end_capture_and_respond(),
        )
        .await;

        assert!(cancelled.is_err());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.history(), vec![Turn::user("wait")]);
        assert!(session.begin_capture().await.is_ok());
    }
}
