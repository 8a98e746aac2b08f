//! Application entry point: a console push-to-talk voice chat.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (writes defaults on first run).
//! 3. Build the four capabilities from config.
//! 4. Build the [`VoiceSession`], seeding the system prompt.
//! 5. Read commands from stdin until `q` or Ctrl-C:
//!    * Enter while idle starts recording;
//!    * Enter while recording stops, answers, and speaks;
//!    * `history` prints the dialogue so far.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use voice_chat::{
    audio::CpalCapture,
    config::{AppConfig, AppPaths, SttBackend},
    history::DialogueHistory,
    llm::ApiConversant,
    pipeline::{SessionState, VoiceSession},
    stt::{ApiTranscriber, TranscribeParams, Transcriber, WhisperTranscriber},
    tts::VoiceSpeaker,
};

// ---------------------------------------------------------------------------
// Capability construction
// ---------------------------------------------------------------------------

/// Pick the transcriber for the configured backend.
///
/// A local model that fails to load degrades to the remote endpoint with
/// `stt.fallback_model`, since the local model name is a GGML file name.
fn build_transcriber(config: &AppConfig) -> Arc<dyn Transcriber> {
    let model = &config.session.transcriber_model;
    let remote = || -> Arc<dyn Transcriber> {
        Arc::new(ApiTranscriber::from_config(
            &config.api,
            config.remote_transcriber_model(),
        ))
    };

    match config.stt.backend {
        SttBackend::Api => remote(),
        SttBackend::Local => {
            let path = AppPaths::new().model_file(model);
            let params = TranscribeParams {
                use_gpu: config.stt.use_gpu,
                ..TranscribeParams::default()
            };
            match WhisperTranscriber::load(&path, params) {
                Ok(engine) => {
                    log::info!("Whisper model loaded: {}", path.display());
                    Arc::new(engine)
                }
                Err(e) => {
                    log::warn!(
                        "Could not load Whisper model ({}): {e}. Using the remote transcriber.",
                        path.display()
                    );
                    remote()
                }
            }
        }
    }
}

fn build_session(config: &AppConfig) -> VoiceSession {
    let conversant = ApiConversant::from_config(
        &config.api,
        &config.session.conversant_model,
        config.conversation.temperature,
    );

    VoiceSession::new(
        config.session.clone(),
        Arc::new(CpalCapture::new(config.audio.input_device.clone())),
        build_transcriber(config),
        Arc::new(conversant),
        Arc::new(VoiceSpeaker::from_config(config)),
    )
    .with_history(DialogueHistory::seeded(
        config.conversation.system_prompt.as_deref(),
        config.conversation.max_turns,
    ))
}

// ---------------------------------------------------------------------------
// Console loop
// ---------------------------------------------------------------------------

async fn handle_line(session: &VoiceSession, line: &str) {
    match line {
        "history" => {
            for turn in session.history() {
                println!("{:>9}: {}", turn.role(), turn.content());
            }
        }
        "" => match session.state() {
            SessionState::Idle => match session.begin_capture().await {
                Ok(()) => println!("● recording — press Enter to stop"),
                Err(e) => eprintln!("error: {e}"),
            },
            SessionState::Capturing => match session.end_capture_and_respond().await {
                Ok(outcome) => {
                    println!("you:       {}", outcome.transcript);
                    println!("assistant: {}", outcome.answer);
                }
                Err(e) => eprintln!("error: {e}"),
            },
            busy => println!("busy ({busy}), try again"),
        },
        other => println!("unknown command {other:?} (Enter, history, q)"),
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice-chat starting up");

    // 2. Configuration
    let paths = AppPaths::new();
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    if !paths.settings_file.exists() {
        match config.save() {
            Ok(()) => log::info!("Wrote default settings to {}", paths.settings_file.display()),
            Err(e) => log::warn!("Could not write default settings: {e}"),
        }
    }
    if config.api.resolved_api_key().is_none() {
        log::warn!("No API key configured; remote requests are sent unauthenticated");
    }

    // 3–4. Capabilities and session
    let session = build_session(&config);
    log::info!(
        "session ready (language={}, voice={}, model={})",
        session.config().language,
        session.config().voice_engine,
        session.config().conversant_model
    );

    // 5. Console loop
    println!("Press Enter to talk, Enter again to send. Type `history` or `q`.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line == "q" || line == "quit" {
                    break;
                }
                handle_line(&session, line).await;
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    log::info!("voice-chat shutting down");
    Ok(())
}
