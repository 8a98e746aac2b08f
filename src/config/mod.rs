//! Configuration module for the voice chat session.
//!
//! Provides `AppConfig` (top-level settings), `SessionConfig` (the immutable
//! per-session options), sub-configs for each adapter, `AppPaths` for
//! cross-platform data directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    ApiConfig, AppConfig, AudioConfig, ConversationConfig, SessionConfig, SpeechConfig,
    SttBackend, SttConfig, VoiceEngine,
};
