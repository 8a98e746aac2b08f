//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// VoiceEngine
// ---------------------------------------------------------------------------

/// Selects where the assistant's reply is synthesised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceEngine {
    /// Local platform voice (`say`, `espeak-ng`, System.Speech).
    Device,
    /// Remote synthesis API; the returned audio is played locally.
    Remote,
}

impl Default for VoiceEngine {
    fn default() -> Self {
        Self::Device
    }
}

impl std::fmt::Display for VoiceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceEngine::Device => f.write_str("device"),
            VoiceEngine::Remote => f.write_str("remote"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Options captured once when a session is created.
///
/// The session never mutates its copy, so changing settings on disk only
/// affects sessions constructed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Speech-to-text model variant (remote model id, or local GGML name).
    pub transcriber_model: String,
    /// Chat model identifier sent to the conversant.
    pub conversant_model: String,
    /// BCP-47-style language tag used for transcription and synthesis.
    pub language: String,
    /// Local or remote speech synthesis.
    pub voice_engine: VoiceEngine,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transcriber_model: "whisper-1".into(),
            conversant_model: "gpt-4o-mini".into(),
            language: "en".into(),
            voice_engine: VoiceEngine::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

/// Connection settings shared by every OpenAI-compatible adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the API (no trailing `/v1`).
    pub base_url: String,
    /// API key.  When `None` the `OPENAI_API_KEY` environment variable is
    /// consulted instead.
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    /// Environment variable consulted when `api_key` is unset.
    pub const API_KEY_ENV: &'static str = "OPENAI_API_KEY";

    /// The configured key, or the environment fallback.  Empty strings are
    /// treated as "no key".
    pub fn resolved_api_key(&self) -> Option<String> {
        pick_api_key(self.api_key.as_deref(), || std::env::var(Self::API_KEY_ENV).ok())
    }

    /// Join `path` onto `base_url` without doubling slashes.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// A non-empty configured key wins; otherwise a non-empty `env` value.
fn pick_api_key(configured: Option<&str>, env: impl FnOnce() -> Option<String>) -> Option<String> {
    configured
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| env().filter(|k| !k.is_empty()))
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Which transcriber binding the application wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SttBackend {
    /// OpenAI-compatible `/v1/audio/transcriptions`.
    Api,
    /// In-process whisper.cpp via `whisper-rs`.
    Local,
}

impl Default for SttBackend {
    fn default() -> Self {
        Self::Api
    }
}

/// Settings for the speech-to-text binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    pub backend: SttBackend,
    /// Attempt GPU-accelerated inference for the local backend.
    pub use_gpu: bool,
    /// Remote model id used when the local model cannot be loaded.
    pub fallback_model: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            backend: SttBackend::default(),
            use_gpu: false,
            fallback_model: "whisper-1".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ConversationConfig
// ---------------------------------------------------------------------------

/// Settings for the conversational exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Seeded as a `system` turn when a session starts.
    pub system_prompt: Option<String>,
    /// Cap on retained user/assistant turns.  `None` keeps everything; the
    /// newest turn is kept even when the cap is `0`.
    pub max_turns: Option<usize>,
    /// Sampling temperature sent with every chat request.
    pub temperature: f32,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_turns: None,
            temperature: 0.7,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Settings for speech synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Voice name for the remote engine.
    pub remote_voice: String,
    /// Model identifier for the remote engine.
    pub remote_model: String,
    /// Program used by the device engine.  `None` picks the platform
    /// default (`say`, `powershell`, `espeak-ng`).
    pub device_command: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            remote_voice: "alloy".into(),
            remote_model: "tts-1".into(),
            device_command: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for microphone capture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name; `None` means the system default.
    pub input_device: Option<String>,
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// Missing sections fall back to their defaults, so a file containing only
/// `[session]` is valid.
///
/// ```rust,no_run
/// use voice_chat::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// println!("{}", config.session.language);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub api: ApiConfig,
    pub stt: SttConfig,
    pub conversation: ConversationConfig,
    pub speech: SpeechConfig,
    pub audio: AudioConfig,
}

impl AppConfig {
    /// Model id to send to the remote transcription endpoint.
    ///
    /// With the `local` backend `session.transcriber_model` is a GGML file
    /// name, so the remote fallback uses `stt.fallback_model` instead.
    pub fn remote_transcriber_model(&self) -> &str {
        match self.stt.backend {
            SttBackend::Api => &self.session.transcriber_model,
            SttBackend::Local => &self.stt.fallback_model,
        }
    }

    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
