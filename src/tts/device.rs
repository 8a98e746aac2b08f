//! Platform voice via a local CLI engine.
//!
//! | Platform | Program      | Language                         |
//! |----------|--------------|----------------------------------|
//! | macOS    | `say`        | system voice (no per-call hint)  |
//! | Windows  | `powershell` | System.Speech culture hint       |
//! | other    | `espeak-ng`  | `-v <primary subtag>`            |
//!
//! The text is always written to the program's stdin so it is never parsed
//! as command-line arguments.  A configured override program is run with no
//! arguments and must read the text from stdin.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::stt::primary_language;
use crate::tts::speaker::TtsError;

/// Program plus arguments for one synthesis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl VoiceCommand {
    /// Default command for the current platform.
    pub fn platform_default(language: &str) -> Self {
        if cfg!(target_os = "macos") {
            Self::say()
        } else if cfg!(target_os = "windows") {
            Self::powershell(language)
        } else {
            Self::espeak(language)
        }
    }

    fn say() -> Self {
        Self {
            program: "say".into(),
            args: Vec::new(),
        }
    }

    fn espeak(language: &str) -> Self {
        let mut args = Vec::with_capacity(3);
        let lang = primary_language(language);
        if !lang.is_empty() {
            args.push("-v".into());
            args.push(lang);
        }
        args.push("--stdin".into());
        Self {
            program: "espeak-ng".into(),
            args,
        }
    }

    fn powershell(language: &str) -> Self {
        // Only [A-Za-z0-9-] survives into the script.
        let culture: String = language
            .replace('_', "-")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        let script = format!(
            "Add-Type -AssemblyName System.Speech; \
             $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
             try {{ $s.SelectVoiceByHints('NotSet', 'NotSet', 0, [System.Globalization.CultureInfo]'{culture}') }} catch {{ }}; \
             $s.Speak([Console]::In.ReadToEnd())"
        );
        Self {
            program: "powershell".into(),
            args: vec!["-NoProfile".into(), "-Command".into(), script],
        }
    }
}

/// Speaks text with the local platform voice.
#[derive(Debug, Clone, Default)]
pub struct DeviceVoice {
    program_override: Option<String>,
}

impl DeviceVoice {
    /// `program_override` replaces the platform default when set.
    pub fn new(program_override: Option<String>) -> Self {
        Self { program_override }
    }

    /// The command that [`speak`](Self::speak) would run for `language`.
    pub fn command_for(&self, language: &str) -> VoiceCommand {
        match &self.program_override {
            Some(program) => VoiceCommand {
                program: program.clone(),
                args: Vec::new(),
            },
            None => VoiceCommand::platform_default(language),
        }
    }

    /// Run the voice program and wait for it to finish speaking.
    pub async fn speak(&self, text: &str, language: &str) -> Result<(), TtsError> {
        let VoiceCommand { program, args } = self.command_for(language);

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TtsError::DeviceUnavailable {
                program: program.clone(),
                reason: e.to_string(),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(text.as_bytes()).await {
                // The program may exit without reading; its status decides.
                log::warn!("tts: could not write text to {program}: {e}");
            }
            // Dropping stdin sends EOF.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TtsError::Worker(e.to_string()))?;

        if !output.status.success() {
            return Err(TtsError::DeviceFailed {
                program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn espeak_gets_primary_language_and_stdin_flag() {
        let cmd = VoiceCommand::espeak("pt-BR");
        assert_eq!(cmd.program, "espeak-ng");
        assert_eq!(cmd.args, ["-v", "pt", "--stdin"]);
    }

    #[test]
    fn espeak_without_language_omits_voice_flag() {
        assert_eq!(VoiceCommand::espeak("").args, ["--stdin"]);
    }

    #[test]
    fn powershell_script_strips_unsafe_characters() {
        let cmd = VoiceCommand::powershell("en_US'; rm -r /");
        let script = cmd.args.last().unwrap();
        assert!(script.contains("'en-USrm-r'"), "script: {script}");
        assert!(!script.contains("; rm"));
    }

    #[test]
    fn override_runs_without_arguments() {
        let voice = DeviceVoice::new(Some("my-tts".into()));
        let cmd = voice.command_for("de");
        assert_eq!(cmd.program, "my-tts");
        assert!(cmd.args.is_empty());
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let voice = DeviceVoice::new(Some("/nonexistent/voice-binary".into()));
        let err = voice.speak("hello", "en").await.unwrap_err();
        assert!(matches!(err, TtsError::DeviceUnavailable { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn program_reading_stdin_succeeds() {
        let voice = DeviceVoice::new(Some("cat".into()));
        assert!(voice.speak("hello there", "en").await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_program_reports_device_failed() {
        let voice = DeviceVoice::new(Some("false".into()));
        let err = voice.speak("hello", "en").await.unwrap_err();
        assert!(matches!(err, TtsError::DeviceFailed { .. }));
    }
}
