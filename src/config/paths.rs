//! Where voice-chat keeps its files.
//!
//! Two roots, both resolved through `dirs` and suffixed with `voice-chat`:
//!
//! * the platform config directory holds `settings.toml`, written with
//!   defaults on first launch;
//! * the platform local-data directory holds `models/`, searched for
//!   `ggml-<name>.bin` when `stt.backend = "local"`.
//!
//! The remote backends never touch the models directory.

use std::path::{Path, PathBuf};

/// Resolved locations of the settings file and the local model store.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    /// `<config_dir>/settings.toml`, read by [`AppConfig::load`](super::AppConfig::load).
    pub settings_file: PathBuf,
    /// Lookup directory for [`model_file`](Self::model_file).
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice-chat";

    /// Paths under the platform directories, or under `.` where the
    /// platform reports none.
    pub fn new() -> Self {
        let config_root = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        let data_root = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::rooted_at(&config_root, &data_root)
    }

    /// Paths under explicit roots.
    pub fn rooted_at(config_root: &Path, data_root: &Path) -> Self {
        let config_dir = config_root.join(Self::APP_NAME);
        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            models_dir: data_root.join(Self::APP_NAME).join("models"),
        }
    }

    /// On-disk location of a GGML model given its name.
    ///
    /// `"base.en"` resolves to `<models_dir>/ggml-base.en.bin`; a name that
    /// already ends in `.bin` is used as the file name unchanged.
    pub fn model_file(&self, model: &str) -> PathBuf {
        if model.ends_with(".bin") {
            self.models_dir.join(model)
        } else {
            self.models_dir.join(format!("ggml-{model}.bin"))
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
