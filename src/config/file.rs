//! TOML configuration file loading
//!
//! Supports `~/.config/cockpit/config.toml` as a persistent config source.
//! All fields are optional: the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct CockpitConfigFile {
    /// Backend endpoints
    #[serde(default)]
    pub backend: BackendFileConfig,

    /// Telemetry sync timing
    #[serde(default)]
    pub telemetry: TelemetryFileConfig,

    /// Voice session behavior
    #[serde(default)]
    pub voice: VoiceFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct BackendFileConfig {
    /// REST base URL (e.g. "http://localhost:8000")
    pub url: Option<String>,

    /// Push websocket URL; derived from `url` when unset
    pub push_url: Option<String>,

    pub push_enabled: Option<bool>,

    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TelemetryFileConfig {
    pub poll_interval_ms: Option<u64>,

    /// Defaults to twice the poll interval
    pub staleness_window_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Recognition locale (e.g. "en-US")
    pub locale: Option<String>,

    /// Speak the fallback message after a failed command
    pub speak_fallback: Option<bool>,

    /// Relay playback to the backend's `/voice/speak`
    pub server_tts: Option<bool>,
}

/// Load the TOML config file from the standard path
///
/// Returns `CockpitConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> CockpitConfigFile {
    let Some(path) = config_file_path() else {
        return CockpitConfigFile::default();
    };
    if !path.exists() {
        return CockpitConfigFile::default();
    }

    load_from(&path).unwrap_or_else(|e| {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to load config file, using defaults"
        );
        CockpitConfigFile::default()
    })
}

/// Load a TOML config file from an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn load_from(path: &Path) -> Result<CockpitConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/cockpit/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("cockpit").join("config.toml"))
}
