//! Configuration management for the cockpit client

pub mod file;

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use self::file::CockpitConfigFile;
use crate::{Error, Result};

/// Default backend REST base URL
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Default telemetry poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Default request timeout for backend calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Cockpit client configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub backend: BackendConfig,
    pub telemetry: TelemetryConfig,
    pub voice: VoiceConfig,
}

/// Backend endpoints
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// REST base URL
    pub url: String,

    /// Explicit push websocket URL
    pub push_url: Option<String>,

    /// Open the push channel at all
    pub push_enabled: bool,

    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_string(),
            push_url: None,
            push_enabled: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Telemetry sync timing
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub poll_interval: Duration,

    /// Explicit staleness window; twice the poll interval when unset
    pub staleness_window: Option<Duration>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            staleness_window: None,
        }
    }
}

/// Voice session behavior
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Fixed recognition locale
    pub locale: String,

    /// Speak the fallback message after a failed command
    pub speak_fallback: bool,

    /// Relay playback to the backend speaker
    pub server_tts: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            speak_fallback: false,
            server_tts: false,
        }
    }
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if an environment variable or file value is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Assemble configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be parsed or the result is invalid
    pub fn from_sources(fc: CockpitConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let backend = BackendConfig {
            url: env("COCKPIT_BACKEND_URL")
                .or(fc.backend.url)
                .unwrap_or(defaults.backend.url),
            push_url: env("COCKPIT_PUSH_URL").or(fc.backend.push_url),
            push_enabled: env_flag(&env, "COCKPIT_PUSH_ENABLED")?
                .or(fc.backend.push_enabled)
                .unwrap_or(defaults.backend.push_enabled),
            request_timeout: env_parse::<u64>(&env, "COCKPIT_REQUEST_TIMEOUT_MS")?
                .or(fc.backend.request_timeout_ms)
                .map_or(defaults.backend.request_timeout, Duration::from_millis),
        };

        let telemetry = TelemetryConfig {
            poll_interval: env_parse::<u64>(&env, "COCKPIT_POLL_INTERVAL_MS")?
                .or(fc.telemetry.poll_interval_ms)
                .map_or(defaults.telemetry.poll_interval, Duration::from_millis),
            staleness_window: env_parse::<u64>(&env, "COCKPIT_STALENESS_MS")?
                .or(fc.telemetry.staleness_window_ms)
                .map(Duration::from_millis),
        };

        let voice = VoiceConfig {
            locale: env("COCKPIT_LOCALE")
                .or(fc.voice.locale)
                .unwrap_or(defaults.voice.locale),
            speak_fallback: env_flag(&env, "COCKPIT_SPEAK_FALLBACK")?
                .or(fc.voice.speak_fallback)
                .unwrap_or(defaults.voice.speak_fallback),
            server_tts: env_flag(&env, "COCKPIT_SERVER_TTS")?
                .or(fc.voice.server_tts)
                .unwrap_or(defaults.voice.server_tts),
        };

        let config = Self {
            backend,
            telemetry,
            voice,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values that cannot be expressed in the types
    ///
    /// # Errors
    ///
    /// Returns error on a zero poll interval or staleness window, or an
    /// unparseable URL
    pub fn validate(&self) -> Result<()> {
        if self.telemetry.poll_interval.is_zero() {
            return Err(Error::Config("poll interval must be positive".to_string()));
        }
        if self.telemetry.staleness_window.is_some_and(|w| w.is_zero()) {
            return Err(Error::Config("staleness window must be positive".to_string()));
        }
        if self.backend.request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be positive".to_string()));
        }

        Url::parse(&self.backend.url)
            .map_err(|e| Error::Config(format!("invalid backend url {}: {e}", self.backend.url)))?;
        if let Some(push_url) = &self.backend.push_url {
            Url::parse(push_url)
                .map_err(|e| Error::Config(format!("invalid push url {push_url}: {e}")))?;
        }

        Ok(())
    }

    /// Staleness window, defaulting to twice the poll interval
    #[must_use]
    pub fn staleness_window(&self) -> Duration {
        self.telemetry
            .staleness_window
            .unwrap_or(self.telemetry.poll_interval * 2)
    }

    /// Push websocket URL, or `None` when push is disabled
    ///
    /// Without an explicit URL the backend URL is reused with `http` mapped
    /// to `ws` (`https` to `wss`) and path `/ws`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL cannot be derived
    pub fn push_url(&self) -> Result<Option<String>> {
        if !self.backend.push_enabled {
            return Ok(None);
        }
        if let Some(explicit) = &self.backend.push_url {
            return Ok(Some(explicit.clone()));
        }

        let mut url = Url::parse(&self.backend.url)
            .map_err(|e| Error::Config(format!("invalid backend url {}: {e}", self.backend.url)))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(Error::Config(format!(
                    "cannot derive push url from {other} scheme"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::Config(format!("cannot use {scheme} scheme")))?;
        url.set_path("/ws");
        url.set_query(None);

        Ok(Some(url.to_string()))
    }
}

fn env_parse<T>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {key}={raw}: {e}")))
        })
        .transpose()
}

fn env_flag(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    env(key)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::Config(format!("invalid {key}={raw}: expected a boolean"))),
        })
        .transpose()
}
