//! Error types for the cockpit client

use thiserror::Error;

/// Result type alias for cockpit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the cockpit client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Telemetry poll or push channel failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Speech capture failed
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Command round trip to the backend failed
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// Speech output failed
    #[error("playback error: {0}")]
    Playback(String),

    /// Host has no speech support
    #[error("speech capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Command text was empty
    #[error("command text is empty")]
    EmptyCommand,

    /// Metric name not known to the backend
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// User-facing error taxonomy
///
/// Everything a voice session or the dashboard surfaces collapses into one of
/// these kinds; none of them is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Poll or push failure
    Transport,
    /// Capture failure
    Recognition,
    /// Command round-trip failure
    Dispatch,
    /// Speech-output failure
    Playback,
    /// No speech support on the host
    CapabilityUnavailable,
}

impl ErrorKind {
    /// Short message suitable for display next to the session
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Transport => "Lost connection to the vehicle backend.",
            Self::Recognition => "Sorry, I didn't catch that.",
            Self::Dispatch => "The assistant could not be reached.",
            Self::Playback => "Could not play the response.",
            Self::CapabilityUnavailable => "Speech recognition is not supported here.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Transport => "TransportError",
            Self::Recognition => "RecognitionError",
            Self::Dispatch => "DispatchError",
            Self::Playback => "PlaybackError",
            Self::CapabilityUnavailable => "CapabilityUnavailable",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Map onto the user-facing taxonomy
    ///
    /// Returns `None` for configuration, usage and local IO problems, which
    /// never reach a voice session.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Transport(_) | Self::Http(_) => Some(ErrorKind::Transport),
            Self::Recognition(_) => Some(ErrorKind::Recognition),
            Self::Dispatch(_) | Self::EmptyCommand => Some(ErrorKind::Dispatch),
            Self::Playback(_) => Some(ErrorKind::Playback),
            Self::CapabilityUnavailable(_) => Some(ErrorKind::CapabilityUnavailable),
            Self::Config(_)
            | Self::UnknownMetric(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Toml(_) => None,
        }
    }
}
