//! Voice session state

use std::fmt;

use crate::error::ErrorKind;

/// Spoken after a failed command round trip
pub const FALLBACK_RESPONSE: &str = "Sorry, I encountered an error. Please try again.";

/// Voice session state machine
///
/// ```text
/// Idle -> Listening -> Transcribing -> Dispatching -> Speaking -> Idle
///            |                             |             |
///            +-------------> Errored <-----+-------------+
///                               |
///                               +--> Idle
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum VoiceState {
    #[default]
    Idle,
    Listening,
    Transcribing,
    Dispatching,
    Speaking,
    Errored,
}

impl VoiceState {
    /// Whether a new session may start from this state
    #[must_use]
    pub const fn accepts_start(self) -> bool {
        matches!(self, Self::Idle | Self::Errored)
    }
}

impl fmt::Display for VoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Transcribing => "transcribing",
            Self::Dispatching => "dispatching",
            Self::Speaking => "speaking",
            Self::Errored => "errored",
        };
        f.write_str(label)
    }
}

/// The single voice session, as published to subscribers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceSession {
    pub(crate) state: VoiceState,
    pub(crate) transcript: Option<String>,
    pub(crate) response_text: Option<String>,
    pub(crate) error: Option<ErrorKind>,
    pub(crate) capture_disabled: bool,
}

impl VoiceSession {
    #[must_use]
    pub const fn state(&self) -> VoiceState {
        self.state
    }

    /// Transcript of the current or last session
    #[must_use]
    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }

    /// Last response (or fallback) text, kept until replaced
    #[must_use]
    pub fn response_text(&self) -> Option<&str> {
        self.response_text.as_deref()
    }

    /// Error of the last session, cleared when the next one starts
    #[must_use]
    pub const fn error(&self) -> Option<ErrorKind> {
        self.error
    }

    /// Set once recognition was found unsupported
    #[must_use]
    pub const fn capture_disabled(&self) -> bool {
        self.capture_disabled
    }
}

/// Why an operation was refused without starting a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Another session is in progress
    Busy(VoiceState),
    /// Recognition is unsupported; reported once
    CaptureUnavailable,
    /// Recognition was already found unsupported
    CaptureDisabled,
    /// Command text was blank
    EmptyCommand,
    /// No previous response to replay
    NothingToRepeat,
    /// Synthesis is unsupported
    PlaybackUnavailable,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy(state) => write!(f, "busy ({state})"),
            Self::CaptureUnavailable => f.write_str("speech recognition unavailable"),
            Self::CaptureDisabled => f.write_str("speech recognition disabled"),
            Self::EmptyCommand => f.write_str("empty command"),
            Self::NothingToRepeat => f.write_str("nothing to repeat"),
            Self::PlaybackUnavailable => f.write_str("speech synthesis unavailable"),
        }
    }
}

/// Result of a controller operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Session finished with a response
    Completed { response: String },
    /// Session ran and ended in error
    Failed(ErrorKind),
    /// Operation refused
    Rejected(Rejection),
}

impl SessionOutcome {
    /// Response text if the session completed
    #[must_use]
    pub fn response(&self) -> Option<&str> {
        match self {
            Self::Completed { response } => Some(response),
            Self::Failed(_) | Self::Rejected(_) => None,
        }
    }
}
