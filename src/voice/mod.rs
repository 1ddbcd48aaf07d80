//! Voice interaction
//!
//! One session at a time: capture an utterance, send the transcript to the
//! assistant, speak the answer. Speech engines and the command endpoint are
//! injected through [`SpeechIo`] and [`CommandDispatcher`].

pub mod commands;
pub mod controller;
pub mod dispatcher;
pub mod session;
pub mod speech;

pub use commands::{QUICK_COMMANDS, QuickCommand, find_quick_command};
pub use controller::VoiceInteractionController;
pub use dispatcher::CommandDispatcher;
pub use session::{FALLBACK_RESPONSE, Rejection, SessionOutcome, VoiceSession, VoiceState};
pub use speech::{ConsoleSpeech, SpeechCapabilities, SpeechIo};
