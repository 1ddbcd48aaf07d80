//! Speech capability surface
//!
//! Capture-to-text and text-to-speech are provided by the host. The controller
//! only sees this trait, so a terminal, a browser bridge or a test stub can
//! stand in for the engines.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::{Mutex, Notify};

use crate::backend::BackendClient;
use crate::{Error, Result};

/// What the host can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechCapabilities {
    pub recognition: bool,
    pub synthesis: bool,
}

/// Host speech engines
///
/// Implementations must report a missing capability as
/// [`Error::CapabilityUnavailable`], distinct from runtime failures
/// ([`Error::Recognition`], [`Error::Playback`]), so the controller can
/// disable the feature instead of looping on errors.
#[async_trait]
pub trait SpeechIo: Send + Sync {
    /// Capabilities of the host
    fn capabilities(&self) -> SpeechCapabilities;

    /// Capture one utterance and return its transcript
    ///
    /// One-shot, non-continuous: resolves after the first final result.
    async fn capture(&self) -> Result<String>;

    /// Speak text, resolving when playback ends
    async fn speak(&self, text: &str) -> Result<()>;

    /// Stop any in-flight capture or playback
    fn stop(&self);
}

/// Terminal speech: a typed line is the recognized utterance, printed text is
/// the playback
///
/// Playback can additionally be relayed to the backend's own speaker via
/// `POST /voice/speak`.
pub struct ConsoleSpeech<R> {
    input: Mutex<Lines<R>>,
    interactive: bool,
    locale: String,
    remote: Option<BackendClient>,
    cancel: Notify,
}

impl<R> ConsoleSpeech<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Create console speech over a line source
    ///
    /// `interactive` should be false when input is not a terminal; capture is
    /// then reported unsupported.
    pub fn new(reader: R, interactive: bool, locale: impl Into<String>) -> Self {
        Self {
            input: Mutex::new(reader.lines()),
            interactive,
            locale: locale.into(),
            remote: None,
            cancel: Notify::new(),
        }
    }

    /// Relay every playback to the backend's speaker as well
    #[must_use]
    pub fn with_server_tts(mut self, client: BackendClient) -> Self {
        self.remote = Some(client);
        self
    }

    /// Read the next raw input line (for command prompts)
    ///
    /// Returns `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns error if reading fails
    pub async fn read_line(&self) -> Result<Option<String>> {
        let mut input = self.input.lock().await;
        Ok(input.next_line().await?)
    }
}

#[async_trait]
impl<R> SpeechIo for ConsoleSpeech<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn capabilities(&self) -> SpeechCapabilities {
        SpeechCapabilities {
            recognition: self.interactive,
            synthesis: true,
        }
    }

    async fn capture(&self) -> Result<String> {
        if !self.interactive {
            return Err(Error::CapabilityUnavailable(
                "console input is not a terminal".to_string(),
            ));
        }

        println!("🎤 Listening ({})... say something:", self.locale);

        let mut input = self.input.lock().await;
        tokio::select! {
            () = self.cancel.notified() => {
                Err(Error::Recognition("capture stopped".to_string()))
            }
            line = input.next_line() => match line {
                Ok(Some(line)) => Ok(line),
                Ok(None) => Err(Error::Recognition("input closed".to_string())),
                Err(e) => Err(Error::Recognition(e.to_string())),
            },
        }
    }

    async fn speak(&self, text: &str) -> Result<()> {
        println!("🔊 {text}");

        if let Some(remote) = &self.remote {
            remote.speak_remote(text).await?;
        }

        Ok(())
    }

    fn stop(&self) {
        self.cancel.notify_waiters();
    }
}
