//! Single-flight voice session orchestration

use std::sync::Arc;

use tokio::sync::watch;

use super::commands::QuickCommand;
use super::dispatcher::CommandDispatcher;
use super::session::{FALLBACK_RESPONSE, Rejection, SessionOutcome, VoiceSession, VoiceState};
use super::speech::SpeechIo;
use crate::Error;
use crate::error::ErrorKind;

/// Runs voice sessions over a speech collaborator and a command dispatcher
///
/// Steps within a session are strictly sequential, so capture and playback
/// never overlap. Starting while a session is active is rejected, never
/// queued and never cancels the running session.
pub struct VoiceInteractionController {
    speech: Arc<dyn SpeechIo>,
    dispatcher: Arc<dyn CommandDispatcher>,
    session: watch::Sender<VoiceSession>,
    speak_fallback: bool,
}

impl VoiceInteractionController {
    /// Create a controller with an idle session
    #[must_use]
    pub fn new(speech: Arc<dyn SpeechIo>, dispatcher: Arc<dyn CommandDispatcher>) -> Self {
        let (session, _) = watch::channel(VoiceSession::default());
        Self {
            speech,
            dispatcher,
            session,
            speak_fallback: false,
        }
    }

    /// Speak the fallback message after a failed dispatch
    #[must_use]
    pub const fn with_speak_fallback(mut self, enabled: bool) -> Self {
        self.speak_fallback = enabled;
        self
    }

    /// Current session
    #[must_use]
    pub fn session(&self) -> VoiceSession {
        self.session.borrow().clone()
    }

    /// Watch session changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<VoiceSession> {
        self.session.subscribe()
    }

    /// Capture one utterance, dispatch it and speak the response
    pub async fn start_listening(&self) -> SessionOutcome {
        let supported = self.speech.capabilities().recognition;

        let scope = match self.begin(|session| {
            if session.capture_disabled {
                return Err(Rejection::CaptureDisabled);
            }
            if !supported {
                session.capture_disabled = true;
                session.error = Some(ErrorKind::CapabilityUnavailable);
                session.state = VoiceState::Idle;
                return Err(Rejection::CaptureUnavailable);
            }
            session.transcript = None;
            session.state = VoiceState::Listening;
            Ok(())
        }) {
            Ok((scope, ())) => scope,
            Err(outcome) => return outcome,
        };

        tracing::debug!("listening");

        match self.speech.capture().await {
            Ok(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return scope.fail(ErrorKind::Recognition, "no speech detected");
                }

                tracing::info!(transcript = %text, "speech recognized");
                scope.transition(|session| {
                    session.state = VoiceState::Transcribing;
                    session.transcript = Some(text.clone());
                });
                scope.transition(|session| session.state = VoiceState::Dispatching);

                self.dispatch(scope, &text).await
            }
            Err(Error::CapabilityUnavailable(detail)) => {
                scope.transition(|session| session.capture_disabled = true);
                scope.fail(ErrorKind::CapabilityUnavailable, &detail)
            }
            Err(e) => scope.fail(ErrorKind::Recognition, &e.to_string()),
        }
    }

    /// Dispatch typed text, entering the session at `Dispatching`
    pub async fn process_command(&self, text: &str) -> SessionOutcome {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("ignoring empty command");
            return SessionOutcome::Rejected(Rejection::EmptyCommand);
        }

        let scope = match self.begin(|session| {
            session.transcript = Some(text.to_string());
            session.state = VoiceState::Dispatching;
            Ok(())
        }) {
            Ok((scope, ())) => scope,
            Err(outcome) => return outcome,
        };

        self.dispatch(scope, text).await
    }

    /// Run a catalogue command
    pub async fn run_quick_command(&self, quick: &QuickCommand) -> SessionOutcome {
        tracing::debug!(label = quick.label, "quick command");
        self.process_command(quick.command).await
    }

    /// Replay the last response as its own `Speaking` excursion
    pub async fn speak_again(&self) -> SessionOutcome {
        if !self.speech.capabilities().synthesis {
            return SessionOutcome::Rejected(Rejection::PlaybackUnavailable);
        }

        let (scope, text) = match self.begin(|session| {
            let text = session
                .response_text
                .clone()
                .filter(|text| !text.is_empty())
                .ok_or(Rejection::NothingToRepeat)?;
            session.state = VoiceState::Speaking;
            Ok(text)
        }) {
            Ok(entered) => entered,
            Err(outcome) => return outcome,
        };

        match self.speech.speak(&text).await {
            Ok(()) => {
                scope.finish();
                SessionOutcome::Completed { response: text }
            }
            Err(e) => scope.fail(ErrorKind::Playback, &e.to_string()),
        }
    }

    /// Stop any in-flight capture or playback
    pub fn shutdown(&self) {
        tracing::debug!(state = %self.session.borrow().state, "stopping speech");
        self.speech.stop();
    }

    /// Atomically check the session is startable and enter it
    ///
    /// `admit` runs only when the session is `Idle` or `Errored`; a rejection
    /// leaves the session untouched, except for the first
    /// [`Rejection::CaptureUnavailable`] which `admit` records on it.
    fn begin<T>(
        &self,
        admit: impl FnOnce(&mut VoiceSession) -> Result<T, Rejection>,
    ) -> Result<(SessionScope<'_>, T), SessionOutcome> {
        let mut admitted = None;

        self.session.send_if_modified(|session| {
            if !session.state.accepts_start() {
                admitted = Some(Err(Rejection::Busy(session.state)));
                return false;
            }

            let previous = session.clone();
            let result = admit(session).map(|value| {
                session.error = None;
                value
            });
            let modified = *session != previous;
            admitted = Some(result);
            modified
        });

        match admitted {
            Some(Ok(value)) => Ok((SessionScope::new(self), value)),
            Some(Err(rejection)) => {
                match rejection {
                    Rejection::CaptureUnavailable => {
                        tracing::warn!("speech recognition is not supported, disabling capture");
                    }
                    Rejection::Busy(state) => {
                        tracing::debug!(%state, "session in progress, ignoring request");
                    }
                    _ => tracing::debug!(%rejection, "request rejected"),
                }
                Err(SessionOutcome::Rejected(rejection))
            }
            None => Err(SessionOutcome::Rejected(Rejection::Busy(
                self.session.borrow().state,
            ))),
        }
    }

    async fn dispatch(&self, scope: SessionScope<'_>, text: &str) -> SessionOutcome {
        match self.dispatcher.dispatch(text).await {
            Ok(response) => self.respond(scope, response).await,
            Err(e) => {
                tracing::warn!(error = %e, "command dispatch failed");
                scope.transition(|session| {
                    session.state = VoiceState::Errored;
                    session.error = Some(ErrorKind::Dispatch);
                    session.response_text = Some(FALLBACK_RESPONSE.to_string());
                });

                if self.speak_fallback && self.speech.capabilities().synthesis {
                    scope.transition(|session| session.state = VoiceState::Speaking);
                    if let Err(e) = self.speech.speak(FALLBACK_RESPONSE).await {
                        tracing::debug!(error = %e, "fallback playback failed");
                    }
                }

                scope.finish();
                SessionOutcome::Failed(ErrorKind::Dispatch)
            }
        }
    }

    async fn respond(&self, scope: SessionScope<'_>, response: String) -> SessionOutcome {
        if !self.speech.capabilities().synthesis {
            scope.transition(|session| session.response_text = Some(response.clone()));
            scope.finish();
            return SessionOutcome::Completed { response };
        }

        scope.transition(|session| {
            session.response_text = Some(response.clone());
            session.state = VoiceState::Speaking;
        });

        match self.speech.speak(&response).await {
            Ok(()) => {
                tracing::info!("voice session completed");
                scope.finish();
                SessionOutcome::Completed { response }
            }
            Err(e) => scope.fail(ErrorKind::Playback, &e.to_string()),
        }
    }
}

/// Ownership of the running session
///
/// Every session ends through [`SessionScope::finish`]. If the owning future
/// is dropped first, the guard stops the speech collaborator and returns the
/// session to `Idle`.
struct SessionScope<'a> {
    controller: &'a VoiceInteractionController,
    active: bool,
}

impl<'a> SessionScope<'a> {
    const fn new(controller: &'a VoiceInteractionController) -> Self {
        Self {
            controller,
            active: true,
        }
    }

    fn transition(&self, apply: impl FnOnce(&mut VoiceSession)) {
        self.controller.session.send_modify(apply);
    }

    fn finish(mut self) {
        self.active = false;
        self.controller
            .session
            .send_modify(|session| session.state = VoiceState::Idle);
    }

    fn fail(self, kind: ErrorKind, detail: &str) -> SessionOutcome {
        tracing::warn!(error = %kind, detail, "voice session failed");
        self.transition(|session| {
            session.state = VoiceState::Errored;
            session.error = Some(kind);
        });
        self.finish();
        SessionOutcome::Failed(kind)
    }
}

impl Drop for SessionScope<'_> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }

        tracing::debug!("voice session abandoned, releasing speech");
        self.controller.speech.stop();
        self.controller
            .session
            .send_modify(|session| session.state = VoiceState::Idle);
    }
}
