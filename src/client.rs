//! Dashboard client wiring
//!
//! Owns the telemetry channels, the synchronizer task and the voice
//! controller for one dashboard instance.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::Result;
use crate::backend::BackendClient;
use crate::config::Config;
use crate::telemetry::{TelemetrySynchronizer, TelemetryTransport, TelemetryView, TransportHandle};
use crate::voice::{SpeechIo, VoiceInteractionController, VoiceSession};

/// Buffered transport events before the channel tasks wait on the synchronizer
const EVENT_BUFFER: usize = 64;

/// Running dashboard: telemetry sync plus a voice controller
pub struct DashboardClient {
    synchronizer: Arc<TelemetrySynchronizer>,
    controller: Arc<VoiceInteractionController>,
    transport: TransportHandle,
    sync_task: JoinHandle<()>,
}

impl DashboardClient {
    /// Start the telemetry channels and the synchronizer
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the backend client cannot be built or the push URL
    /// cannot be derived
    pub fn start(config: &Config, speech: Arc<dyn SpeechIo>) -> Result<Self> {
        let backend = BackendClient::new(&config.backend.url, config.backend.request_timeout)?;

        let mut transport = TelemetryTransport::new(backend.clone(), config.telemetry.poll_interval);
        if let Some(push_url) = config.push_url()? {
            transport = transport.with_push_url(push_url);
        }

        let synchronizer = Arc::new(TelemetrySynchronizer::new(config.staleness_window()));
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

        let sync_task = tokio::spawn({
            let synchronizer = Arc::clone(&synchronizer);
            async move { synchronizer.run(events_rx).await }
        });
        let transport = transport.start(events_tx);

        let controller = Arc::new(
            VoiceInteractionController::new(speech, Arc::new(backend))
                .with_speak_fallback(config.voice.speak_fallback),
        );

        tracing::info!(
            backend = %config.backend.url,
            staleness_ms = config.staleness_window().as_millis(),
            "dashboard client started"
        );

        Ok(Self {
            synchronizer,
            controller,
            transport,
            sync_task,
        })
    }

    #[must_use]
    pub fn synchronizer(&self) -> &TelemetrySynchronizer {
        &self.synchronizer
    }

    #[must_use]
    pub fn controller(&self) -> &Arc<VoiceInteractionController> {
        &self.controller
    }

    /// Watch the synchronized telemetry view
    #[must_use]
    pub fn telemetry(&self) -> watch::Receiver<TelemetryView> {
        self.synchronizer.subscribe()
    }

    /// Watch the voice session
    #[must_use]
    pub fn voice(&self) -> watch::Receiver<VoiceSession> {
        self.controller.subscribe()
    }

    /// Tear down: stop in-flight speech, release the push connection and wait
    /// for the synchronizer to drain
    pub async fn shutdown(self) {
        tracing::info!("shutting down dashboard client");

        self.controller.shutdown();
        self.transport.close().await;

        // The event channel closes once both channel tasks are gone
        if let Err(e) = self.sync_task.await {
            tracing::warn!(error = %e, "synchronizer task ended abnormally");
        }

        tracing::debug!("dashboard client stopped");
    }
}
