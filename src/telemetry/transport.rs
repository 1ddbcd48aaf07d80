//! Poll and push channels feeding raw snapshots to the synchronizer

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::snapshot::{Source, TelemetrySnapshot};
use crate::backend::BackendClient;

/// Raw event from one of the telemetry channels
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A snapshot arrived
    Snapshot {
        snapshot: TelemetrySnapshot,
        source: Source,
    },
    /// A channel became usable
    ChannelOpened { source: Source },
    /// A channel failed; for the poll channel this is one skipped cycle
    ChannelError { source: Source, error: String },
    /// A channel ended and will not come back on its own
    ChannelClosed { source: Source },
}

/// Owns the fixed-interval poll and the optional push connection
pub struct TelemetryTransport {
    client: BackendClient,
    push_url: Option<String>,
    poll_interval: Duration,
}

impl TelemetryTransport {
    /// Create a poll-only transport
    #[must_use]
    pub const fn new(client: BackendClient, poll_interval: Duration) -> Self {
        Self {
            client,
            push_url: None,
            poll_interval,
        }
    }

    /// Also open a push connection to `url`
    #[must_use]
    pub fn with_push_url(mut self, url: impl Into<String>) -> Self {
        self.push_url = Some(url.into());
        self
    }

    /// Spawn the channel tasks
    ///
    /// Events go to `events` until the handle is closed or dropped, or the
    /// receiving side goes away.
    #[must_use]
    pub fn start(self, events: mpsc::Sender<TransportEvent>) -> TransportHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::with_capacity(2);

        tracing::info!(
            base_url = %self.client.base_url(),
            poll_interval_ms = self.poll_interval.as_millis(),
            push = self.push_url.is_some(),
            "starting telemetry transport"
        );

        tasks.push(tokio::spawn(poll_loop(
            self.client,
            self.poll_interval,
            events.clone(),
            shutdown_rx.clone(),
        )));

        if let Some(url) = self.push_url {
            tasks.push(tokio::spawn(push_loop(url, events, shutdown_rx)));
        }

        TransportHandle { shutdown, tasks }
    }
}

/// Running transport
///
/// Dropping the handle signals and aborts both channel tasks, which drops the
/// push socket without a close frame. Use [`TransportHandle::close`] for an
/// orderly close handshake.
pub struct TransportHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl TransportHandle {
    /// Stop both channels and wait for them to release their connections
    pub async fn close(mut self) {
        self.shutdown.send_replace(true);

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "transport task ended abnormally");
            }
        }

        tracing::debug!("telemetry transport closed");
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
        // Empty after `close`
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Fixed-interval `GET /obd`; the first request goes out immediately
async fn poll_loop(
    client: BackendClient,
    interval: Duration,
    events: mpsc::Sender<TransportEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            _ = shutdown.changed() => break,
            result = client.fetch_snapshot() => result,
        };

        let event = match result {
            Ok(snapshot) => TransportEvent::Snapshot {
                snapshot,
                source: Source::Poll,
            },
            Err(e) => {
                tracing::warn!(error = %e, "telemetry poll failed, keeping previous snapshot");
                TransportEvent::ChannelError {
                    source: Source::Poll,
                    error: e.to_string(),
                }
            }
        };

        if events.send(event).await.is_err() {
            break;
        }
    }

    tracing::debug!("poll loop stopped");
}

/// Long-lived websocket; never redialed here
async fn push_loop(
    url: String,
    events: mpsc::Sender<TransportEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let connected = tokio::select! {
        _ = shutdown.changed() => return,
        result = connect_async(url.as_str()) => result,
    };

    let mut socket = match connected {
        Ok((socket, _)) => socket,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "push channel connect failed");
            let _ = events
                .send(TransportEvent::ChannelError {
                    source: Source::Push,
                    error: e.to_string(),
                })
                .await;
            let _ = events
                .send(TransportEvent::ChannelClosed {
                    source: Source::Push,
                })
                .await;
            return;
        }
    };

    tracing::info!(url = %url, "push channel connected");

    if events
        .send(TransportEvent::ChannelOpened {
            source: Source::Push,
        })
        .await
        .is_err()
    {
        let _ = socket.close(None).await;
        return;
    }

    loop {
        let message = tokio::select! {
            _ = shutdown.changed() => {
                if let Err(e) = socket.close(None).await {
                    tracing::debug!(error = %e, "push channel close handshake failed");
                }
                tracing::debug!("push channel released");
                return;
            }
            message = socket.next() => message,
        };

        let body = match message {
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping non-UTF-8 push message");
                    continue;
                }
            },
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(?frame, "push channel closed by backend");
                break;
            }
            // Ping/pong are answered by tungstenite itself
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "push channel error");
                let _ = events
                    .send(TransportEvent::ChannelError {
                        source: Source::Push,
                        error: e.to_string(),
                    })
                    .await;
                break;
            }
            None => {
                tracing::info!("push channel ended");
                break;
            }
        };

        match TelemetrySnapshot::from_json(&body) {
            Ok(snapshot) => {
                let event = TransportEvent::Snapshot {
                    snapshot,
                    source: Source::Push,
                };
                if events.send(event).await.is_err() {
                    let _ = socket.close(None).await;
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable push message");
            }
        }
    }

    let _ = events
        .send(TransportEvent::ChannelClosed {
            source: Source::Push,
        })
        .await;
}
