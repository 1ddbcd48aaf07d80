//! Merge-by-recency synchronization of the poll and push feeds
//!
//! Both channels deliver the same kind of snapshot. Neither is authoritative:
//! a candidate replaces the current snapshot unless both carry a timestamp and
//! the candidate's is strictly older. Missing or equal timestamps count as
//! "just as fresh" so either channel alone keeps the view live.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::snapshot::{Source, TelemetrySnapshot};
use super::transport::TransportEvent;

/// Number of acceptances kept for staleness bookkeeping
const HISTORY_LEN: usize = 16;

/// Derived health of the telemetry feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectivityState {
    /// Fresh data, adapter connected, both channels healthy
    Live,
    /// Fresh data, but one channel is failing
    Degraded,
    /// No data, stale data, or the adapter reports disconnected
    Offline,
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => f.write_str("live"),
            Self::Degraded => f.write_str("degraded"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

/// One accepted snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acceptance {
    pub source: Source,
    pub at: Instant,
}

/// Published state of the synchronizer
///
/// Readers always get a whole value; the snapshot inside is shared and never
/// mutated.
#[derive(Debug, Clone)]
pub struct TelemetryView {
    snapshot: Option<Arc<TelemetrySnapshot>>,
    source: Option<Source>,
    connectivity: ConnectivityState,
    last_accepted: Option<Instant>,
    poll_failed: bool,
    push_failed: bool,
    history: VecDeque<Acceptance>,
    staleness_window: Duration,
}

impl TelemetryView {
    fn empty(staleness_window: Duration) -> Self {
        Self {
            snapshot: None,
            source: None,
            connectivity: ConnectivityState::Offline,
            last_accepted: None,
            poll_failed: false,
            push_failed: false,
            history: VecDeque::with_capacity(HISTORY_LEN),
            staleness_window,
        }
    }

    /// The current snapshot, if any was ever accepted
    #[must_use]
    pub fn snapshot(&self) -> Option<&TelemetrySnapshot> {
        self.snapshot.as_deref()
    }

    /// Channel that delivered the current snapshot
    #[must_use]
    pub const fn source(&self) -> Option<Source> {
        self.source
    }

    /// Connectivity as of when this view was produced
    #[must_use]
    pub const fn connectivity(&self) -> ConnectivityState {
        self.connectivity
    }

    /// Recent acceptances, oldest first
    pub fn history(&self) -> impl Iterator<Item = &Acceptance> {
        self.history.iter()
    }

    /// Whether a channel is currently marked failed
    #[must_use]
    pub const fn channel_failed(&self, source: Source) -> bool {
        match source {
            Source::Poll => self.poll_failed,
            Source::Push => self.push_failed,
        }
    }

    fn derive_connectivity(&self, now: Instant) -> ConnectivityState {
        let (Some(snapshot), Some(last)) = (&self.snapshot, self.last_accepted) else {
            return ConnectivityState::Offline;
        };

        // A frozen channel can keep claiming `connected: true`; recency wins
        if now.duration_since(last) >= self.staleness_window || !snapshot.connected() {
            return ConnectivityState::Offline;
        }

        if self.poll_failed || self.push_failed {
            ConnectivityState::Degraded
        } else {
            ConnectivityState::Live
        }
    }

    fn stale_deadline(&self) -> Option<Instant> {
        if self.connectivity == ConnectivityState::Offline {
            return None;
        }
        self.last_accepted.map(|last| last + self.staleness_window)
    }

    fn set_failed(&mut self, source: Source, failed: bool) -> bool {
        let flag = match source {
            Source::Poll => &mut self.poll_failed,
            Source::Push => &mut self.push_failed,
        };
        let changed = *flag != failed;
        *flag = failed;
        changed
    }

    /// Recompute connectivity; true if it changed
    fn refresh(&mut self, now: Instant) -> bool {
        let connectivity = self.derive_connectivity(now);
        let changed = connectivity != self.connectivity;
        self.connectivity = connectivity;
        changed
    }
}

/// Whether `candidate` may replace `current`
fn is_fresh(current: Option<&TelemetrySnapshot>, candidate: &TelemetrySnapshot) -> bool {
    match (
        current.and_then(TelemetrySnapshot::observed_at),
        candidate.observed_at(),
    ) {
        (Some(held), Some(incoming)) => incoming >= held,
        _ => true,
    }
}

/// Owns the authoritative telemetry snapshot
pub struct TelemetrySynchronizer {
    state: watch::Sender<TelemetryView>,
}

impl TelemetrySynchronizer {
    /// Create a synchronizer with the given staleness window
    #[must_use]
    pub fn new(staleness_window: Duration) -> Self {
        let (state, _) = watch::channel(TelemetryView::empty(staleness_window));
        Self { state }
    }

    /// Offer a candidate snapshot
    ///
    /// Returns true if it became current.
    pub fn submit(&self, snapshot: TelemetrySnapshot, source: Source) -> bool {
        let now = Instant::now();
        let mut accepted = false;

        self.state.send_if_modified(|view| {
            // Any well-formed delivery proves the channel works, fresh or not
            let flag_changed = view.set_failed(source, false);

            if !is_fresh(view.snapshot.as_deref(), &snapshot) {
                tracing::debug!(
                    %source,
                    held = ?view.snapshot.as_deref().and_then(TelemetrySnapshot::observed_at),
                    incoming = ?snapshot.observed_at(),
                    "discarding older snapshot"
                );
                let connectivity_changed = view.refresh(now);
                return flag_changed || connectivity_changed;
            }

            view.snapshot = Some(Arc::new(snapshot));
            view.source = Some(source);
            view.last_accepted = Some(now);

            if view.history.len() == HISTORY_LEN {
                view.history.pop_front();
            }
            view.history.push_back(Acceptance { source, at: now });

            view.refresh(now);
            accepted = true;
            true
        });

        if accepted {
            tracing::trace!(%source, "snapshot accepted");
        }
        accepted
    }

    /// Current view, with connectivity evaluated now
    #[must_use]
    pub fn current(&self) -> TelemetryView {
        let mut view = self.state.borrow().clone();
        view.connectivity = view.derive_connectivity(Instant::now());
        view
    }

    /// Connectivity evaluated now
    #[must_use]
    pub fn connectivity(&self) -> ConnectivityState {
        self.state.borrow().derive_connectivity(Instant::now())
    }

    /// Receive every published change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TelemetryView> {
        self.state.subscribe()
    }

    /// Mark a channel as failing
    pub fn channel_failed(&self, source: Source) {
        self.update_channel(source, true);
    }

    /// Mark a channel as healthy again
    pub fn channel_restored(&self, source: Source) {
        self.update_channel(source, false);
    }

    fn update_channel(&self, source: Source, failed: bool) {
        let now = Instant::now();
        self.state.send_if_modified(|view| {
            let flag_changed = view.set_failed(source, failed);
            let connectivity_changed = view.refresh(now);
            flag_changed || connectivity_changed
        });
    }

    /// Re-evaluate connectivity and publish if it changed
    pub fn refresh(&self) {
        let now = Instant::now();
        self.state.send_if_modified(|view| view.refresh(now));
    }

    /// Apply one transport event
    pub fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Snapshot { snapshot, source } => {
                self.submit(snapshot, source);
            }
            TransportEvent::ChannelOpened { source } => {
                tracing::debug!(%source, "channel opened");
                self.channel_restored(source);
            }
            TransportEvent::ChannelError { source, error } => {
                tracing::debug!(%source, %error, "channel error");
                self.channel_failed(source);
            }
            TransportEvent::ChannelClosed { source } => {
                tracing::debug!(%source, "channel closed");
                self.channel_failed(source);
            }
        }
    }

    /// Consume transport events until the sender side closes
    ///
    /// Also wakes at the staleness deadline so subscribers see the drop to
    /// `Offline` without another event arriving.
    pub async fn run(&self, mut events: mpsc::Receiver<TransportEvent>) {
        loop {
            let deadline = self.state.borrow().stale_deadline();

            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::debug!("transport event stream ended");
                        break;
                    };
                    self.handle_event(event);
                }
                () = stale_timer(deadline) => {
                    tracing::info!("telemetry went stale");
                    self.refresh();
                }
            }
        }
    }
}

async fn stale_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
