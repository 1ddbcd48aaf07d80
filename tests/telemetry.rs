//! Telemetry transport and synchronizer integration tests

use std::time::Duration;

use cockpit_client::{
    BackendClient, ConnectivityState, Metric, Source, TelemetrySynchronizer, TelemetryTransport,
    TelemetryView,
};
use tokio::sync::{mpsc, watch};

mod common;
use common::{FakeBackend, WAIT, obd_json, wait_until};

const LONG_POLL: Duration = Duration::from_secs(3600);

fn speed(view: &TelemetryView) -> Option<f64> {
    view.snapshot()
        .and_then(|s| s.get(Metric::Speed))
        .map(|r| r.value)
}

async fn wait_for_view(
    rx: &mut watch::Receiver<TelemetryView>,
    predicate: impl FnMut(&TelemetryView) -> bool,
) -> TelemetryView {
    tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("view not published in time")
        .expect("synchronizer dropped")
        .clone()
}

/// Wire a transport into a running synchronizer
fn start(
    backend: &FakeBackend,
    poll_interval: Duration,
    push: bool,
    window: Duration,
) -> (
    std::sync::Arc<TelemetrySynchronizer>,
    cockpit_client::TransportHandle,
    tokio::task::JoinHandle<()>,
) {
    let client = BackendClient::new(&backend.base_url, Duration::from_secs(2)).unwrap();
    let mut transport = TelemetryTransport::new(client, poll_interval);
    if push {
        transport = transport.with_push_url(backend.push_url());
    }

    let sync = std::sync::Arc::new(TelemetrySynchronizer::new(window));
    let (tx, rx) = mpsc::channel(16);

    let runner = tokio::spawn({
        let sync = std::sync::Arc::clone(&sync);
        async move { sync.run(rx).await }
    });
    let handle = transport.start(tx);

    (sync, handle, runner)
}

#[tokio::test]
async fn test_push_newer_than_poll_wins() {
    let backend = FakeBackend::start().await;
    backend.set_snapshot(obd_json("2025-03-01T10:00:00", 60.0));

    let (sync, handle, _runner) = start(&backend, LONG_POLL, true, Duration::from_secs(60));
    let mut rx = sync.subscribe();

    let view = wait_for_view(&mut rx, |v| speed(v) == Some(60.0)).await;
    assert_eq!(view.source(), Some(Source::Poll));

    backend.wait_for_push_client().await;
    backend.push(&obd_json("2025-03-01T10:00:02", 65.0));

    let view = wait_for_view(&mut rx, |v| speed(v) == Some(65.0)).await;
    assert_eq!(view.source(), Some(Source::Push));
    assert_eq!(view.connectivity(), ConnectivityState::Live);

    handle.close().await;
}

#[tokio::test]
async fn test_older_push_discarded() {
    let backend = FakeBackend::start().await;
    backend.set_snapshot(obd_json("2025-03-01T10:00:05", 60.0));

    let (sync, handle, _runner) = start(&backend, LONG_POLL, true, Duration::from_secs(60));
    let mut rx = sync.subscribe();
    wait_for_view(&mut rx, |v| speed(v) == Some(60.0)).await;
    backend.wait_for_push_client().await;

    // Out of order: the stale frame must not displace the newer poll result
    backend.push(&obd_json("2025-03-01T10:00:01", 10.0));
    backend.push(&obd_json("2025-03-01T10:00:09", 70.0));

    let view = wait_for_view(&mut rx, |v| speed(v) == Some(70.0)).await;
    let sources: Vec<Source> = view.history().map(|a| a.source).collect();
    assert_eq!(sources, vec![Source::Poll, Source::Push]);

    handle.close().await;
}

#[tokio::test]
async fn test_undecodable_push_skipped() {
    let backend = FakeBackend::start().await;

    let (sync, handle, _runner) = start(&backend, LONG_POLL, true, Duration::from_secs(60));
    let mut rx = sync.subscribe();
    backend.wait_for_push_client().await;

    backend.push_raw("not json");
    backend.push(&obd_json("2025-03-01T10:00:03", 42.0));

    let view = wait_for_view(&mut rx, |v| speed(v) == Some(42.0)).await;
    assert_eq!(view.connectivity(), ConnectivityState::Live);
    assert_eq!(backend.push_accepted(), 1);

    handle.close().await;
}

#[tokio::test]
async fn test_goes_offline_without_updates() {
    let backend = FakeBackend::start().await;

    let (sync, handle, _runner) = start(&backend, LONG_POLL, false, Duration::from_millis(300));
    let mut rx = sync.subscribe();

    let view = wait_for_view(&mut rx, |v| v.snapshot().is_some()).await;
    assert!(view.snapshot().unwrap().connected());

    // Last snapshot still claims connected; recency decides
    let view = wait_for_view(&mut rx, |v| v.connectivity() == ConnectivityState::Offline).await;
    assert_eq!(speed(&view), Some(60.0));

    handle.close().await;
}

#[tokio::test]
async fn test_poll_failure_keeps_snapshot_and_recovers() {
    let backend = FakeBackend::start().await;

    let (sync, handle, _runner) =
        start(&backend, Duration::from_millis(50), false, Duration::from_secs(60));
    let mut rx = sync.subscribe();

    wait_for_view(&mut rx, |v| v.connectivity() == ConnectivityState::Live).await;

    backend.fail_polls(true);
    let view = wait_for_view(&mut rx, |v| v.connectivity() == ConnectivityState::Degraded).await;
    assert_eq!(speed(&view), Some(60.0));
    assert!(view.channel_failed(Source::Poll));

    // Same timestamp as before: accepted as equally fresh
    backend.fail_polls(false);
    wait_for_view(&mut rx, |v| v.connectivity() == ConnectivityState::Live).await;

    handle.close().await;
}

#[tokio::test]
async fn test_push_closure_degrades_without_redial() {
    let backend = FakeBackend::start().await;

    let (sync, handle, _runner) = start(&backend, LONG_POLL, true, Duration::from_secs(60));
    let mut rx = sync.subscribe();

    wait_for_view(&mut rx, |v| v.snapshot().is_some()).await;
    backend.wait_for_push_client().await;

    backend.close_push();

    let view = wait_for_view(&mut rx, |v| v.connectivity() == ConnectivityState::Degraded).await;
    assert!(view.channel_failed(Source::Push));

    wait_until(|| backend.push_open() == 0).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.push_accepted(), 1);

    handle.close().await;
}

#[tokio::test]
async fn test_disconnected_backend_is_offline() {
    let backend = FakeBackend::start().await;
    backend.set_snapshot(serde_json::json!({
        "connected": false,
        "error": "OBD not connected",
        "timestamp": "2025-03-01T10:00:00",
    }));

    let (sync, handle, _runner) = start(&backend, LONG_POLL, false, Duration::from_secs(60));
    let mut rx = sync.subscribe();

    let view = wait_for_view(&mut rx, |v| v.snapshot().is_some()).await;
    assert_eq!(view.connectivity(), ConnectivityState::Offline);
    assert_eq!(
        view.snapshot().unwrap().backend_error(),
        Some("OBD not connected")
    );

    handle.close().await;
}

#[tokio::test]
async fn test_close_releases_push_connection() {
    let backend = FakeBackend::start().await;

    let (_sync, handle, runner) = start(&backend, LONG_POLL, true, Duration::from_secs(60));
    backend.wait_for_push_client().await;

    handle.close().await;

    wait_until(|| backend.push_open() == 0).await;
    // Both channel tasks are gone, so the event stream ends
    tokio::time::timeout(WAIT, runner).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_dropped_handle_aborts_channels() {
    let backend = FakeBackend::start().await;

    let (_sync, handle, runner) = start(&backend, LONG_POLL, true, Duration::from_secs(60));
    backend.wait_for_push_client().await;

    drop(handle);

    wait_until(|| backend.push_open() == 0).await;
    tokio::time::timeout(WAIT, runner).await.unwrap().unwrap();
}
