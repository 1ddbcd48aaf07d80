//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Json;
use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use cockpit_client::{CommandDispatcher, Error, Result, SpeechCapabilities, SpeechIo};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;

/// Upper bound for anything a test waits on
pub const WAIT: Duration = Duration::from_secs(5);

/// Full `/obd` body with the given timestamp and speed
pub fn obd_json(timestamp: &str, speed: f64) -> Value {
    json!({
        "connected": true,
        "timestamp": timestamp,
        "speed": {"value": speed, "unit": "km/h"},
        "rpm": {"value": 2500.0, "unit": "rpm"},
        "temperature": {"value": 90.0, "unit": "°C"},
        "fuel": {"value": 55.0, "unit": "%"},
        "engine_load": {"value": 35.0, "unit": "%"},
        "throttle": {"value": 20.0, "unit": "%"},
    })
}

/// Poll `condition` until it holds or [`WAIT`] runs out
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[derive(Clone)]
enum PushFrame {
    Snapshot(String),
    Close,
}

struct BackendState {
    snapshot: Mutex<Value>,
    fail_polls: AtomicBool,
    command_reply: Mutex<Option<String>>,
    commands: Mutex<Vec<String>>,
    spoken: Mutex<Vec<String>>,
    polls: AtomicUsize,
    push: broadcast::Sender<PushFrame>,
    push_accepted: AtomicUsize,
    push_open: AtomicUsize,
}

/// In-process vehicle backend: REST routes plus the `/ws` push feed
pub struct FakeBackend {
    pub base_url: String,
    state: Arc<BackendState>,
    server: JoinHandle<()>,
}

#[derive(Deserialize)]
struct TextBody {
    text: String,
}

impl FakeBackend {
    /// Serve on an ephemeral localhost port
    pub async fn start() -> Self {
        let (push, _) = broadcast::channel(16);
        let state = Arc::new(BackendState {
            snapshot: Mutex::new(obd_json("2025-03-01T10:00:00", 60.0)),
            fail_polls: AtomicBool::new(false),
            command_reply: Mutex::new(Some("OK".to_string())),
            commands: Mutex::new(Vec::new()),
            spoken: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
            push,
            push_accepted: AtomicUsize::new(0),
            push_open: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/obd", get(obd))
            .route("/obd/{parameter}", get(obd_parameter))
            .route("/voice/command", post(voice_command))
            .route("/voice/speak", post(voice_speak))
            .route("/health", get(health))
            .route("/ws", get(push_socket))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind fake backend");
        let addr = listener.local_addr().expect("no local addr");

        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake backend failed");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            server,
        }
    }

    pub fn push_url(&self) -> String {
        format!("{}/ws", self.base_url.replacen("http", "ws", 1))
    }

    pub fn set_snapshot(&self, body: Value) {
        *self.state.snapshot.lock().unwrap() = body;
    }

    pub fn fail_polls(&self, fail: bool) {
        self.state.fail_polls.store(fail, Ordering::SeqCst);
    }

    pub fn reply_with(&self, response: &str) {
        *self.state.command_reply.lock().unwrap() = Some(response.to_string());
    }

    /// Answer `/voice/command` with a 500
    pub fn fail_commands(&self) {
        *self.state.command_reply.lock().unwrap() = None;
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.commands.lock().unwrap().clone()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.state.spoken.lock().unwrap().clone()
    }

    pub fn polls(&self) -> usize {
        self.state.polls.load(Ordering::SeqCst)
    }

    /// Push connections accepted so far
    pub fn push_accepted(&self) -> usize {
        self.state.push_accepted.load(Ordering::SeqCst)
    }

    /// Push connections currently open
    pub fn push_open(&self) -> usize {
        self.state.push_open.load(Ordering::SeqCst)
    }

    pub async fn wait_for_push_client(&self) {
        wait_until(|| self.push_open() > 0).await;
    }

    /// Send a snapshot to every connected push client
    pub fn push(&self, body: &Value) {
        let _ = self.state.push.send(PushFrame::Snapshot(body.to_string()));
    }

    /// Send raw text to every connected push client
    pub fn push_raw(&self, text: &str) {
        let _ = self.state.push.send(PushFrame::Snapshot(text.to_string()));
    }

    /// Close every push connection from the server side
    pub fn close_push(&self) {
        let _ = self.state.push.send(PushFrame::Close);
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn obd(State(state): State<Arc<BackendState>>) -> Response {
    state.polls.fetch_add(1, Ordering::SeqCst);

    if state.fail_polls.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "adapter timeout").into_response();
    }

    let body = state.snapshot.lock().unwrap().clone();
    Json(body).into_response()
}

async fn obd_parameter(
    State(state): State<Arc<BackendState>>,
    Path(parameter): Path<String>,
) -> Json<Value> {
    let snapshot = state.snapshot.lock().unwrap().clone();

    match snapshot.get(&parameter) {
        Some(reading) => Json(json!({
            "parameter": parameter,
            "value": reading["value"],
            "unit": reading["unit"],
            "connected": true,
        })),
        None => Json(json!({"error": format!("Unknown parameter: {parameter}")})),
    }
}

async fn voice_command(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<TextBody>,
) -> Response {
    state.commands.lock().unwrap().push(body.text.clone());

    let reply = state.command_reply.lock().unwrap().clone();
    match reply {
        Some(response) => Json(json!({
            "response": response,
            "original_command": body.text,
            "timestamp": "2025-03-01T10:00:05",
        }))
        .into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "assistant offline").into_response(),
    }
}

async fn voice_speak(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<TextBody>,
) -> Json<Value> {
    state.spoken.lock().unwrap().push(body.text);
    Json(json!({"status": "success"}))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "obd_connected": true,
        "timestamp": "2025-03-01T10:00:00",
    }))
}

async fn push_socket(ws: WebSocketUpgrade, State(state): State<Arc<BackendState>>) -> Response {
    ws.on_upgrade(move |socket| serve_push(socket, state))
}

async fn serve_push(mut socket: WebSocket, state: Arc<BackendState>) {
    let mut feed = state.push.subscribe();
    state.push_accepted.fetch_add(1, Ordering::SeqCst);
    state.push_open.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            frame = feed.recv() => match frame {
                Ok(PushFrame::Snapshot(body)) => {
                    if socket.send(Message::Text(body.into())).await.is_err() {
                        break;
                    }
                }
                Ok(PushFrame::Close) => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
                Err(_) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.push_open.fetch_sub(1, Ordering::SeqCst);
}

/// One scripted capture result
#[derive(Debug, Clone)]
pub enum Heard {
    Text(String),
    NoSpeech,
}

/// In-memory speech collaborator
///
/// Records playbacks and flags any moment where capture and playback overlap.
pub struct ScriptedSpeech {
    capabilities: SpeechCapabilities,
    script: Mutex<VecDeque<Heard>>,
    capture_delay: Duration,
    speak_delay: Duration,
    fail_playback: bool,
    spoken: Mutex<Vec<String>>,
    captures: AtomicUsize,
    stops: AtomicUsize,
    capturing: AtomicBool,
    speaking: AtomicBool,
    overlapped: AtomicBool,
    stopped: Notify,
}

impl ScriptedSpeech {
    pub fn new() -> Self {
        Self {
            capabilities: SpeechCapabilities {
                recognition: true,
                synthesis: true,
            },
            script: Mutex::new(VecDeque::new()),
            capture_delay: Duration::ZERO,
            speak_delay: Duration::ZERO,
            fail_playback: false,
            spoken: Mutex::new(Vec::new()),
            captures: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            capturing: AtomicBool::new(false),
            speaking: AtomicBool::new(false),
            overlapped: AtomicBool::new(false),
            stopped: Notify::new(),
        }
    }

    /// Queue an utterance for the next capture
    pub fn hearing(self, text: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Heard::Text(text.to_string()));
        self
    }

    pub fn hearing_nothing(self) -> Self {
        self.script.lock().unwrap().push_back(Heard::NoSpeech);
        self
    }

    pub const fn without_recognition(mut self) -> Self {
        self.capabilities.recognition = false;
        self
    }

    pub const fn without_synthesis(mut self) -> Self {
        self.capabilities.synthesis = false;
        self
    }

    pub const fn failing_playback(mut self) -> Self {
        self.fail_playback = true;
        self
    }

    pub const fn with_delays(mut self, capture: Duration, speak: Duration) -> Self {
        self.capture_delay = capture;
        self.speak_delay = speak;
        self
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Whether capture and playback were ever active at the same time
    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechIo for ScriptedSpeech {
    fn capabilities(&self) -> SpeechCapabilities {
        self.capabilities
    }

    async fn capture(&self) -> Result<String> {
        if !self.capabilities.recognition {
            return Err(Error::CapabilityUnavailable("no recognizer".to_string()));
        }

        self.captures.fetch_add(1, Ordering::SeqCst);
        self.capturing.store(true, Ordering::SeqCst);
        if self.speaking.load(Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }

        let result = tokio::select! {
            () = self.stopped.notified() => Err(Error::Recognition("aborted".to_string())),
            () = tokio::time::sleep(self.capture_delay) => {
                match self.script.lock().unwrap().pop_front() {
                    Some(Heard::Text(text)) => Ok(text),
                    Some(Heard::NoSpeech) | None => Err(Error::Recognition("no-speech".to_string())),
                }
            }
        };

        self.capturing.store(false, Ordering::SeqCst);
        result
    }

    async fn speak(&self, text: &str) -> Result<()> {
        if !self.capabilities.synthesis {
            return Err(Error::CapabilityUnavailable("no synthesizer".to_string()));
        }

        self.speaking.store(true, Ordering::SeqCst);
        if self.capturing.load(Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }

        tokio::time::sleep(self.speak_delay).await;
        self.spoken.lock().unwrap().push(text.to_string());
        self.speaking.store(false, Ordering::SeqCst);

        if self.fail_playback {
            Err(Error::Playback("audio device lost".to_string()))
        } else {
            Ok(())
        }
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.stopped.notify_waiters();
    }
}

/// Dispatcher that holds each call until released
pub struct GatedDispatcher {
    reply: String,
    pub entered: Notify,
    pub release: Notify,
    calls: AtomicUsize,
}

impl GatedDispatcher {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            entered: Notify::new(),
            release: Notify::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandDispatcher for GatedDispatcher {
    async fn dispatch(&self, _text: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.reply.clone())
    }
}
