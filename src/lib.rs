//! Cockpit client - live vehicle telemetry dashboard with a voice assistant
//!
//! This library provides the client side of the in-car dashboard:
//! - Telemetry sync (fixed-interval poll and websocket push merged by recency)
//! - Voice sessions (capture, dispatch to the assistant, speak the answer)
//! - A typed client for the backend REST API
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Presentation (CLI)                  │
//! │   Dashboard  │  Voice prompt  │  Quick commands     │
//! └───────▲──────────────────────────────▲──────────────┘
//!         │ watch                        │ watch
//! ┌───────┴──────────────┐   ┌───────────┴──────────────┐
//! │ TelemetrySynchronizer│   │ VoiceInteractionController│
//! └───────▲──────────────┘   └───▲──────────────▲───────┘
//!         │ mpsc                 │              │
//! ┌───────┴──────────────┐   ┌───┴──────┐ ┌─────┴────────┐
//! │ TelemetryTransport   │   │ SpeechIo │ │ Dispatcher   │
//! │  poll  │  push (ws)  │   └──────────┘ └─────┬────────┘
//! └───────▲──────────────┘                      │
//!         └──────────── BackendClient ◄─────────┘
//! ```

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod voice;

pub use backend::{BackendClient, HealthStatus};
pub use client::DashboardClient;
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use telemetry::{
    ConnectivityState, Metric, Reading, Source, TelemetrySnapshot, TelemetrySynchronizer,
    TelemetryTransport, TelemetryView, TransportEvent, TransportHandle,
};
pub use voice::{
    CommandDispatcher, ConsoleSpeech, QUICK_COMMANDS, QuickCommand, Rejection, SessionOutcome,
    SpeechCapabilities, SpeechIo, VoiceInteractionController, VoiceSession, VoiceState,
};
