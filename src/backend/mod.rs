//! Backend REST API access
//!
//! One typed client covers every endpoint the dashboard consumes: the
//! telemetry poll, single-metric probes, the command processor, server-side
//! speech, and the liveness probe.

pub mod client;

pub use client::{BackendClient, HealthStatus};
