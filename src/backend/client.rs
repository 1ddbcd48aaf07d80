//! HTTP client for the vehicle assistant backend

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry::{Metric, Reading, TelemetrySnapshot};
use crate::{Error, Result};

/// Client for the backend REST API
#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

/// Body for `POST /voice/command` and `POST /voice/speak`
#[derive(Debug, Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

/// Response from `POST /voice/command`
///
/// The backend also echoes the command, its OBD view and a timestamp; only
/// the response text is consumed.
#[derive(Debug, Deserialize)]
struct CommandResponse {
    response: String,
}

/// Response from `GET /obd/{parameter}`
#[derive(Debug, Deserialize)]
struct MetricResponse {
    value: Option<f64>,
    unit: Option<String>,
    connected: Option<bool>,
    error: Option<String>,
}

/// Response from `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub obd_connected: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HealthStatus {
    /// Whether the backend reports itself healthy
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

impl BackendClient {
    /// Create a new backend client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the full telemetry snapshot (`GET /obd`)
    ///
    /// # Errors
    ///
    /// Returns a transport error on network failure, non-success status, or an
    /// undecodable body
    pub async fn fetch_snapshot(&self) -> Result<TelemetrySnapshot> {
        let url = format!("{}/obd", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("GET /obd failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("GET /obd returned {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("failed to read /obd body: {e}")))?;

        TelemetrySnapshot::from_json(&body)
            .map_err(|e| Error::Transport(format!("malformed /obd body: {e}")))
    }

    /// Fetch a single metric (`GET /obd/{parameter}`)
    ///
    /// # Errors
    ///
    /// Returns a transport error on network failure, or if the backend reports
    /// an error or a disconnected adapter
    pub async fn fetch_metric(&self, metric: Metric) -> Result<Reading> {
        let url = format!("{}/obd/{}", self.base_url, metric.key());

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("GET /obd/{metric} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "GET /obd/{metric} returned {status}: {body}"
            )));
        }

        let parsed: MetricResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("malformed /obd/{metric} body: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(Error::Transport(error));
        }
        if parsed.connected == Some(false) {
            return Err(Error::Transport("OBD not connected".to_string()));
        }

        let value = parsed
            .value
            .ok_or_else(|| Error::Transport(format!("no value for {metric}")))?;

        // The single-parameter endpoint reports an empty unit when it has none
        let unit = parsed
            .unit
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| metric.canonical_unit().to_string());

        Ok(Reading::new(value, unit))
    }

    /// Probe backend liveness (`GET /health`)
    ///
    /// # Errors
    ///
    /// Returns a transport error if the backend is unreachable or answers with
    /// a non-success status
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("GET /health failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("GET /health returned {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("malformed /health body: {e}")))
    }

    /// Send a command to the assistant (`POST /voice/command`)
    ///
    /// Every failure collapses into [`Error::Dispatch`]; nothing is retried.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyCommand`] for blank text without touching the
    /// network, otherwise a dispatch error on any failure
    pub async fn send_command(&self, text: &str) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::EmptyCommand);
        }

        let url = format!("{}/voice/command", self.base_url);
        tracing::debug!(command = %text, "dispatching command");

        let response = self
            .client
            .post(&url)
            .json(&TextRequest { text })
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "command request failed");
                Error::Dispatch(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "command endpoint error");
            return Err(Error::Dispatch(format!("backend returned {status}: {body}")));
        }

        let parsed: CommandResponse = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "failed to parse command response");
            Error::Dispatch(format!("malformed response: {e}"))
        })?;

        tracing::info!(response = %parsed.response, "command answered");
        Ok(parsed.response)
    }

    /// Ask the backend to speak text on its own audio device
    /// (`POST /voice/speak`)
    ///
    /// # Errors
    ///
    /// Returns a playback error if the request fails
    pub async fn speak_remote(&self, text: &str) -> Result<()> {
        let url = format!("{}/voice/speak", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&TextRequest { text })
            .send()
            .await
            .map_err(|e| Error::Playback(format!("POST /voice/speak failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Playback(format!("POST /voice/speak returned {status}")));
        }

        Ok(())
    }
}
