//! Telemetry snapshot model and wire decoding

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

/// A vehicle metric the backend can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    Speed,
    Rpm,
    Temperature,
    Fuel,
    EngineLoad,
    Throttle,
    Battery,
}

impl Metric {
    /// Every metric, in dashboard order
    pub const ALL: [Self; 7] = [
        Self::Speed,
        Self::Rpm,
        Self::Temperature,
        Self::Fuel,
        Self::EngineLoad,
        Self::Throttle,
        Self::Battery,
    ];

    /// Key used in the backend JSON body and the `/obd/{parameter}` path
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Speed => "speed",
            Self::Rpm => "rpm",
            Self::Temperature => "temperature",
            Self::Fuel => "fuel",
            Self::EngineLoad => "engine_load",
            Self::Throttle => "throttle",
            Self::Battery => "battery",
        }
    }

    /// Unit assumed when the backend omits one
    #[must_use]
    pub const fn canonical_unit(self) -> &'static str {
        match self {
            Self::Speed => "km/h",
            Self::Rpm => "rpm",
            Self::Temperature => "°C",
            Self::Fuel | Self::EngineLoad | Self::Throttle => "%",
            Self::Battery => "V",
        }
    }

    /// Human-readable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Speed => "Speed",
            Self::Rpm => "RPM",
            Self::Temperature => "Engine Temp",
            Self::Fuel => "Fuel Level",
            Self::EngineLoad => "Engine Load",
            Self::Throttle => "Throttle",
            Self::Battery => "Battery",
        }
    }

    /// Whether the backend may legitimately leave this metric out
    #[must_use]
    pub const fn is_optional(self) -> bool {
        matches!(self, Self::Battery)
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|m| m.key() == needle)
            .ok_or_else(|| Error::UnknownMetric(s.to_string()))
    }
}

/// Which channel delivered a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Fixed-interval `GET /obd`
    Poll,
    /// Persistent websocket
    Push,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Poll => f.write_str("poll"),
            Self::Push => f.write_str("push"),
        }
    }
}

/// One metric reading
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub unit: String,
}

impl Reading {
    #[must_use]
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }
}

/// One complete, timestamped set of vehicle readings
///
/// The metric map is partial: a metric the backend did not report is absent,
/// never zero-filled. Defaults belong to the presentation side
/// (see [`super::display`]).
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    connected: bool,
    observed_at: Option<DateTime<Utc>>,
    metrics: BTreeMap<Metric, Reading>,
    backend_error: Option<String>,
}

/// Raw top-level body shared by `GET /obd` and push messages
#[derive(Debug, Deserialize)]
struct WireSnapshot {
    connected: Option<bool>,
    timestamp: Option<Value>,
    error: Option<String>,
    #[serde(flatten)]
    fields: serde_json::Map<String, Value>,
}

impl TelemetrySnapshot {
    /// Create an empty snapshot
    #[must_use]
    pub const fn new(connected: bool) -> Self {
        Self {
            connected,
            observed_at: None,
            metrics: BTreeMap::new(),
            backend_error: None,
        }
    }

    /// Set the observation timestamp
    #[must_use]
    pub const fn with_observed_at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = Some(observed_at);
        self
    }

    /// Add a reading
    #[must_use]
    pub fn with_reading(mut self, metric: Metric, value: f64, unit: impl Into<String>) -> Self {
        self.metrics.insert(metric, Reading::new(value, unit));
        self
    }

    /// Decode a JSON body from `GET /obd` or the push channel
    ///
    /// # Errors
    ///
    /// Returns error if the body is not a JSON object
    pub fn from_json(body: &str) -> Result<Self> {
        let wire: WireSnapshot = serde_json::from_str(body)?;
        Ok(Self::from_wire(wire))
    }

    fn from_wire(wire: WireSnapshot) -> Self {
        let mut metrics = BTreeMap::new();

        for metric in Metric::ALL {
            let Some(entry) = wire.fields.get(metric.key()) else {
                continue;
            };

            let Some(value) = entry.get("value").and_then(Value::as_f64) else {
                tracing::trace!(metric = %metric, "dropping metric without numeric value");
                continue;
            };

            let unit = entry
                .get("unit")
                .and_then(Value::as_str)
                .unwrap_or_else(|| metric.canonical_unit());

            metrics.insert(metric, Reading::new(value, unit));
        }

        Self {
            // Only an explicit `false` means the adapter is disconnected
            connected: wire.connected.unwrap_or(true),
            observed_at: wire.timestamp.as_ref().and_then(parse_timestamp),
            metrics,
            backend_error: wire.error,
        }
    }

    /// Whether the backend reports the OBD adapter as connected
    #[must_use]
    pub const fn connected(&self) -> bool {
        self.connected
    }

    /// When the backend took these readings, if it said
    #[must_use]
    pub const fn observed_at(&self) -> Option<DateTime<Utc>> {
        self.observed_at
    }

    /// Reading for a metric, if the backend reported it
    #[must_use]
    pub fn get(&self, metric: Metric) -> Option<&Reading> {
        self.metrics.get(&metric)
    }

    /// All reported readings
    pub fn readings(&self) -> impl Iterator<Item = (Metric, &Reading)> {
        self.metrics.iter().map(|(m, r)| (*m, r))
    }

    /// Error string the backend attached, if any
    #[must_use]
    pub fn backend_error(&self) -> Option<&str> {
        self.backend_error.as_deref()
    }
}

/// Parse the backend's `timestamp` field
///
/// Accepts RFC 3339, naive ISO-8601 (taken as UTC), or epoch milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}
