//! Presentation-boundary helpers
//!
//! The snapshot never fabricates values; this is where missing readings turn
//! into zeros with their canonical unit.

use super::snapshot::{Metric, Reading, TelemetrySnapshot};
use super::sync::ConnectivityState;

/// Fuel percentage below which the dashboard warns
pub const LOW_FUEL_THRESHOLD: f64 = 20.0;

/// Reading to display for a metric, defaulting to zero
#[must_use]
pub fn reading_or_default(snapshot: Option<&TelemetrySnapshot>, metric: Metric) -> Reading {
    snapshot
        .and_then(|s| s.get(metric))
        .cloned()
        .unwrap_or_else(|| Reading::new(0.0, metric.canonical_unit()))
}

/// Full scale of a gauge, if the metric is drawn as one
#[must_use]
pub const fn gauge_max(metric: Metric) -> Option<f64> {
    match metric {
        Metric::Speed => Some(200.0),
        Metric::Rpm => Some(8000.0),
        Metric::Temperature => Some(120.0),
        Metric::Fuel => Some(100.0),
        Metric::EngineLoad | Metric::Throttle | Metric::Battery => None,
    }
}

/// Gauge fill in `0.0..=1.0`
#[must_use]
pub fn gauge_fraction(metric: Metric, reading: &Reading) -> Option<f64> {
    gauge_max(metric).map(|max| (reading.value / max).clamp(0.0, 1.0))
}

/// Whether the low-fuel warning should show
///
/// An absent fuel reading never warns.
#[must_use]
pub fn low_fuel(snapshot: &TelemetrySnapshot) -> bool {
    snapshot
        .get(Metric::Fuel)
        .is_some_and(|r| r.value < LOW_FUEL_THRESHOLD)
}

/// Status badge text
#[must_use]
pub const fn connectivity_label(state: ConnectivityState) -> &'static str {
    match state {
        ConnectivityState::Live => "● LIVE",
        ConnectivityState::Degraded => "◐ DEGRADED",
        ConnectivityState::Offline => "○ OFFLINE",
    }
}

/// Format one reading the way the dashboard shows it
#[must_use]
pub fn format_reading(metric: Metric, reading: &Reading) -> String {
    match metric {
        // RPM is shown rounded; everything else as reported
        Metric::Rpm => format!("{:.0} {}", reading.value, reading.unit),
        _ => format!("{} {}", reading.value, reading.unit),
    }
}
