//! Live vehicle telemetry
//!
//! Two independently failing channels (a fixed-interval poll and a push
//! websocket) deliver the same snapshot shape. The synchronizer merges them by
//! recency into one authoritative view:
//!
//! ```text
//!  GET /obd ──┐
//!             ├─> TransportEvent ─> TelemetrySynchronizer ─> watch::Receiver<TelemetryView>
//!  ws /ws ────┘
//! ```

pub mod display;
pub mod snapshot;
pub mod sync;
pub mod transport;

pub use snapshot::{Metric, Reading, Source, TelemetrySnapshot};
pub use sync::{Acceptance, ConnectivityState, TelemetrySynchronizer, TelemetryView};
pub use transport::{TelemetryTransport, TransportEvent, TransportHandle};
