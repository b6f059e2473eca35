// ── Domain model ──
//
// Plain state holders shared by the resolver, anomaly detector, and
// recorder. Behaviour beyond bookkeeping lives in those components.

pub mod area;
pub mod bounded;
pub mod ids;
pub mod sensor;
pub mod warning;

/// Seconds since an arbitrary epoch. The engine never reads a clock.
pub type Timestamp = f64;

// ── Re-exports ──────────────────────────────────────────────────────

pub use area::{Activity, ActivityKind, AreaState};
pub use bounded::BoundedLog;
pub use ids::{AreaId, SensorId};
pub use sensor::{SensorKind, SensorReading, SensorState};
pub use warning::{Warning, WarningFilter, WarningKind};
