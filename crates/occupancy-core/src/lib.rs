//! Adjacency-aware occupancy tracking from binary motion sensors.
//!
//! The crate turns a stream of sensor flips into per-area occupancy counts
//! without identifying anyone, using only which areas touch each other and
//! when each sensor fired:
//!
//! - **[`Engine`]** is the single entry point. Hosts feed it sensor states
//!   with [`process_event()`](Engine::process_event) and periodic
//!   [`check_timeouts()`](Engine::check_timeouts) sweeps, then read
//!   occupancy, [probability](Engine::get_occupancy_probability), warnings,
//!   and status back.
//!
//! - **[`OccupancyResolver`]** explains each motion as a move from a
//!   neighbour, an entry from outside, or a keep-alive, and repairs areas
//!   whose sensor is on while their count is zero.
//!
//! - **[`AnomalyDetector`]** raises warnings for stuck sensors, unexplained
//!   motion, and simultaneous motion in distant areas, and expires stale
//!   occupancy.
//!
//! - **[`SnapshotRecorder`]** keeps a bounded, replayable history. The
//!   engine can [rebuild](Engine::rebuild_from_history) state from it and
//!   [verify](Engine::verify_history) that replay reproduces it.
//!
//! Timestamps are caller-supplied seconds; the engine never reads a clock.

pub mod anomaly;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod probability;
pub mod recorder;
pub mod resolver;
pub mod status;
pub mod store;
pub mod topology;
pub mod verify;

// ── Primary re-exports ──────────────────────────────────────────────
pub use anomaly::{AnomalyDetector, Expiry, ExpiryRule};
pub use config::{
    AnomalySettings, AreaBinding, AreaConfig, ConsistencyPolicy, EngineSettings, SensorConfig,
    TrackerConfig,
};
pub use engine::Engine;
pub use error::CoreError;
pub use probability::occupancy_probability;
pub use recorder::{
    MergedSnapshot, SensorEvent, Snapshot, SnapshotEvent, SnapshotKind, SnapshotRecorder,
    TickCause,
};
pub use resolver::{OccupancyResolver, ReplayStart, TransitionOutcome};
pub use status::{AreaStatus, SensorDiagnosis, SystemStatus};
pub use store::OccupancyStore;
pub use topology::AdjacencyGraph;
pub use verify::{
    DifferenceKind, HistoryVerifier, StateDifference, VerificationReport, VerifyMode,
};

pub use model::{
    AreaId, AreaState, SensorId, SensorKind, SensorState, Timestamp, Warning, WarningFilter,
    WarningKind,
};
