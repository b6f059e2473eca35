// ── Sensor state ──
//
// Binary sensor bookkeeping: current state, flip time, last delivery,
// bounded history, and the latched reliability flag.

use serde::{Deserialize, Serialize};

use super::{AreaId, BoundedLog, SensorId, Timestamp};
use crate::config::SensorConfig;

pub const SENSOR_HISTORY_LEN: usize = 100;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SensorKind {
    #[default]
    Motion,
    CameraMotion,
    CameraPerson,
    Magnetic,
    /// Any configured type the engine does not understand; events are ignored.
    #[serde(other)]
    Unsupported,
}

impl SensorKind {
    /// Motion, camera motion, and camera person detection.
    pub fn is_motion_family(self) -> bool {
        matches!(self, Self::Motion | Self::CameraMotion | Self::CameraPerson)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub state: bool,
    pub at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorState {
    pub id: SensorId,
    pub kind: SensorKind,
    /// Normalized from the string-or-list config binding.
    pub bound_areas: Vec<AreaId>,
    pub current_state: bool,
    /// Only moves on an actual flip. `0.0` until the first flip.
    pub last_changed: Timestamp,
    /// Moves on every delivered event, repeats included.
    pub last_update_time: Timestamp,
    pub history: BoundedLog<SensorReading>,
    /// Latched `false` once flagged stuck; only an anomaly reset restores it.
    pub is_reliable: bool,
    pub is_stuck: bool,
}

impl SensorState {
    pub fn new(id: SensorId, config: &SensorConfig) -> Self {
        Self {
            id,
            kind: config.kind,
            bound_areas: config.bound_areas(),
            current_state: false,
            last_changed: 0.0,
            last_update_time: 0.0,
            history: BoundedLog::new(SENSOR_HISTORY_LEN),
            is_reliable: true,
            is_stuck: false,
        }
    }

    /// Apply a delivered state. Returns whether the state actually flipped.
    pub fn update_state(&mut self, state: bool, at: Timestamp) -> bool {
        self.touch(state, at);
        if state == self.current_state {
            return false;
        }
        self.current_state = state;
        self.last_changed = at;
        true
    }

    /// Record a delivery without evaluating a flip.
    pub fn touch(&mut self, state: bool, at: Timestamp) {
        self.last_update_time = at;
        self.history.push(SensorReading { state, at });
    }

    /// Seconds spent in the current state.
    pub fn time_in_state(&self, now: Timestamp) -> f64 {
        now - self.last_changed
    }

    pub fn is_motion_family(&self) -> bool {
        self.kind.is_motion_family()
    }

    pub fn is_bound_to(&self, area: &str) -> bool {
        self.bound_areas.iter().any(|a| a.as_str() == area)
    }

    /// Restore reliability after an explicit anomaly reset.
    pub fn unlatch(&mut self) {
        self.is_reliable = true;
        self.is_stuck = false;
    }

    pub fn reset(&mut self) {
        self.current_state = false;
        self.last_changed = 0.0;
        self.last_update_time = 0.0;
        self.history.clear();
        self.unlatch();
    }
}
