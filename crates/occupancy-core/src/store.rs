// ── Area and sensor store ──
//
// Owns the mutable world: one `AreaState` per configured area and one
// `SensorState` per configured sensor, in configuration order. Components
// borrow it per call; none of them keeps a reference between calls.

use indexmap::IndexMap;

use crate::config::TrackerConfig;
use crate::model::{AreaId, AreaState, SensorId, SensorState};
use crate::recorder::Snapshot;

pub type AreaMap = IndexMap<AreaId, AreaState>;
pub type SensorMap = IndexMap<SensorId, SensorState>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OccupancyStore {
    pub areas: AreaMap,
    pub sensors: SensorMap,
}

/// Saved copy of every mutable field, restored after verification.
#[derive(Debug, Clone)]
#[must_use = "a checkpoint does nothing unless restored"]
pub struct StoreCheckpoint(OccupancyStore);

impl OccupancyStore {
    pub fn from_config(config: &TrackerConfig) -> Self {
        let areas = config
            .areas
            .iter()
            .map(|(id, cfg)| (id.clone(), AreaState::new(id.clone(), cfg)))
            .collect();
        let sensors = config
            .sensors
            .iter()
            .map(|(id, cfg)| (id.clone(), SensorState::new(id.clone(), cfg)))
            .collect();
        Self { areas, sensors }
    }

    pub fn area(&self, id: &str) -> Option<&AreaState> {
        self.areas.get(id)
    }

    pub fn sensor(&self, id: &str) -> Option<&SensorState> {
        self.sensors.get(id)
    }

    pub fn occupancy(&self, id: &str) -> u32 {
        self.areas.get(id).map_or(0, |a| a.occupancy)
    }

    pub fn total_occupancy(&self) -> u32 {
        self.areas.values().map(|a| a.occupancy).sum()
    }

    /// Any motion-family sensor bound to `area` is currently on.
    pub fn is_area_active(&self, area: &str) -> bool {
        self.sensors
            .values()
            .any(|s| s.is_motion_family() && s.current_state && s.is_bound_to(area))
    }

    pub fn reset(&mut self) {
        self.areas.values_mut().for_each(AreaState::reset);
        self.sensors.values_mut().for_each(SensorState::reset);
    }

    /// Load recorded area and sensor state from a snapshot, including the
    /// exit targets and deactivations source ranking depends on. Ids the
    /// snapshot does not mention keep their current values.
    pub fn seed_from(&mut self, snapshot: &Snapshot) {
        for (id, recorded) in &snapshot.areas {
            if let Some(area) = self.areas.get_mut(id.as_str()) {
                area.occupancy = recorded.occupancy;
                area.last_motion = recorded.last_motion;
                area.last_exit_to.clone_from(&recorded.last_exit_to);
                area.recent_deactivations.clear();
                for &at in &recorded.recent_deactivations {
                    area.record_deactivation(at);
                }
            }
        }
        for (id, recorded) in &snapshot.sensors {
            if let Some(sensor) = self.sensors.get_mut(id.as_str()) {
                sensor.current_state = recorded.state;
                sensor.last_changed = recorded.last_changed;
            }
        }
    }

    pub fn checkpoint(&self) -> StoreCheckpoint {
        StoreCheckpoint(self.clone())
    }

    pub fn restore(&mut self, checkpoint: StoreCheckpoint) {
        *self = checkpoint.0;
    }
}
