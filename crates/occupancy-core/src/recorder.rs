// ── Snapshot recorder ──
//
// Bounded log of whole-world snapshots: one per sensor flip, plus tick
// snapshots for keep-alives and for corrective actions (timeout sweeps,
// on-demand consistency passes) that replay must re-apply.
//
// Sensor snapshots are written in two phases. `record_sensor_event`
// hands out a `ProvisionalSnapshot` that is not yet in the log; `commit`
// stamps it with post-resolution state and appends it. Readers of the
// log therefore never observe a half-written snapshot.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::config::{SensorConfig, TrackerConfig};
use crate::error::CoreError;
use crate::model::{AreaId, BoundedLog, SensorId, SensorKind, Timestamp};
use crate::store::OccupancyStore;

// ── Snapshot types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SnapshotKind {
    Sensor,
    Tick,
}

/// Why a tick snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TickCause {
    /// First snapshot of an empty log.
    Initial,
    Periodic,
    /// A timeout sweep emptied at least one area.
    TimeoutSweep,
    /// An on-demand consistency pass changed occupancy.
    Consistency,
}

/// Recorded area state. The exit targets and deactivation window are the
/// resolver inputs a replay needs when it starts from this snapshot
/// instead of an empty world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaSnapshot {
    pub occupancy: u32,
    pub is_occupied: bool,
    #[serde(default)]
    pub last_motion: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub last_exit_to: BTreeMap<AreaId, Timestamp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_deactivations: Vec<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub state: bool,
    pub last_changed: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: Timestamp,
    pub event_type: SnapshotKind,
    /// `sensor:<id>:<on|off>` for sensor snapshots, the tick cause otherwise.
    pub description: String,
    pub areas: IndexMap<AreaId, AreaSnapshot>,
    pub sensors: IndexMap<SensorId, SensorSnapshot>,
}

/// A sensor transition as delivered to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub sensor: SensorId,
    pub state: bool,
    pub at: Timestamp,
}

/// Decoded meaning of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotEvent {
    Sensor(SensorEvent),
    Tick(TickCause),
}

impl Snapshot {
    fn capture(
        timestamp: Timestamp,
        event_type: SnapshotKind,
        description: String,
        store: &OccupancyStore,
    ) -> Self {
        let mut snapshot = Self {
            timestamp,
            event_type,
            description,
            areas: IndexMap::new(),
            sensors: IndexMap::new(),
        };
        snapshot.refresh(store);
        snapshot
    }

    fn refresh(&mut self, store: &OccupancyStore) {
        self.areas = store
            .areas
            .iter()
            .map(|(id, area)| {
                let state = AreaSnapshot {
                    occupancy: area.occupancy,
                    is_occupied: area.is_occupied(),
                    last_motion: area.last_motion,
                    last_exit_to: area.last_exit_to.clone(),
                    recent_deactivations: area.recent_deactivations.to_vec(),
                };
                (id.clone(), state)
            })
            .collect();
        self.sensors = store
            .sensors
            .iter()
            .map(|(id, sensor)| {
                let state = SensorSnapshot {
                    state: sensor.current_state,
                    last_changed: sensor.last_changed,
                };
                (id.clone(), state)
            })
            .collect();
    }

    pub fn sensor_description(sensor: &SensorId, state: bool) -> String {
        format!("sensor:{sensor}:{}", if state { "on" } else { "off" })
    }

    /// Decode the description into the event it records.
    pub fn event(&self) -> Result<SnapshotEvent, CoreError> {
        let invalid = || CoreError::InvalidSnapshot {
            description: self.description.clone(),
        };
        match self.event_type {
            SnapshotKind::Tick => self
                .description
                .parse()
                .map(SnapshotEvent::Tick)
                .map_err(|_| invalid()),
            SnapshotKind::Sensor => {
                let (sensor, state) = self
                    .description
                    .strip_prefix("sensor:")
                    .and_then(|rest| rest.rsplit_once(':'))
                    .ok_or_else(invalid)?;
                let state = match state {
                    "on" => true,
                    "off" => false,
                    _ => return Err(invalid()),
                };
                if sensor.is_empty() {
                    return Err(invalid());
                }
                Ok(SnapshotEvent::Sensor(SensorEvent {
                    sensor: SensorId::from(sensor),
                    state,
                    at: self.timestamp,
                }))
            }
        }
    }
}

/// A sensor snapshot captured before resolution. Must be committed.
#[derive(Debug)]
#[must_use = "a provisional snapshot is lost unless committed"]
pub struct ProvisionalSnapshot(Snapshot);

impl ProvisionalSnapshot {
    pub fn description(&self) -> &str {
        &self.0.description
    }
}

// ── Recorder ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SnapshotRecorder {
    history: BoundedLog<Snapshot>,
    tick_interval: f64,
    last_snapshot_time: Option<Timestamp>,
    last_event_snapshot_time: Option<Timestamp>,
}

impl SnapshotRecorder {
    pub fn new(max_snapshots: usize, tick_interval: f64) -> Self {
        Self {
            history: BoundedLog::new(max_snapshots),
            tick_interval,
            last_snapshot_time: None,
            last_event_snapshot_time: None,
        }
    }

    /// Capture the state right after a sensor flip, before resolution.
    pub fn record_sensor_event(
        &mut self,
        event: &SensorEvent,
        store: &OccupancyStore,
    ) -> ProvisionalSnapshot {
        self.last_snapshot_time = Some(event.at);
        self.last_event_snapshot_time = Some(event.at);
        ProvisionalSnapshot(Snapshot::capture(
            event.at,
            SnapshotKind::Sensor,
            Snapshot::sensor_description(&event.sensor, event.state),
            store,
        ))
    }

    /// Stamp a provisional snapshot with post-resolution state and append it.
    pub fn commit(&mut self, provisional: ProvisionalSnapshot, store: &OccupancyStore) {
        let mut snapshot = provisional.0;
        snapshot.refresh(store);
        self.history.push(snapshot);
    }

    /// Append a keep-alive tick if the log is empty or nothing has been
    /// recorded for `tick_interval`. Returns whether a tick was taken.
    pub fn maybe_record_tick(&mut self, at: Timestamp, store: &OccupancyStore) -> bool {
        if self.history.is_empty() {
            self.record_tick(at, TickCause::Initial, store);
            return true;
        }
        let recent = |last: Option<Timestamp>| last.is_some_and(|t| at - t < self.tick_interval);
        if recent(self.last_event_snapshot_time) || recent(self.last_snapshot_time) {
            return false;
        }
        self.record_tick(at, TickCause::Periodic, store);
        true
    }

    /// Append a tick unconditionally.
    pub fn record_tick(&mut self, at: Timestamp, cause: TickCause, store: &OccupancyStore) {
        self.last_snapshot_time = Some(at);
        self.history.push(Snapshot::capture(
            at,
            SnapshotKind::Tick,
            cause.to_string(),
            store,
        ));
    }

    /// Re-stamp the newest snapshot with the current state.
    pub fn update_latest_state(&mut self, store: &OccupancyStore) {
        if let Some(latest) = self.history.last_mut() {
            latest.refresh(store);
        }
    }

    pub fn history(&self) -> Vec<Snapshot> {
        self.history.to_vec()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Snapshot> + ExactSizeIterator {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Replace the log with imported snapshots, keeping the newest that fit.
    pub fn load(&mut self, snapshots: Vec<Snapshot>) {
        self.reset();
        let capacity = self.history.capacity();
        let skip = snapshots.len().saturating_sub(capacity);
        for snapshot in snapshots.into_iter().skip(skip) {
            if snapshot.event_type == SnapshotKind::Sensor {
                self.last_event_snapshot_time = Some(snapshot.timestamp);
            }
            self.last_snapshot_time = Some(snapshot.timestamp);
            self.history.push(snapshot);
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.last_snapshot_time = None;
        self.last_event_snapshot_time = None;
    }
}

// ── Config overlay ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedArea {
    pub name: String,
    pub indoors: bool,
    pub exit_capable: bool,
    #[serde(flatten)]
    pub state: AreaSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedSensor {
    #[serde(rename = "type")]
    pub kind: Option<SensorKind>,
    pub areas: Vec<AreaId>,
    #[serde(flatten)]
    pub state: SensorSnapshot,
}

/// A snapshot enriched with static configuration for external consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedSnapshot {
    pub timestamp: Timestamp,
    pub event_type: SnapshotKind,
    pub description: String,
    pub areas: IndexMap<AreaId, MergedArea>,
    pub sensors: IndexMap<SensorId, MergedSensor>,
}

/// Overlay static configuration onto a snapshot. The snapshot is untouched.
pub fn merge_with_config(snapshot: &Snapshot, config: &TrackerConfig) -> MergedSnapshot {
    let areas = snapshot
        .areas
        .iter()
        .map(|(id, state)| {
            let static_cfg = config.areas.get(id).cloned().unwrap_or_default();
            let merged = MergedArea {
                name: static_cfg.name.unwrap_or_else(|| id.to_string()),
                indoors: static_cfg.indoors,
                exit_capable: static_cfg.exit_capable,
                state: state.clone(),
            };
            (id.clone(), merged)
        })
        .collect();
    let sensors = snapshot
        .sensors
        .iter()
        .map(|(id, state)| {
            let static_cfg = config.sensors.get(id);
            let merged = MergedSensor {
                kind: static_cfg.map(|cfg| cfg.kind),
                areas: static_cfg.map(SensorConfig::bound_areas).unwrap_or_default(),
                state: *state,
            };
            (id.clone(), merged)
        })
        .collect();
    MergedSnapshot {
        timestamp: snapshot.timestamp,
        event_type: snapshot.event_type,
        description: snapshot.description.clone(),
        areas,
        sensors,
    }
}
