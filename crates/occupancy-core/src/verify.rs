// ── History verification ──
//
// Compares recorded snapshots against state produced by replaying the
// same history through the current logic. A mismatch is a diagnostic
// outcome reported as data, never an error.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{info, warn};

use crate::model::{AreaId, SensorId, Timestamp};
use crate::recorder::Snapshot;
use crate::store::OccupancyStore;

/// Differences logged individually before the rest are summarized.
const LOGGED_DIFFERENCES: usize = 10;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceKind {
    #[strum(to_string = "Area missing in replay")]
    AreaMissing,
    #[strum(to_string = "Occupancy mismatch")]
    OccupancyMismatch,
    #[strum(to_string = "Last motion timestamp mismatch")]
    LastMotionMismatch,
    #[strum(to_string = "Sensor missing in replay")]
    SensorMissing,
    #[strum(to_string = "Sensor state mismatch")]
    SensorStateMismatch,
    #[strum(to_string = "Last changed timestamp mismatch")]
    LastChangedMismatch,
}

/// A value on either side of a difference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Count(u32),
    Flag(bool),
    Time(Timestamp),
    Absent,
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Flag(b) => write!(f, "{b}"),
            Self::Time(t) => write!(f, "{t}"),
            Self::Absent => f.write_str("none"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDifference {
    pub snapshot_index: usize,
    pub timestamp: Timestamp,
    pub kind: DifferenceKind,
    pub area: Option<AreaId>,
    pub sensor: Option<SensorId>,
    pub recorded: StateValue,
    pub replayed: StateValue,
}

impl fmt::Display for StateDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = self
            .area
            .as_ref()
            .map(AreaId::as_str)
            .or_else(|| self.sensor.as_ref().map(SensorId::as_str))
            .unwrap_or("system");
        write!(
            f,
            "[{}] {} in {location}: recorded={}, replayed={}",
            self.snapshot_index, self.kind, self.recorded, self.replayed
        )
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VerifyMode {
    /// Compare only the newest snapshot against the fully replayed state.
    #[default]
    FinalSnapshot,
    /// Compare every snapshot against the state replayed up to it.
    EverySnapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub passed: bool,
    pub total_differences: usize,
    pub differences_by_type: BTreeMap<DifferenceKind, usize>,
    pub affected_areas: BTreeSet<AreaId>,
    pub affected_sensors: BTreeSet<SensorId>,
}

impl VerificationSummary {
    fn from_differences(differences: &[StateDifference]) -> Self {
        let mut summary = Self {
            passed: differences.is_empty(),
            total_differences: differences.len(),
            ..Self::default()
        };
        for diff in differences {
            *summary.differences_by_type.entry(diff.kind).or_default() += 1;
            if let Some(area) = &diff.area {
                summary.affected_areas.insert(area.clone());
            }
            if let Some(sensor) = &diff.sensor {
                summary.affected_sensors.insert(sensor.clone());
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub mode: VerifyMode,
    pub snapshots_checked: usize,
    pub summary: VerificationSummary,
    pub differences: Vec<StateDifference>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.summary.passed
    }

    fn new(mode: VerifyMode, snapshots_checked: usize, differences: Vec<StateDifference>) -> Self {
        Self {
            mode,
            snapshots_checked,
            summary: VerificationSummary::from_differences(&differences),
            differences,
        }
    }
}

/// Steps a replay forward one recorded snapshot at a time.
pub trait ReplayCursor {
    /// Replay through snapshot `index` and expose the resulting state.
    fn advance(&mut self, index: usize, snapshot: &Snapshot) -> &OccupancyStore;
}

#[derive(Debug, Clone, Copy)]
pub struct HistoryVerifier {
    tolerance: f64,
}

impl Default for HistoryVerifier {
    fn default() -> Self {
        Self { tolerance: 0.001 }
    }
}

impl HistoryVerifier {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Compare the newest snapshot against an already replayed store.
    pub fn verify_final(&self, snapshots: &[Snapshot], replayed: &OccupancyStore) -> VerificationReport {
        let Some((index, last)) = snapshots.iter().enumerate().next_back() else {
            warn!("no history to verify");
            return VerificationReport::new(VerifyMode::FinalSnapshot, 0, Vec::new());
        };
        let differences = self.compare_snapshot(index, last, replayed);
        log_outcome(&differences, 1);
        VerificationReport::new(VerifyMode::FinalSnapshot, 1, differences)
    }

    /// Compare every snapshot against the replay state at that point.
    pub fn verify_all(
        &self,
        snapshots: &[Snapshot],
        cursor: &mut impl ReplayCursor,
    ) -> VerificationReport {
        let mut differences = Vec::new();
        for (index, snapshot) in snapshots.iter().enumerate() {
            let replayed = cursor.advance(index, snapshot);
            differences.extend(self.compare_snapshot(index, snapshot, replayed));
        }
        log_outcome(&differences, snapshots.len());
        VerificationReport::new(VerifyMode::EverySnapshot, snapshots.len(), differences)
    }

    pub fn compare_snapshot(
        &self,
        index: usize,
        snapshot: &Snapshot,
        replayed: &OccupancyStore,
    ) -> Vec<StateDifference> {
        let mut out = Vec::new();
        let diff = |kind, area: Option<&AreaId>, sensor: Option<&SensorId>, recorded, replayed| {
            StateDifference {
                snapshot_index: index,
                timestamp: snapshot.timestamp,
                kind,
                area: area.cloned(),
                sensor: sensor.cloned(),
                recorded,
                replayed,
            }
        };

        for (id, recorded) in &snapshot.areas {
            let Some(area) = replayed.area(id.as_str()) else {
                out.push(diff(
                    DifferenceKind::AreaMissing,
                    Some(id),
                    None,
                    StateValue::Absent,
                    StateValue::Absent,
                ));
                continue;
            };
            if recorded.occupancy != area.occupancy {
                out.push(diff(
                    DifferenceKind::OccupancyMismatch,
                    Some(id),
                    None,
                    StateValue::Count(recorded.occupancy),
                    StateValue::Count(area.occupancy),
                ));
            }
            let recorded_motion = recorded.last_motion.unwrap_or(0.0);
            let replayed_motion = area.last_motion.unwrap_or(0.0);
            if !self.within_tolerance(recorded_motion, replayed_motion) {
                out.push(diff(
                    DifferenceKind::LastMotionMismatch,
                    Some(id),
                    None,
                    StateValue::Time(recorded_motion),
                    StateValue::Time(replayed_motion),
                ));
            }
        }

        for (id, recorded) in &snapshot.sensors {
            let Some(sensor) = replayed.sensor(id.as_str()) else {
                out.push(diff(
                    DifferenceKind::SensorMissing,
                    None,
                    Some(id),
                    StateValue::Absent,
                    StateValue::Absent,
                ));
                continue;
            };
            if recorded.state != sensor.current_state {
                out.push(diff(
                    DifferenceKind::SensorStateMismatch,
                    None,
                    Some(id),
                    StateValue::Flag(recorded.state),
                    StateValue::Flag(sensor.current_state),
                ));
            }
            if !self.within_tolerance(recorded.last_changed, sensor.last_changed) {
                out.push(diff(
                    DifferenceKind::LastChangedMismatch,
                    None,
                    Some(id),
                    StateValue::Time(recorded.last_changed),
                    StateValue::Time(sensor.last_changed),
                ));
            }
        }
        out
    }

    fn within_tolerance(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.tolerance
    }
}

fn log_outcome(differences: &[StateDifference], checked: usize) {
    if differences.is_empty() {
        info!(snapshots = checked, "history verification passed");
        return;
    }
    warn!(
        differences = differences.len(),
        "history verification failed"
    );
    for diff in differences.iter().take(LOGGED_DIFFERENCES) {
        warn!("  {diff}");
    }
    if differences.len() > LOGGED_DIFFERENCES {
        warn!("  ... and {} more", differences.len() - LOGGED_DIFFERENCES);
    }
}
