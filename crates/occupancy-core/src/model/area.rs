// ── Area state ──
//
// Mutable per-area bookkeeping. Carries no resolution logic; the
// resolver and anomaly detector decide when these methods are called.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{AreaId, BoundedLog, Timestamp};
use crate::config::AreaConfig;

/// Length of each area's activity log.
pub const ACTIVITY_LOG_LEN: usize = 100;
/// Motion-sensor deactivations remembered per area.
pub const DEACTIVATION_LOOKBACK: usize = 3;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityKind {
    Motion,
    Entry,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub at: Timestamp,
    pub kind: ActivityKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AreaState {
    pub id: AreaId,
    pub name: String,
    pub indoors: bool,
    pub exit_capable: bool,
    pub occupancy: u32,
    /// `None` until the first motion is recorded.
    pub last_motion: Option<Timestamp>,
    /// Most recent exit toward each neighbour.
    pub last_exit_to: BTreeMap<AreaId, Timestamp>,
    /// Latest times a bound motion sensor turned off, oldest first.
    pub recent_deactivations: BoundedLog<Timestamp>,
    pub activity: BoundedLog<Activity>,
}

impl AreaState {
    pub fn new(id: AreaId, config: &AreaConfig) -> Self {
        let name = config.name.clone().unwrap_or_else(|| id.to_string());
        Self {
            id,
            name,
            indoors: config.indoors,
            exit_capable: config.exit_capable,
            occupancy: 0,
            last_motion: None,
            last_exit_to: BTreeMap::new(),
            recent_deactivations: BoundedLog::new(DEACTIVATION_LOOKBACK),
            activity: BoundedLog::new(ACTIVITY_LOG_LEN),
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.occupancy > 0
    }

    pub fn record_motion(&mut self, at: Timestamp) {
        self.last_motion = Some(at);
        self.activity.push(Activity {
            at,
            kind: ActivityKind::Motion,
        });
    }

    pub fn record_entry(&mut self, at: Timestamp) {
        self.occupancy = self.occupancy.saturating_add(1);
        self.activity.push(Activity {
            at,
            kind: ActivityKind::Entry,
        });
    }

    /// Decrement occupancy. Returns `false` and leaves the area untouched
    /// when it is already empty.
    pub fn record_exit(&mut self, at: Timestamp, toward: Option<&AreaId>) -> bool {
        if self.occupancy == 0 {
            return false;
        }
        self.occupancy -= 1;
        if let Some(target) = toward {
            self.last_exit_to.insert(target.clone(), at);
        }
        self.activity.push(Activity {
            at,
            kind: ActivityKind::Exit,
        });
        true
    }

    pub fn record_deactivation(&mut self, at: Timestamp) {
        self.recent_deactivations.push(at);
    }

    pub fn deactivated_recently(&self, now: Timestamp, window: f64) -> bool {
        self.recent_deactivations.iter().any(|at| now - at <= window)
    }

    /// Force the area empty without logging an exit (timeout sweeps).
    pub fn clear(&mut self) {
        self.occupancy = 0;
    }

    /// Seconds since the last motion, measured from the epoch when no
    /// motion was ever recorded.
    pub fn inactivity(&self, now: Timestamp) -> f64 {
        now - self.last_motion.unwrap_or(0.0)
    }

    pub fn has_recent_motion(&self, now: Timestamp, window: f64) -> bool {
        self.last_motion.is_some_and(|at| now - at <= window)
    }

    /// Whether this area exited toward `neighbour` less than `window` ago.
    pub fn exited_toward_recently(&self, neighbour: &AreaId, now: Timestamp, window: f64) -> bool {
        self.last_exit_to
            .get(neighbour)
            .is_some_and(|at| now - at < window)
    }

    pub fn exited_anywhere_recently(&self, now: Timestamp, window: f64) -> bool {
        self.last_exit_to.values().any(|at| now - at < window)
    }

    /// Wipe all dynamic state, keeping identity and static flags.
    pub fn reset(&mut self) {
        self.occupancy = 0;
        self.last_motion = None;
        self.last_exit_to.clear();
        self.recent_deactivations.clear();
        self.activity.clear();
    }
}
