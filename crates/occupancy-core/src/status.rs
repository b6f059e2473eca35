// ── Status and diagnostics ──
//
// Read-only views over engine state for hosts and the CLI: per-area
// status, a system summary, and per-sensor binding diagnostics.

use indexmap::IndexMap;
use serde::Serialize;

use crate::model::{AreaId, SensorId, SensorKind, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaStatus {
    pub id: AreaId,
    pub name: String,
    pub occupancy: u32,
    pub probability: f64,
    pub last_motion: Option<Timestamp>,
    pub seconds_since_motion: Option<f64>,
    /// A motion-family sensor bound here is currently on.
    pub active: bool,
    pub indoors: bool,
    pub exit_capable: bool,
    pub neighbours: Vec<AreaId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub total_occupancy: u32,
    /// Occupied areas and their counts, in configuration order.
    pub occupied_areas: IndexMap<AreaId, u32>,
    pub active_warnings: usize,
    pub last_event_time: Option<Timestamp>,
    pub snapshots_recorded: usize,
}

/// Why a sensor may not be contributing to occupancy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorDiagnosis {
    pub id: SensorId,
    pub kind: SensorKind,
    pub is_motion_family: bool,
    pub current_state: bool,
    pub last_changed: Timestamp,
    pub last_update_time: Timestamp,
    pub bound_areas: Vec<AreaId>,
    /// Bound area ids with no matching configured area.
    pub unknown_areas: Vec<AreaId>,
    pub history_len: usize,
    pub is_reliable: bool,
    pub is_stuck: bool,
    pub problems: Vec<String>,
}
