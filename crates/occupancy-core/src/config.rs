// ── Runtime configuration ──
//
// Static description of the building (areas, adjacency, sensors) plus
// engine tunables. Built by callers (CLI, tests, embedding hosts) and
// never touches disk; file loading lives in `occupancy-config`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{AreaId, SensorId, SensorKind};

// ── Areas ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaConfig {
    /// Display name; falls back to the area id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub indoors: bool,
    /// People may cross the monitored boundary here (yards, porches).
    #[serde(default)]
    pub exit_capable: bool,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            name: None,
            indoors: true,
            exit_capable: false,
        }
    }
}

impl AreaConfig {
    pub fn exit() -> Self {
        Self {
            name: None,
            indoors: false,
            exit_capable: true,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

fn default_true() -> bool {
    true
}

// ── Sensors ─────────────────────────────────────────────────────────

/// `area = "hall"` and `area = ["hall", "stairs"]` are both accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AreaBinding {
    One(AreaId),
    Many(Vec<AreaId>),
}

impl AreaBinding {
    pub fn into_vec(self) -> Vec<AreaId> {
        match self {
            Self::One(id) => vec![id],
            Self::Many(ids) => ids,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(rename = "type", default)]
    pub kind: SensorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<AreaBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub between_areas: Option<Vec<AreaId>>,
}

impl SensorConfig {
    pub fn motion(area: impl Into<AreaId>) -> Self {
        Self::of_kind(SensorKind::Motion, area)
    }

    pub fn of_kind(kind: SensorKind, area: impl Into<AreaId>) -> Self {
        Self {
            kind,
            area: Some(AreaBinding::One(area.into())),
            between_areas: None,
        }
    }

    pub fn magnetic(a: impl Into<AreaId>, b: impl Into<AreaId>) -> Self {
        Self {
            kind: SensorKind::Magnetic,
            area: None,
            between_areas: Some(vec![a.into(), b.into()]),
        }
    }

    /// Normalized list of areas this sensor reports on.
    ///
    /// Magnetic sensors use `between_areas`, falling back to `area`;
    /// everything else uses `area`.
    pub fn bound_areas(&self) -> Vec<AreaId> {
        let from_area = || self.area.clone().map(AreaBinding::into_vec).unwrap_or_default();
        match self.kind {
            SensorKind::Magnetic => self.between_areas.clone().unwrap_or_else(from_area),
            _ => from_area(),
        }
    }
}

// ── Engine tunables ─────────────────────────────────────────────────

/// When the "active but empty" repair pass runs.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConsistencyPolicy {
    /// After every processed sensor event, live and on replay.
    #[default]
    AfterEveryEvent,
    /// Only when [`Engine::resolve_consistency`](crate::Engine::resolve_consistency) is called.
    OnDemand,
}

/// Recorder, replay, and verification settings. All durations are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub max_snapshots: usize,
    pub tick_interval: f64,
    pub consistency: ConsistencyPolicy,
    pub tolerance: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_snapshots: 500,
            tick_interval: 300.0,
            consistency: ConsistencyPolicy::default(),
            tolerance: 0.001,
        }
    }
}

/// Anomaly and timeout thresholds. All durations are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalySettings {
    pub stuck_after: f64,
    pub exit_clear_after: f64,
    pub inactivity_reset_after: f64,
    pub extended_occupancy_after: f64,
    pub simultaneous_window: f64,
    pub max_hops: usize,
}

impl Default for AnomalySettings {
    fn default() -> Self {
        Self {
            stuck_after: 24.0 * 3600.0,
            exit_clear_after: 5.0 * 60.0,
            inactivity_reset_after: 24.0 * 3600.0,
            extended_occupancy_after: 12.0 * 3600.0,
            simultaneous_window: 10.0,
            max_hops: 2,
        }
    }
}

// ── Tracker configuration ───────────────────────────────────────────

/// Everything the engine needs at construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub areas: IndexMap<AreaId, AreaConfig>,
    /// Directed input; symmetrized by [`AdjacencyGraph`](crate::AdjacencyGraph).
    #[serde(default)]
    pub adjacency: IndexMap<AreaId, Vec<AreaId>>,
    #[serde(default)]
    pub sensors: IndexMap<SensorId, SensorConfig>,
    #[serde(default, rename = "engine")]
    pub settings: EngineSettings,
    #[serde(default)]
    pub anomaly: AnomalySettings,
}

impl TrackerConfig {
    pub fn area(mut self, id: impl Into<AreaId>, config: AreaConfig) -> Self {
        self.areas.insert(id.into(), config);
        self
    }

    pub fn link(mut self, a: impl Into<AreaId>, b: impl Into<AreaId>) -> Self {
        self.adjacency.entry(a.into()).or_default().push(b.into());
        self
    }

    pub fn sensor(mut self, id: impl Into<SensorId>, config: SensorConfig) -> Self {
        self.sensors.insert(id.into(), config);
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Reject tunables the engine cannot operate with.
    pub fn validate(&self) -> Result<(), CoreError> {
        let s = &self.settings;
        if s.max_snapshots == 0 {
            return Err(CoreError::ValidationFailed {
                message: "max_snapshots must be at least 1".into(),
            });
        }
        let durations = [
            ("tick_interval", s.tick_interval),
            ("tolerance", s.tolerance),
            ("stuck_after", self.anomaly.stuck_after),
            ("exit_clear_after", self.anomaly.exit_clear_after),
            ("inactivity_reset_after", self.anomaly.inactivity_reset_after),
            ("extended_occupancy_after", self.anomaly.extended_occupancy_after),
            ("simultaneous_window", self.anomaly.simultaneous_window),
        ];
        for (field, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::ValidationFailed {
                    message: format!("{field} must be a non-negative number, got {value}"),
                });
            }
        }
        Ok(())
    }
}
