// ── Warnings ──
//
// Anomaly records. Append-only: resolving flips `is_active`, nothing is
// ever removed, so the list doubles as an audit trail.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AreaId, SensorId, Timestamp};

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
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WarningKind {
    StuckSensor,
    UnexpectedMotion,
    SimultaneousMotion,
    InactivityTimeout,
    ExtendedOccupancy,
    ExitAreaAutoClear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    /// `{kind}_{area}_{sensor}_{timestamp}`, empty segments for absent ids.
    pub id: String,
    pub kind: WarningKind,
    pub message: String,
    pub area: Option<AreaId>,
    pub sensor: Option<SensorId>,
    pub timestamp: Timestamp,
    pub is_active: bool,
}

impl Warning {
    pub fn new(
        kind: WarningKind,
        message: impl Into<String>,
        area: Option<AreaId>,
        sensor: Option<SensorId>,
        timestamp: Timestamp,
    ) -> Self {
        let id = format!(
            "{kind}_{}_{}_{timestamp}",
            area.as_ref().map_or("", AreaId::as_str),
            sensor.as_ref().map_or("", SensorId::as_str),
        );
        Self {
            id,
            kind,
            message: message.into(),
            area,
            sensor,
            timestamp,
            is_active: true,
        }
    }

    pub fn resolve(&mut self) {
        self.is_active = false;
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Warning[{}]: {}", self.kind, self.message)
    }
}

/// Filter predicate for warning lists.
pub enum WarningFilter {
    All,
    Active,
    ByKind(WarningKind),
    ByArea(AreaId),
    BySensor(SensorId),
    Custom(Box<dyn Fn(&Warning) -> bool + Send + Sync>),
}

impl WarningFilter {
    pub fn matches(&self, warning: &Warning) -> bool {
        match self {
            Self::All => true,
            Self::Active => warning.is_active,
            Self::ByKind(kind) => warning.kind == *kind,
            Self::ByArea(area) => warning.area.as_ref() == Some(area),
            Self::BySensor(sensor) => warning.sensor.as_ref() == Some(sensor),
            Self::Custom(f) => f(warning),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn id_is_derived_from_kind_area_sensor_and_time() {
        let warning = Warning::new(
            WarningKind::StuckSensor,
            "stuck",
            Some(AreaId::from("hall")),
            Some(SensorId::from("motion_hall")),
            1000.5,
        );
        assert_eq!(warning.id, "stuck_sensor_hall_motion_hall_1000.5");

        let bare = Warning::new(WarningKind::SimultaneousMotion, "x", None, None, 7.0);
        assert_eq!(bare.id, "simultaneous_motion___7");
    }

    #[test]
    fn display_includes_kind_and_message() {
        let warning = Warning::new(WarningKind::InactivityTimeout, "reset", None, None, 1.0);
        insta::assert_snapshot!(warning.to_string(), @"Warning[inactivity_timeout]: reset");
    }

    #[test]
    fn filters_select_by_field() {
        let mut warning = Warning::new(
            WarningKind::ExtendedOccupancy,
            "long stay",
            Some(AreaId::from("den")),
            None,
            5.0,
        );
        assert!(WarningFilter::ByArea(AreaId::from("den")).matches(&warning));
        assert!(WarningFilter::ByKind(WarningKind::ExtendedOccupancy).matches(&warning));
        assert!(!WarningFilter::BySensor(SensorId::from("x")).matches(&warning));

        warning.resolve();
        assert!(!WarningFilter::Active.matches(&warning));
        assert!(WarningFilter::All.matches(&warning));
        assert!(WarningFilter::Custom(Box::new(|w| w.message.contains("long"))).matches(&warning));
    }
}
