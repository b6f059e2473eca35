// ── Anomaly detection ──
//
// Rule set for stuck sensors, unexpected activations, simultaneous
// motion in distant areas, and time-based expiry of stale occupancy.
// Owns the warning list; warnings are deactivated, never removed.

use tracing::{info, warn};

use crate::config::AnomalySettings;
use crate::model::{AreaId, AreaState, SensorId, Timestamp, Warning, WarningFilter, WarningKind};
use crate::store::{AreaMap, SensorMap};
use crate::topology::AdjacencyGraph;

// ── Occupancy expiry ────────────────────────────────────────────────

/// Which timeout rule emptied an area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryRule {
    ExitAreaAutoClear,
    InactivityTimeout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expiry {
    pub area: AreaId,
    pub rule: ExpiryRule,
    /// Seconds since the area's last motion at sweep time.
    pub inactivity: f64,
}

/// Apply the clearing rules to one area. Exit-capable areas clear after
/// `exit_clear_after`; any occupied area clears after `inactivity_reset_after`.
fn expire_area(area: &mut AreaState, now: Timestamp, settings: &AnomalySettings) -> Option<Expiry> {
    if !area.is_occupied() {
        return None;
    }
    let inactivity = area.inactivity(now);
    let rule = if area.exit_capable && inactivity > settings.exit_clear_after {
        ExpiryRule::ExitAreaAutoClear
    } else if inactivity > settings.inactivity_reset_after {
        ExpiryRule::InactivityTimeout
    } else {
        return None;
    };
    area.clear();
    Some(Expiry {
        area: area.id.clone(),
        rule,
        inactivity,
    })
}

/// Clear every stale area without raising warnings. Shared by the live
/// timeout sweep and history replay so both empty the same areas.
pub fn expire_stale_occupancy(
    areas: &mut AreaMap,
    now: Timestamp,
    settings: &AnomalySettings,
) -> Vec<Expiry> {
    areas
        .values_mut()
        .filter_map(|area| expire_area(area, now, settings))
        .collect()
}

// ── Detector ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    graph: AdjacencyGraph,
    settings: AnomalySettings,
    warnings: Vec<Warning>,
}

impl AnomalyDetector {
    pub fn new(graph: AdjacencyGraph, settings: AnomalySettings) -> Self {
        Self {
            graph,
            settings,
            warnings: Vec::new(),
        }
    }

    /// Flag sensors that have been on for longer than `stuck_after`.
    ///
    /// A flagged sensor is latched unreliable and warned about once; it is
    /// re-checked only after an anomaly reset.
    pub fn check_for_stuck_sensors(&mut self, sensors: &mut SensorMap, now: Timestamp) {
        for sensor in sensors.values_mut() {
            sensor.is_stuck =
                sensor.current_state && sensor.time_in_state(now) > self.settings.stuck_after;
            if !sensor.is_stuck || !sensor.is_reliable {
                continue;
            }
            let areas = if sensor.bound_areas.is_empty() {
                "unknown".to_owned()
            } else {
                sensor
                    .bound_areas
                    .iter()
                    .map(AreaId::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            self.create(Warning::new(
                WarningKind::StuckSensor,
                format!("Sensor {} in area {areas} may be stuck", sensor.id),
                sensor.bound_areas.first().cloned(),
                Some(sensor.id.clone()),
                now,
            ));
            sensor.is_reliable = false;
        }
    }

    /// Record a motion the resolver could not explain. Observational only.
    pub fn record_unexpected_activation(
        &mut self,
        area: &AreaId,
        sensor: &SensorId,
        now: Timestamp,
        context: &str,
    ) {
        self.create(Warning::new(
            WarningKind::UnexpectedMotion,
            format!("Unexpected motion in {area} ({context})"),
            Some(area.clone()),
            Some(sensor.clone()),
            now,
        ));
    }

    /// Warn when areas further than `max_hops` from `trigger` saw motion
    /// within the simultaneity window.
    pub fn check_simultaneous_motion(&mut self, trigger: &AreaId, areas: &AreaMap, now: Timestamp) {
        let distant: Vec<&str> = areas
            .values()
            .filter(|area| area.id != *trigger)
            .filter(|area| area.has_recent_motion(now, self.settings.simultaneous_window))
            .filter(|area| {
                !self
                    .graph
                    .within_hops(trigger.as_str(), area.id.as_str(), self.settings.max_hops)
            })
            .map(|area| area.id.as_str())
            .collect();
        if distant.is_empty() {
            return;
        }
        let message = format!(
            "Motion detected simultaneously in non-adjacent areas: {trigger} and {}",
            distant.join(", ")
        );
        self.create(Warning::new(
            WarningKind::SimultaneousMotion,
            message,
            None,
            None,
            now,
        ));
    }

    /// Periodic sweep: clear stale areas, then warn about long stays.
    ///
    /// Returns the areas that were emptied so the caller can record them.
    pub fn check_timeouts(&mut self, areas: &mut AreaMap, now: Timestamp) -> Vec<Expiry> {
        let mut expired = Vec::new();
        for area in areas.values_mut() {
            if let Some(expiry) = expire_area(area, now, &self.settings) {
                self.warn_expiry(&expiry, now);
                expired.push(expiry);
                continue;
            }
            if !area.is_occupied() {
                continue;
            }
            let inactivity = area.inactivity(now);
            if inactivity <= self.settings.extended_occupancy_after {
                continue;
            }
            let already_warned = self.warnings.iter().any(|w| {
                w.is_active
                    && w.kind == WarningKind::ExtendedOccupancy
                    && w.area.as_ref() == Some(&area.id)
            });
            if !already_warned {
                self.create(Warning::new(
                    WarningKind::ExtendedOccupancy,
                    format!(
                        "Area {} has been occupied for {:.1} hours with limited activity",
                        area.id,
                        inactivity / 3600.0
                    ),
                    Some(area.id.clone()),
                    None,
                    now,
                ));
            }
        }
        expired
    }

    fn warn_expiry(&mut self, expiry: &Expiry, now: Timestamp) {
        let (kind, message) = match expiry.rule {
            ExpiryRule::ExitAreaAutoClear => {
                info!(
                    area = %expiry.area,
                    inactivity = expiry.inactivity,
                    "auto-clearing exit-capable area"
                );
                (
                    WarningKind::ExitAreaAutoClear,
                    format!(
                        "Exit-capable area {} was auto-cleared after {:.1} minutes of inactivity",
                        expiry.area,
                        expiry.inactivity / 60.0
                    ),
                )
            }
            ExpiryRule::InactivityTimeout => {
                info!(
                    area = %expiry.area,
                    inactivity = expiry.inactivity,
                    "resetting area after inactivity"
                );
                (
                    WarningKind::InactivityTimeout,
                    format!(
                        "Area {} was reset after {:.1} hours of inactivity",
                        expiry.area,
                        expiry.inactivity / 3600.0
                    ),
                )
            }
        };
        self.create(Warning::new(
            kind,
            message,
            Some(expiry.area.clone()),
            None,
            now,
        ));
    }

    // ── Warning lifecycle ───────────────────────────────────────────

    fn create(&mut self, warning: Warning) {
        warn!(id = %warning.id, "{warning}");
        self.warnings.push(warning);
    }

    pub fn warnings(&self, active_only: bool) -> Vec<&Warning> {
        let filter = if active_only {
            WarningFilter::Active
        } else {
            WarningFilter::All
        };
        self.filtered(&filter)
    }

    pub fn filtered(&self, filter: &WarningFilter) -> Vec<&Warning> {
        self.warnings.iter().filter(|w| filter.matches(w)).collect()
    }

    pub fn active_count(&self) -> usize {
        self.warnings.iter().filter(|w| w.is_active).count()
    }

    /// Deactivate one active warning. Unknown or inactive ids return `false`.
    pub fn resolve_warning(&mut self, id: &str) -> bool {
        match self.warnings.iter_mut().find(|w| w.id == id && w.is_active) {
            Some(warning) => {
                warning.resolve();
                true
            }
            None => false,
        }
    }

    /// Deactivate all warnings. Returns whether anything was active.
    pub fn clear_warnings(&mut self) -> bool {
        let mut cleared = false;
        for warning in self.warnings.iter_mut().filter(|w| w.is_active) {
            warning.resolve();
            cleared = true;
        }
        cleared
    }
}
