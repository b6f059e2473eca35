// ── Engine facade ──
//
// Owns the world (areas and sensors), the resolver, the anomaly
// detector, and the snapshot recorder, and serializes every operation
// through `&mut self`. Hosts feed it sensor flips and periodic timeout
// sweeps and read occupancy, probability, warnings, and history back.
//
// Every occupancy change is reachable from the recorded history: sensor
// flips record a snapshot, and corrective actions outside sensor events
// (timeout clears, on-demand consistency passes) record a tick that
// replay re-applies.

use tracing::{debug, info, warn};

use crate::anomaly::AnomalyDetector;
use crate::config::TrackerConfig;
use crate::error::CoreError;
use crate::model::{SensorKind, Timestamp, Warning, WarningFilter};
use crate::probability::occupancy_probability;
use crate::recorder::{
    MergedSnapshot, SensorEvent, Snapshot, SnapshotKind, SnapshotRecorder, TickCause,
    merge_with_config,
};
use crate::resolver::{OccupancyResolver, ReplayPolicy, ReplaySession, ReplayStart, chronological};
use crate::status::{AreaStatus, SensorDiagnosis, SystemStatus};
use crate::store::OccupancyStore;
use crate::topology::AdjacencyGraph;
use crate::verify::{HistoryVerifier, ReplayCursor, VerificationReport, VerifyMode};

#[derive(Debug)]
pub struct Engine {
    config: TrackerConfig,
    store: OccupancyStore,
    resolver: OccupancyResolver,
    detector: AnomalyDetector,
    recorder: SnapshotRecorder,
    verifier: HistoryVerifier,
    last_event_time: Option<Timestamp>,
}

impl Engine {
    pub fn new(config: TrackerConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let graph = AdjacencyGraph::from_directed(&config.adjacency);
        let settings = &config.settings;
        info!(
            areas = config.areas.len(),
            sensors = config.sensors.len(),
            edges = graph.edge_count(),
            consistency = %settings.consistency,
            "occupancy engine ready"
        );
        Ok(Self {
            store: OccupancyStore::from_config(&config),
            detector: AnomalyDetector::new(graph.clone(), config.anomaly.clone()),
            resolver: OccupancyResolver::new(graph),
            recorder: SnapshotRecorder::new(settings.max_snapshots, settings.tick_interval),
            verifier: HistoryVerifier::new(settings.tolerance),
            last_event_time: None,
            config,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn store(&self) -> &OccupancyStore {
        &self.store
    }

    pub fn graph(&self) -> &AdjacencyGraph {
        self.resolver.graph()
    }

    // ── Inputs ──────────────────────────────────────────────────────

    /// Deliver a sensor state. Returns whether the sensor actually flipped.
    ///
    /// Repeats only refresh the sensor's delivery time and run the
    /// stuck-sensor check. Unknown sensors are logged and dropped.
    pub fn process_event(&mut self, sensor_id: &str, state: bool, at: Timestamp) -> bool {
        let Some(sensor) = self.store.sensors.get_mut(sensor_id) else {
            warn!(sensor = sensor_id, "unknown sensor id; dropping event");
            return false;
        };
        if sensor.current_state == state {
            sensor.touch(state, at);
            self.detector.check_for_stuck_sensors(&mut self.store.sensors, at);
            return false;
        }
        let event = SensorEvent {
            sensor: sensor.id.clone(),
            state,
            at,
        };
        debug!(sensor = sensor_id, state, at, "sensor transition");

        if self.recorder.is_empty() {
            self.recorder.record_tick(at, TickCause::Initial, &self.store);
        }
        if let Some(sensor) = self.store.sensors.get_mut(sensor_id) {
            sensor.update_state(state, at);
        }
        let provisional = self.recorder.record_sensor_event(&event, &self.store);
        debug!(snapshot = provisional.description(), "snapshot pending resolution");

        let effect = self.resolver.handle_event(
            &event,
            &mut self.store,
            self.config.settings.consistency,
            Some(&mut self.detector),
        );
        self.detector.check_for_stuck_sensors(&mut self.store.sensors, at);
        for area in &effect.motion_areas {
            self.detector
                .check_simultaneous_motion(area, &self.store.areas, at);
        }

        self.recorder.commit(provisional, &self.store);
        self.last_event_time = Some(at);
        true
    }

    /// Periodic sweep: expire stale occupancy and keep the history alive.
    pub fn check_timeouts(&mut self, at: Timestamp) {
        let expired = self.detector.check_timeouts(&mut self.store.areas, at);
        if expired.is_empty() {
            self.recorder.maybe_record_tick(at, &self.store);
        } else {
            self.recorder
                .record_tick(at, TickCause::TimeoutSweep, &self.store);
        }
    }

    /// Run the "active but empty" repair pass now. Returns whether
    /// occupancy changed; a change is recorded for replay.
    pub fn resolve_consistency(&mut self, at: Timestamp) -> bool {
        let changed = self.resolver.resolve_consistency(&mut self.store, at, None);
        if changed {
            self.recorder
                .record_tick(at, TickCause::Consistency, &self.store);
        }
        changed
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Occupancy count; 0 for unknown areas.
    pub fn get_occupancy(&self, area_id: &str) -> u32 {
        self.store.occupancy(area_id)
    }

    /// Confidence in `[0, 1]` that the area is occupied at `now`.
    pub fn get_occupancy_probability(&self, area_id: &str, now: Timestamp) -> f64 {
        self.store
            .area(area_id)
            .map_or(0.0, |a| occupancy_probability(a.occupancy, a.last_motion, now))
    }

    pub fn get_warnings(&self, active_only: bool) -> Vec<&Warning> {
        self.detector.warnings(active_only)
    }

    pub fn warnings_matching(&self, filter: &WarningFilter) -> Vec<&Warning> {
        self.detector.filtered(filter)
    }

    pub fn resolve_warning(&mut self, id: &str) -> bool {
        self.detector.resolve_warning(id)
    }

    pub fn clear_warnings(&mut self) -> bool {
        let cleared = self.detector.clear_warnings();
        if cleared {
            info!("active warnings cleared");
        }
        cleared
    }

    // ── Status ──────────────────────────────────────────────────────

    pub fn area_status(&self, area_id: &str, now: Timestamp) -> Result<AreaStatus, CoreError> {
        let area = self
            .store
            .area(area_id)
            .ok_or_else(|| CoreError::AreaNotFound {
                identifier: area_id.to_owned(),
            })?;
        Ok(AreaStatus {
            id: area.id.clone(),
            name: area.name.clone(),
            occupancy: area.occupancy,
            probability: occupancy_probability(area.occupancy, area.last_motion, now),
            last_motion: area.last_motion,
            seconds_since_motion: area.last_motion.map(|t| now - t),
            active: self.store.is_area_active(area_id),
            indoors: area.indoors,
            exit_capable: area.exit_capable,
            neighbours: self.graph().neighbors(area_id).cloned().collect(),
        })
    }

    /// Status of every area, in configuration order.
    pub fn area_statuses(&self, now: Timestamp) -> Vec<AreaStatus> {
        self.store
            .areas
            .keys()
            .filter_map(|id| self.area_status(id.as_str(), now).ok())
            .collect()
    }

    pub fn system_status(&self) -> SystemStatus {
        SystemStatus {
            total_occupancy: self.store.total_occupancy(),
            occupied_areas: self
                .store
                .areas
                .values()
                .filter(|a| a.is_occupied())
                .map(|a| (a.id.clone(), a.occupancy))
                .collect(),
            active_warnings: self.detector.active_count(),
            last_event_time: self.last_event_time,
            snapshots_recorded: self.recorder.len(),
        }
    }

    pub fn diagnose_sensor(&self, sensor_id: &str) -> Result<SensorDiagnosis, CoreError> {
        let sensor = self
            .store
            .sensor(sensor_id)
            .ok_or_else(|| CoreError::SensorNotFound {
                identifier: sensor_id.to_owned(),
            })?;
        let unknown_areas: Vec<_> = sensor
            .bound_areas
            .iter()
            .filter(|id| self.store.area(id.as_str()).is_none())
            .cloned()
            .collect();

        let mut problems = Vec::new();
        if sensor.bound_areas.is_empty() {
            problems.push("not linked to any area".to_owned());
        }
        for id in &unknown_areas {
            problems.push(format!("bound to unknown area {id}"));
        }
        match sensor.kind {
            SensorKind::Magnetic if sensor.bound_areas.len() != 2 => {
                problems.push("magnetic sensor needs exactly two between_areas".to_owned());
            }
            SensorKind::Unsupported => {
                problems.push("unsupported sensor type; events are ignored".to_owned());
            }
            _ => {}
        }
        if !sensor.is_reliable {
            problems.push("flagged stuck; reset anomalies to re-check".to_owned());
        }

        Ok(SensorDiagnosis {
            id: sensor.id.clone(),
            kind: sensor.kind,
            is_motion_family: sensor.is_motion_family(),
            current_state: sensor.current_state,
            last_changed: sensor.last_changed,
            last_update_time: sensor.last_update_time,
            bound_areas: sensor.bound_areas.clone(),
            unknown_areas,
            history_len: sensor.history.len(),
            is_reliable: sensor.is_reliable,
            is_stuck: sensor.is_stuck,
            problems,
        })
    }

    pub fn diagnose_sensors(&self) -> Vec<SensorDiagnosis> {
        self.store
            .sensors
            .keys()
            .filter_map(|id| self.diagnose_sensor(id.as_str()).ok())
            .collect()
    }

    // ── Resets ──────────────────────────────────────────────────────

    /// Wipe areas, sensors, warnings, and history.
    pub fn reset(&mut self) {
        self.store.reset();
        self.detector = self.new_detector();
        self.recorder.reset();
        self.last_event_time = None;
        info!("occupancy tracker reset");
    }

    /// Replace the anomaly detector and unlatch stuck sensors. Occupancy
    /// is preserved.
    pub fn reset_anomalies(&mut self) {
        self.detector = self.new_detector();
        for sensor in self.store.sensors.values_mut() {
            sensor.unlatch();
        }
        info!("anomaly detection reset");
    }

    fn new_detector(&self) -> AnomalyDetector {
        AnomalyDetector::new(self.graph().clone(), self.config.anomaly.clone())
    }

    // ── History ─────────────────────────────────────────────────────

    pub fn export_history(&self) -> Vec<Snapshot> {
        self.recorder.history()
    }

    /// History with static configuration merged in, for external viewers.
    pub fn export_merged_history(&self) -> Vec<MergedSnapshot> {
        self.recorder
            .iter()
            .map(|snapshot| merge_with_config(snapshot, &self.config))
            .collect()
    }

    /// Reset, adopt `snapshots` as the history, and rebuild occupancy
    /// from them.
    pub fn restore_history(&mut self, snapshots: &[Snapshot]) {
        self.reset();
        self.recorder.load(chronological(snapshots));
        self.rebuild_from_history();
    }

    /// Recompute all state by replaying the recorded history.
    pub fn rebuild_from_history(&mut self) {
        let history = self.recorder.history();
        if history.is_empty() {
            return;
        }
        let policy = self.replay_policy(ReplayStart::for_history(&history));
        self.resolver
            .recalculate_from_history(&history, &mut self.store, &policy);
        self.recorder.update_latest_state(&self.store);
        self.last_event_time = history
            .iter()
            .rev()
            .find(|s| s.event_type == SnapshotKind::Sensor)
            .map(|s| s.timestamp);
        info!(snapshots = history.len(), "rebuilt occupancy from history");
    }

    /// Replay the recorded history and compare it with what was recorded.
    /// State is restored afterwards.
    pub fn verify_history(&mut self, mode: VerifyMode) -> VerificationReport {
        let history = self.recorder.history();
        let start = ReplayStart::for_history(&history);
        self.verify_snapshots(&history, mode, start)
    }

    /// Verify an arbitrary history against the current logic. State is
    /// restored afterwards.
    pub fn verify_snapshots(
        &mut self,
        snapshots: &[Snapshot],
        mode: VerifyMode,
        start: ReplayStart,
    ) -> VerificationReport {
        let ordered = chronological(snapshots);
        let policy = self.replay_policy(start);
        let verifier = self.verifier;
        let checkpoint = self.store.checkpoint();
        let mut resolver = self.resolver.clone();

        let report = {
            let mut session =
                ReplaySession::begin(&mut resolver, &mut self.store, &policy, ordered.first());
            match mode {
                VerifyMode::FinalSnapshot => {
                    for (index, snapshot) in ordered.iter().enumerate() {
                        session.advance(index, snapshot);
                    }
                    verifier.verify_final(&ordered, session.store())
                }
                VerifyMode::EverySnapshot => verifier.verify_all(&ordered, &mut session),
            }
        };

        self.store.restore(checkpoint);
        report
    }

    fn replay_policy(&self, start: ReplayStart) -> ReplayPolicy {
        ReplayPolicy {
            consistency: self.config.settings.consistency,
            anomaly: self.config.anomaly.clone(),
            start,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{AreaConfig, ConsistencyPolicy, EngineSettings, SensorConfig};
    use crate::model::WarningKind;
    use pretty_assertions::assert_eq;

    fn config() -> TrackerConfig {
        TrackerConfig::default()
            .area("porch", AreaConfig::exit().named("Porch"))
            .area("hall", AreaConfig::default())
            .area("office", AreaConfig::default())
            .link("porch", "hall")
            .link("hall", "office")
            .sensor("m_porch", SensorConfig::motion("porch"))
            .sensor("m_hall", SensorConfig::motion("hall"))
            .sensor("m_office", SensorConfig::motion("office"))
            .sensor("orphan", SensorConfig::motion("garage"))
    }

    fn engine() -> Engine {
        Engine::new(config()).unwrap()
    }

    #[test]
    fn repeat_events_do_not_record_snapshots() {
        let mut engine = engine();
        assert!(engine.process_event("m_porch", true, 0.0));
        assert!(!engine.process_event("m_porch", true, 5.0));

        // Initial tick plus one sensor snapshot.
        assert_eq!(engine.export_history().len(), 2);
        let sensor = engine.store().sensor("m_porch").unwrap();
        assert!(sensor.last_changed.abs() < f64::EPSILON);
        assert!((sensor.last_update_time - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_sensor_is_dropped() {
        let mut engine = engine();
        assert!(!engine.process_event("ghost", true, 0.0));
        assert!(engine.export_history().is_empty());
    }

    #[test]
    fn committed_snapshot_carries_post_resolution_state() {
        let mut engine = engine();
        engine.process_event("m_porch", true, 0.0);
        let history = engine.export_history();
        assert_eq!(history[0].description, "initial");
        assert_eq!(history[0].areas["porch"].occupancy, 0);
        assert_eq!(history[1].description, "sensor:m_porch:on");
        assert_eq!(history[1].areas["porch"].occupancy, 1);
    }

    #[test]
    fn timeout_clear_is_recorded_and_replayable() {
        let mut engine = engine();
        engine.process_event("m_porch", true, 0.0);
        engine.process_event("m_porch", false, 10.0);
        engine.check_timeouts(400.0);

        assert_eq!(engine.get_occupancy("porch"), 0);
        let last = engine.export_history().pop().unwrap();
        assert_eq!(last.description, "timeout_sweep");
        assert!(engine.verify_history(VerifyMode::EverySnapshot).passed());
    }

    #[test]
    fn on_demand_consistency_is_recorded() {
        let settings = EngineSettings {
            consistency: ConsistencyPolicy::OnDemand,
            ..EngineSettings::default()
        };
        let mut engine = Engine::new(config().with_settings(settings)).unwrap();
        engine.process_event("m_porch", true, 0.0);
        engine.process_event("m_hall", true, 2.0);
        // Porch sensor still on but the occupant moved to the hall.
        assert_eq!(engine.get_occupancy("porch"), 0);

        assert!(engine.resolve_consistency(500.0));
        assert_eq!(engine.export_history().pop().unwrap().description, "consistency");
        assert!(engine.verify_history(VerifyMode::EverySnapshot).passed());
    }

    #[test]
    fn verification_leaves_state_untouched() {
        let mut engine = engine();
        engine.process_event("m_porch", true, 0.0);
        engine.process_event("m_hall", true, 2.0);
        engine.process_event("m_porch", false, 3.0);
        let before = engine.store().clone();

        assert!(engine.verify_history(VerifyMode::FinalSnapshot).passed());
        assert_eq!(engine.store(), &before);
    }

    #[test]
    fn tampered_history_fails_verification() {
        let mut engine = engine();
        engine.process_event("m_porch", true, 0.0);
        let mut history = engine.export_history();
        history
            .last_mut()
            .unwrap()
            .areas
            .get_mut("porch")
            .unwrap()
            .occupancy = 3;

        let report = engine.verify_snapshots(&history, VerifyMode::FinalSnapshot, ReplayStart::Empty);
        assert!(!report.passed());
        assert_eq!(report.summary.total_differences, 1);
    }

    #[test]
    fn reset_anomalies_keeps_occupancy_and_unlatches() {
        let mut engine = engine();
        engine.process_event("m_office", true, 0.0);
        engine.process_event("m_porch", true, 100_000.0);
        assert!(!engine.store().sensor("m_office").unwrap().is_reliable);
        assert!(!engine.get_warnings(true).is_empty());

        engine.reset_anomalies();
        assert!(engine.get_warnings(false).is_empty());
        assert!(engine.store().sensor("m_office").unwrap().is_reliable);
        assert_eq!(engine.get_occupancy("office"), 1);
    }

    #[test]
    fn full_reset_wipes_everything() {
        let mut engine = engine();
        engine.process_event("m_office", true, 0.0);
        engine.reset();
        assert_eq!(engine.system_status().total_occupancy, 0);
        assert!(engine.export_history().is_empty());
        assert!(engine.get_warnings(false).is_empty());
        assert!(!engine.store().sensor("m_office").unwrap().current_state);
    }

    #[test]
    fn status_views() {
        let mut engine = engine();
        engine.process_event("m_porch", true, 10.0);

        let status = engine.area_status("porch", 100.0).unwrap();
        assert_eq!(status.name, "Porch");
        assert_eq!(status.occupancy, 1);
        assert_eq!(status.seconds_since_motion, Some(90.0));
        assert!((status.probability - 0.9).abs() < f64::EPSILON);
        assert!(status.active);
        assert_eq!(status.neighbours.len(), 1);
        assert!(matches!(
            engine.area_status("attic", 0.0),
            Err(CoreError::AreaNotFound { .. })
        ));

        let system = engine.system_status();
        assert_eq!(system.total_occupancy, 1);
        assert_eq!(system.occupied_areas.get("porch"), Some(&1));
        assert_eq!(system.last_event_time, Some(10.0));
    }

    #[test]
    fn sensor_diagnosis_reports_binding_problems() {
        let engine = engine();
        let orphan = engine.diagnose_sensor("orphan").unwrap();
        assert_eq!(orphan.unknown_areas.len(), 1);
        assert_eq!(orphan.problems, vec!["bound to unknown area garage".to_owned()]);
        assert!(engine.diagnose_sensor("m_hall").unwrap().problems.is_empty());
        assert!(engine.diagnose_sensor("nope").is_err());
        assert_eq!(engine.diagnose_sensors().len(), 4);
    }

    #[test]
    fn unexpected_motion_is_warned_but_counted() {
        let mut engine = engine();
        engine.process_event("m_office", true, 0.0);
        assert_eq!(engine.get_occupancy("office"), 1);
        let warnings = engine.warnings_matching(&WarningFilter::ByKind(WarningKind::UnexpectedMotion));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].sensor.as_ref().unwrap().as_str(), "m_office");
    }

    #[test]
    fn rejects_zero_capacity() {
        let settings = EngineSettings {
            max_snapshots: 0,
            ..EngineSettings::default()
        };
        assert!(Engine::new(config().with_settings(settings)).is_err());
    }
}
