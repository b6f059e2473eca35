// ── Occupancy resolver ──
//
// Turns a single sensor flip into an occupancy mutation using only the
// adjacency graph and timing. Motion in an area either moves a person
// in from a neighbour, keeps an existing occupant alive, admits someone
// from outside (exit-capable areas), or is counted anyway and reported.
//
// The resolver holds only the graph. All area and sensor state, including
// the per-area deactivation window, lives in the store and is borrowed per
// call, so a snapshot of the store is enough to resume resolution.

use tracing::{debug, warn};

use crate::anomaly::{AnomalyDetector, expire_stale_occupancy};
use crate::config::{AnomalySettings, ConsistencyPolicy};
use crate::model::{AreaId, SensorId, SensorKind, Timestamp};
use crate::recorder::{SensorEvent, Snapshot, SnapshotEvent, TickCause};
use crate::store::OccupancyStore;
use crate::topology::AdjacencyGraph;
use crate::verify::ReplayCursor;

/// Neighbour evidence (motion or a deactivation) older than this is ignored.
pub const ADJACENT_ACTIVITY_WINDOW: f64 = 120.0;
/// An active neighbour whose motion started less than this long ago may
/// still be a pass-through source.
pub const PASS_THROUGH_WINDOW: f64 = 1.5;

/// How new motion in an area is explained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Someone is already here; the motion is a keep-alive.
    AlreadyPresent,
    /// A person walked in from this neighbour.
    MovedFromNeighbor(AreaId),
    /// A person crossed the system boundary into an exit-capable area.
    EnteredFromOutside,
    /// No plausible origin. Counted anyway and reported.
    Invalid,
}

/// What processing one sensor event changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventEffect {
    /// Target of the last neighbour move, guarded against immediate refill.
    pub moved_into: Option<AreaId>,
    /// Areas that saw motion from this event.
    pub motion_areas: Vec<AreaId>,
    /// The consistency pass changed occupancy.
    pub refilled: bool,
}

/// Where a replay begins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplayStart {
    /// From an empty world; the log starts at the beginning of time.
    #[default]
    Empty,
    /// From the oldest snapshot's recorded state; the log was truncated.
    FirstSnapshot,
}

impl ReplayStart {
    /// A log that opens with the `initial` tick is complete; anything else
    /// lost its head to eviction or was cut before import.
    pub fn for_history(snapshots: &[Snapshot]) -> Self {
        let complete = snapshots
            .iter()
            .min_by(|a, b| a.timestamp.total_cmp(&b.timestamp))
            .is_none_or(|first| {
                matches!(first.event(), Ok(SnapshotEvent::Tick(TickCause::Initial)))
            });
        if complete { Self::Empty } else { Self::FirstSnapshot }
    }
}

/// Rules replay applies besides sensor events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayPolicy {
    pub consistency: ConsistencyPolicy,
    pub anomaly: AnomalySettings,
    pub start: ReplayStart,
}

#[derive(Debug, Clone)]
pub struct OccupancyResolver {
    graph: AdjacencyGraph,
}

impl OccupancyResolver {
    pub fn new(graph: AdjacencyGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &AdjacencyGraph {
        &self.graph
    }

    // ── Event processing ────────────────────────────────────────────

    /// Process one event, then run the consistency pass if the policy asks
    /// for it. Live processing and replay both go through here.
    pub fn handle_event(
        &mut self,
        event: &SensorEvent,
        store: &mut OccupancyStore,
        policy: ConsistencyPolicy,
        detector: Option<&mut AnomalyDetector>,
    ) -> EventEffect {
        let mut effect = self.process_event(event, store, detector);
        if policy == ConsistencyPolicy::AfterEveryEvent {
            effect.refilled = self.resolve_consistency(store, event.at, effect.moved_into.as_ref());
        }
        effect
    }

    /// Apply one sensor event to occupancy.
    pub fn process_event(
        &mut self,
        event: &SensorEvent,
        store: &mut OccupancyStore,
        detector: Option<&mut AnomalyDetector>,
    ) -> EventEffect {
        let Some(sensor) = store.sensors.get_mut(event.sensor.as_str()) else {
            debug!(sensor = %event.sensor, "sensor not tracked; skipping");
            return EventEffect::default();
        };
        if sensor.current_state != event.state {
            sensor.update_state(event.state, event.at);
        }
        let kind = sensor.kind;
        let bound = sensor.bound_areas.clone();

        match kind {
            SensorKind::Motion | SensorKind::CameraMotion | SensorKind::CameraPerson => {
                if event.state {
                    return self.handle_motion_on(&event.sensor, &bound, event.at, store, detector);
                }
                Self::handle_motion_off(&bound, event.at, store);
            }
            SensorKind::Magnetic => Self::handle_magnetic(&event.sensor, &bound, event, store),
            SensorKind::Unsupported => {
                debug!(sensor = %event.sensor, "ignoring unsupported sensor type");
            }
        }
        EventEffect::default()
    }

    fn handle_motion_on(
        &mut self,
        sensor: &SensorId,
        bound: &[AreaId],
        at: Timestamp,
        store: &mut OccupancyStore,
        mut detector: Option<&mut AnomalyDetector>,
    ) -> EventEffect {
        let mut effect = EventEffect::default();
        if bound.is_empty() {
            warn!(%sensor, "sensor is not linked to any areas");
            return effect;
        }

        for target in bound {
            let Some(area) = store.areas.get_mut(target.as_str()) else {
                warn!(%sensor, area = %target, "sensor references unknown area");
                continue;
            };
            area.record_motion(at);
            effect.motion_areas.push(target.clone());

            match self.evaluate_transition(target, store, at) {
                TransitionOutcome::AlreadyPresent => {
                    debug!(area = %target, %sensor, "keep-alive");
                }
                TransitionOutcome::MovedFromNeighbor(source) => {
                    debug!(from = %source, to = %target, %sensor, "movement detected");
                    transfer(store, &source, target, at);
                    effect.moved_into = Some(target.clone());
                }
                TransitionOutcome::EnteredFromOutside => {
                    debug!(area = %target, %sensor, "entry from outside");
                    enter(store, target, at);
                }
                TransitionOutcome::Invalid => {
                    debug!(area = %target, %sensor, "unexpected motion, counting anyway");
                    enter(store, target, at);
                    self.report_unexpected(target, sensor, at, store, detector.as_deref_mut());
                }
            }
        }
        effect
    }

    fn handle_motion_off(bound: &[AreaId], at: Timestamp, store: &mut OccupancyStore) {
        for id in bound {
            if let Some(area) = store.areas.get_mut(id.as_str()) {
                area.record_deactivation(at);
            }
        }
    }

    /// Opening a door refreshes motion on both sides; occupancy is untouched.
    fn handle_magnetic(
        sensor: &SensorId,
        bound: &[AreaId],
        event: &SensorEvent,
        store: &mut OccupancyStore,
    ) {
        if bound.len() != 2 {
            warn!(%sensor, areas = bound.len(), "magnetic sensor needs exactly two between_areas");
            return;
        }
        if !event.state {
            return;
        }
        for id in bound {
            if let Some(area) = store.areas.get_mut(id.as_str()) {
                area.record_motion(event.at);
            }
        }
    }

    fn report_unexpected(
        &self,
        area: &AreaId,
        sensor: &SensorId,
        at: Timestamp,
        store: &OccupancyStore,
        detector: Option<&mut AnomalyDetector>,
    ) {
        let recently_active: Vec<&str> = self
            .graph
            .neighbors(area.as_str())
            .filter(|id| {
                store
                    .area(id.as_str())
                    .and_then(|n| n.last_motion)
                    .is_some_and(|t| at - t < ADJACENT_ACTIVITY_WINDOW)
            })
            .map(AreaId::as_str)
            .collect();
        let context = if recently_active.is_empty() {
            "no adjacent activity".to_owned()
        } else {
            format!("recently active: {}", recently_active.join(", "))
        };
        debug!(%area, %sensor, %context, "unexpected activation");
        if let Some(detector) = detector {
            detector.record_unexpected_activation(area, sensor, at, &context);
        }
    }

    // ── Transition evaluation ───────────────────────────────────────

    pub fn evaluate_transition(
        &self,
        target: &AreaId,
        store: &OccupancyStore,
        now: Timestamp,
    ) -> TransitionOutcome {
        let Some(area) = store.area(target.as_str()) else {
            return TransitionOutcome::Invalid;
        };
        if let Some(source) = self.find_source_areas(target, store, now).into_iter().next() {
            return TransitionOutcome::MovedFromNeighbor(source);
        }
        if area.is_occupied() {
            TransitionOutcome::AlreadyPresent
        } else if area.exit_capable {
            TransitionOutcome::EnteredFromOutside
        } else {
            TransitionOutcome::Invalid
        }
    }

    /// Occupied neighbours that could have supplied a person to `target`,
    /// best first.
    ///
    /// Neighbours with motion or a deactivation inside the activity window
    /// rank first, newest motion first; other occupied neighbours follow in
    /// the same order. When `target` is exit-capable, a neighbour whose
    /// motion sensor is still on is skipped unless its motion began within
    /// the pass-through window: that person is more likely still standing
    /// there than walking out.
    pub fn find_source_areas(
        &self,
        target: &AreaId,
        store: &OccupancyStore,
        now: Timestamp,
    ) -> Vec<AreaId> {
        let target_is_exit = store.area(target.as_str()).is_some_and(|a| a.exit_capable);
        let mut recent: Vec<(&AreaId, Option<Timestamp>)> = Vec::new();
        let mut fallback: Vec<(&AreaId, Option<Timestamp>)> = Vec::new();

        for id in self.graph.neighbors(target.as_str()) {
            let Some(neighbour) = store.area(id.as_str()) else {
                continue;
            };
            if !neighbour.is_occupied() {
                continue;
            }
            if target_is_exit && store.is_area_active(id.as_str()) {
                let since = neighbour.last_motion.map_or(f64::INFINITY, |t| now - t);
                if since > PASS_THROUGH_WINDOW {
                    debug!(neighbour = %id, since, "active beyond pass-through; preferring new entry");
                    continue;
                }
            }
            let entry = (id, neighbour.last_motion);
            if neighbour.has_recent_motion(now, ADJACENT_ACTIVITY_WINDOW)
                || neighbour.deactivated_recently(now, ADJACENT_ACTIVITY_WINDOW)
            {
                recent.push(entry);
            } else {
                fallback.push(entry);
            }
        }

        let newest_first = |a: &(&AreaId, Option<Timestamp>), b: &(&AreaId, Option<Timestamp>)| {
            b.1.unwrap_or(0.0).total_cmp(&a.1.unwrap_or(0.0))
        };
        recent.sort_by(newest_first);
        fallback.sort_by(newest_first);

        let sources: Vec<AreaId> = recent
            .into_iter()
            .chain(fallback)
            .map(|(id, _)| id.clone())
            .collect();
        debug!(%target, ?sources, "source candidates");
        sources
    }

    // ── Consistency ─────────────────────────────────────────────────

    /// Refill areas whose motion sensor is on but whose occupancy is zero.
    ///
    /// A source is never the target of the move that just happened, nor a
    /// neighbour the empty area itself exited toward inside the activity
    /// window. Without a source, an exit-capable area admits from outside
    /// unless it recently exited toward any neighbour. Returns whether
    /// occupancy changed.
    pub fn resolve_consistency(
        &self,
        store: &mut OccupancyStore,
        now: Timestamp,
        recent_move_target: Option<&AreaId>,
    ) -> bool {
        let mut changed = false;
        let ids: Vec<AreaId> = store.areas.keys().cloned().collect();

        for id in &ids {
            let empty = store.area(id.as_str()).is_some_and(|a| !a.is_occupied());
            if !empty || !store.is_area_active(id.as_str()) {
                continue;
            }
            debug!(area = %id, "active but empty; attempting refill");

            let source = self
                .find_source_areas(id, store, now)
                .into_iter()
                .find(|source| {
                    if recent_move_target == Some(source) {
                        debug!(area = %id, %source, "skipping refill from recent move target");
                        return false;
                    }
                    let bounced = store
                        .area(id.as_str())
                        .is_some_and(|a| a.exited_toward_recently(source, now, ADJACENT_ACTIVITY_WINDOW));
                    if bounced {
                        debug!(area = %id, %source, "skipping refill from recent exit target");
                    }
                    !bounced
                });

            if let Some(source) = source {
                debug!(from = %source, to = %id, "refill (consistency)");
                transfer(store, &source, id, now);
                changed = true;
                continue;
            }

            let Some(area) = store.areas.get_mut(id.as_str()) else {
                continue;
            };
            if !area.exit_capable {
                debug!(area = %id, "no valid source to refill from");
            } else if area.exited_anywhere_recently(now, ADJACENT_ACTIVITY_WINDOW) {
                debug!(area = %id, "skipping outside refill; recently exited to a neighbour");
            } else {
                debug!(area = %id, "refill from outside (consistency)");
                area.record_entry(now);
                changed = true;
            }
        }
        changed
    }

    // ── Replay ──────────────────────────────────────────────────────

    /// Apply one recorded snapshot. Warnings are never raised on replay.
    pub fn apply_snapshot(
        &mut self,
        snapshot: &Snapshot,
        store: &mut OccupancyStore,
        policy: &ReplayPolicy,
    ) {
        match snapshot.event() {
            Ok(SnapshotEvent::Sensor(event)) => {
                self.handle_event(&event, store, policy.consistency, None);
            }
            Ok(SnapshotEvent::Tick(TickCause::TimeoutSweep)) => {
                expire_stale_occupancy(&mut store.areas, snapshot.timestamp, &policy.anomaly);
            }
            Ok(SnapshotEvent::Tick(TickCause::Consistency)) => {
                self.resolve_consistency(store, snapshot.timestamp, None);
            }
            Ok(SnapshotEvent::Tick(TickCause::Initial | TickCause::Periodic)) => {}
            Err(err) => warn!(%err, "skipping unreadable snapshot"),
        }
    }

    /// Reset all area and sensor state, then replay `snapshots`
    /// in timestamp order.
    pub fn recalculate_from_history(
        &mut self,
        snapshots: &[Snapshot],
        store: &mut OccupancyStore,
        policy: &ReplayPolicy,
    ) {
        let ordered = chronological(snapshots);
        let mut session = ReplaySession::begin(self, store, policy, ordered.first());
        for (index, snapshot) in ordered.iter().enumerate() {
            session.advance(index, snapshot);
        }
        debug!(snapshots = ordered.len(), "recalculated occupancy from history");
    }
}

/// Snapshots sorted by timestamp, ties kept in recorded order.
pub fn chronological(snapshots: &[Snapshot]) -> Vec<Snapshot> {
    let mut ordered = snapshots.to_vec();
    ordered.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    ordered
}

fn transfer(store: &mut OccupancyStore, from: &AreaId, to: &AreaId, at: Timestamp) {
    if let Some(source) = store.areas.get_mut(from.as_str()) {
        source.record_exit(at, Some(to));
    }
    enter(store, to, at);
}

fn enter(store: &mut OccupancyStore, area: &AreaId, at: Timestamp) {
    if let Some(area) = store.areas.get_mut(area.as_str()) {
        area.record_entry(at);
    }
}

// ── Replay session ──────────────────────────────────────────────────

/// An in-progress replay over a reset store.
///
/// With [`ReplayStart::FirstSnapshot`] the store is seeded from the first
/// snapshot, which is then treated as already applied.
pub struct ReplaySession<'a> {
    resolver: &'a mut OccupancyResolver,
    store: &'a mut OccupancyStore,
    policy: &'a ReplayPolicy,
    seeded: bool,
}

impl<'a> ReplaySession<'a> {
    pub fn begin(
        resolver: &'a mut OccupancyResolver,
        store: &'a mut OccupancyStore,
        policy: &'a ReplayPolicy,
        first: Option<&Snapshot>,
    ) -> Self {
        store.reset();
        let seeded = match (policy.start, first) {
            (ReplayStart::FirstSnapshot, Some(first)) => {
                store.seed_from(first);
                true
            }
            _ => false,
        };
        Self {
            resolver,
            store,
            policy,
            seeded,
        }
    }

    pub fn store(&self) -> &OccupancyStore {
        &*self.store
    }
}

impl ReplayCursor for ReplaySession<'_> {
    fn advance(&mut self, index: usize, snapshot: &Snapshot) -> &OccupancyStore {
        if !(self.seeded && index == 0) {
            self.resolver.apply_snapshot(snapshot, self.store, self.policy);
        }
        &*self.store
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{AreaConfig, SensorConfig, TrackerConfig};
    use pretty_assertions::assert_eq;

    /// yard (exit) - hall - kitchen, plus an isolated study.
    fn setup() -> (OccupancyResolver, OccupancyStore) {
        let config = TrackerConfig::default()
            .area("yard", AreaConfig::exit())
            .area("hall", AreaConfig::default())
            .area("kitchen", AreaConfig::default())
            .area("study", AreaConfig::default())
            .link("yard", "hall")
            .link("hall", "kitchen")
            .sensor("m_yard", SensorConfig::motion("yard"))
            .sensor("m_hall", SensorConfig::motion("hall"))
            .sensor("m_kitchen", SensorConfig::motion("kitchen"))
            .sensor("m_study", SensorConfig::motion("study"))
            .sensor("door", SensorConfig::magnetic("yard", "hall"))
            .sensor("bad_door", SensorConfig::of_kind(SensorKind::Magnetic, "hall"));
        (
            OccupancyResolver::new(AdjacencyGraph::from_directed(&config.adjacency)),
            OccupancyStore::from_config(&config),
        )
    }

    fn event(sensor: &str, state: bool, at: Timestamp) -> SensorEvent {
        SensorEvent {
            sensor: SensorId::from(sensor),
            state,
            at,
        }
    }

    fn fire(
        resolver: &mut OccupancyResolver,
        store: &mut OccupancyStore,
        sensor: &str,
        state: bool,
        at: Timestamp,
    ) -> EventEffect {
        resolver.process_event(&event(sensor, state, at), store, None)
    }

    #[test]
    fn exit_area_admits_from_outside() {
        let (mut resolver, mut store) = setup();
        fire(&mut resolver, &mut store, "m_yard", true, 0.0);
        assert_eq!(store.occupancy("yard"), 1);
        assert!(store.sensor("m_yard").unwrap().current_state);
    }

    #[test]
    fn unknown_bound_area_is_skipped_and_known_one_still_counts() {
        let config = TrackerConfig::default()
            .area("yard", AreaConfig::exit())
            .sensor(
                "m_drive",
                SensorConfig {
                    area: Some(crate::config::AreaBinding::Many(vec![
                        AreaId::from("garage"),
                        AreaId::from("yard"),
                    ])),
                    ..SensorConfig::motion("yard")
                },
            );
        let mut resolver = OccupancyResolver::new(AdjacencyGraph::from_directed(&config.adjacency));
        let mut store = OccupancyStore::from_config(&config);

        let effect = fire(&mut resolver, &mut store, "m_drive", true, 1.0);
        assert_eq!(effect.motion_areas, vec![AreaId::from("yard")]);
        assert_eq!(store.occupancy("yard"), 1);
        assert_eq!(store.occupancy("garage"), 0);

        fire(&mut resolver, &mut store, "m_drive", false, 4.0);
        assert!(store.area("yard").unwrap().deactivated_recently(5.0, ADJACENT_ACTIVITY_WINDOW));
    }

    #[test]
    fn deactivations_are_kept_on_the_store() {
        let (mut resolver, mut store) = setup();
        fire(&mut resolver, &mut store, "m_yard", true, 0.0);
        fire(&mut resolver, &mut store, "m_yard", false, 200.0);

        let yard = store.area("yard").unwrap();
        assert!(!yard.has_recent_motion(250.0, ADJACENT_ACTIVITY_WINDOW));
        assert!(yard.deactivated_recently(250.0, ADJACENT_ACTIVITY_WINDOW));
        assert!(!store.area("hall").unwrap().deactivated_recently(250.0, ADJACENT_ACTIVITY_WINDOW));
    }

    #[test]
    fn motion_moves_person_from_recent_neighbour() {
        let (mut resolver, mut store) = setup();
        fire(&mut resolver, &mut store, "m_yard", true, 0.0);
        let effect = fire(&mut resolver, &mut store, "m_hall", true, 2.0);

        assert_eq!(effect.moved_into, Some(AreaId::from("hall")));
        assert_eq!(store.occupancy("yard"), 0);
        assert_eq!(store.occupancy("hall"), 1);
        assert!(store.area("yard").unwrap().last_exit_to.contains_key("hall"));
    }

    #[test]
    fn interior_motion_without_source_is_invalid_but_counted() {
        let (mut resolver, mut store) = setup();
        let graph = resolver.graph().clone();
        let mut detector = AnomalyDetector::new(graph, AnomalySettings::default());

        resolver.process_event(&event("m_study", true, 5.0), &mut store, Some(&mut detector));

        assert_eq!(store.occupancy("study"), 1);
        let warnings = detector.warnings(true);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "Unexpected motion in study (no adjacent activity)");
    }

    #[test]
    fn occupied_area_without_neighbour_source_is_keep_alive() {
        let (mut resolver, mut store) = setup();
        fire(&mut resolver, &mut store, "m_yard", true, 0.0);
        fire(&mut resolver, &mut store, "m_yard", false, 1.0);
        assert_eq!(
            resolver.evaluate_transition(&AreaId::from("yard"), &store, 30.0),
            TransitionOutcome::AlreadyPresent
        );
    }

    #[test]
    fn stale_occupied_neighbour_is_a_fallback_source() {
        let (mut resolver, mut store) = setup();
        fire(&mut resolver, &mut store, "m_yard", true, 0.0);
        fire(&mut resolver, &mut store, "m_hall", true, 2.0);
        fire(&mut resolver, &mut store, "m_hall", false, 3.0);

        // Long after any evidence window, the hall occupant is still the only candidate.
        let outcome = resolver.evaluate_transition(&AreaId::from("kitchen"), &store, 5000.0);
        assert_eq!(outcome, TransitionOutcome::MovedFromNeighbor(AreaId::from("hall")));
    }

    #[test]
    fn active_neighbour_is_not_a_source_for_exit_area() {
        let (mut resolver, mut store) = setup();
        fire(&mut resolver, &mut store, "m_yard", true, 0.0);
        fire(&mut resolver, &mut store, "m_hall", true, 2.0);
        fire(&mut resolver, &mut store, "m_yard", false, 3.0);

        // Hall sensor still on and its motion began 8s ago: a second person outside.
        let sources = resolver.find_source_areas(&AreaId::from("yard"), &store, 10.0);
        assert!(sources.is_empty());

        // Within the pass-through window the hall occupant may be walking out.
        let sources = resolver.find_source_areas(&AreaId::from("yard"), &store, 3.0);
        assert_eq!(sources, vec![AreaId::from("hall")]);
    }

    #[test]
    fn magnetic_refreshes_motion_on_both_sides_only() {
        let (mut resolver, mut store) = setup();
        fire(&mut resolver, &mut store, "door", true, 7.0);
        assert_eq!(store.area("yard").unwrap().last_motion, Some(7.0));
        assert_eq!(store.area("hall").unwrap().last_motion, Some(7.0));
        assert_eq!(store.total_occupancy(), 0);
    }

    #[test]
    fn malformed_magnetic_sensor_is_dropped() {
        let (mut resolver, mut store) = setup();
        fire(&mut resolver, &mut store, "bad_door", true, 7.0);
        assert!(store.area("hall").unwrap().last_motion.is_none());
    }

    #[test]
    fn deactivation_counts_as_recent_evidence() {
        let (mut resolver, mut store) = setup();
        fire(&mut resolver, &mut store, "m_yard", true, 0.0);
        fire(&mut resolver, &mut store, "m_hall", true, 2.0);
        fire(&mut resolver, &mut store, "m_hall", false, 200.0);

        // Hall motion is old, but its sensor just went quiet.
        assert!(store.area("hall").unwrap().deactivated_recently(250.0, ADJACENT_ACTIVITY_WINDOW));
        assert!(!store.area("hall").unwrap().has_recent_motion(250.0, ADJACENT_ACTIVITY_WINDOW));
    }

    #[test]
    fn consistency_refills_active_empty_area_but_not_from_recent_target() {
        let (mut resolver, mut store) = setup();
        fire(&mut resolver, &mut store, "m_yard", true, 0.0);
        fire(&mut resolver, &mut store, "m_hall", true, 2.0);
        // Yard sensor is still on, yard is now empty.
        assert!(!resolver.resolve_consistency(&mut store, 2.0, Some(&AreaId::from("hall"))));
        assert_eq!(store.occupancy("yard"), 0);
    }

    #[test]
    fn consistency_waits_out_the_bounce_window() {
        let (mut resolver, mut store) = setup();
        fire(&mut resolver, &mut store, "m_yard", true, 0.0);
        fire(&mut resolver, &mut store, "m_hall", true, 2.0);
        fire(&mut resolver, &mut store, "m_hall", false, 3.0);

        // Yard exited toward the hall at t=2: no bounce back inside the window,
        // and no outside entry either.
        assert!(!resolver.resolve_consistency(&mut store, 100.0, None));
        assert_eq!(store.occupancy("yard"), 0);

        // Later the latched yard sensor pulls the stale hall occupant back.
        assert!(resolver.resolve_consistency(&mut store, 500.0, None));
        assert_eq!(store.occupancy("hall"), 0);
        assert_eq!(store.occupancy("yard"), 1);
    }

    #[test]
    fn unknown_sensor_is_ignored() {
        let (mut resolver, mut store) = setup();
        let effect = fire(&mut resolver, &mut store, "ghost", true, 1.0);
        assert_eq!(effect, EventEffect::default());
        assert_eq!(store.total_occupancy(), 0);
    }
}
