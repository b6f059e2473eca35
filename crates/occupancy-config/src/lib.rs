//! On-disk configuration for the occupancy tracker.
//!
//! TOML discovery and layered loading (defaults, then the file, then
//! `OCCUPANCY_*` environment overrides), human-readable durations, and
//! translation to `occupancy_core::TrackerConfig`. The core never reads
//! files; everything disk-shaped lives here.

use std::borrow::Borrow;
use std::fmt;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use occupancy_core::{
    AdjacencyGraph, AnomalySettings, AreaConfig, AreaId, ConsistencyPolicy, EngineSettings,
    SensorConfig, SensorId, SensorKind, TrackerConfig,
};

/// Environment variable that points at an explicit config file.
pub const CONFIG_ENV: &str = "OCCUPANCY_CONFIG";
const ENV_PREFIX: &str = "OCCUPANCY_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Durations ───────────────────────────────────────────────────────

/// A duration written as `"5m"` / `"1500ms"`, or as plain seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationSetting {
    Seconds(f64),
    Text(String),
}

impl DurationSetting {
    fn text(value: &str) -> Self {
        Self::Text(value.to_owned())
    }

    /// Seconds, or a validation error naming `field`.
    pub fn seconds(&self, field: &str) -> Result<f64, ConfigError> {
        let invalid = |reason: String| ConfigError::Validation {
            field: field.to_owned(),
            reason,
        };
        match self {
            Self::Seconds(secs) if secs.is_finite() && *secs >= 0.0 => Ok(*secs),
            Self::Seconds(secs) => Err(invalid(format!("expected a non-negative duration, got {secs}"))),
            Self::Text(text) => humantime::parse_duration(text.trim())
                .map(|d| d.as_secs_f64())
                .map_err(|e| invalid(format!("'{text}': {e}"))),
        }
    }
}

impl fmt::Display for DurationSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds(secs) => write!(f, "{secs}s"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// `[engine]`: history, replay, and verification.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineSection {
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: usize,

    /// Minimum gap between keep-alive tick snapshots.
    #[serde(default = "default_tick_interval")]
    pub tick_interval: DurationSetting,

    /// `after_every_event` or `on_demand`.
    #[serde(default)]
    pub consistency: ConsistencyPolicy,

    /// Timestamp slack (seconds) when verifying history.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_snapshots: default_max_snapshots(),
            tick_interval: default_tick_interval(),
            consistency: ConsistencyPolicy::default(),
            tolerance: default_tolerance(),
        }
    }
}

fn default_max_snapshots() -> usize {
    500
}
fn default_tick_interval() -> DurationSetting {
    DurationSetting::text("5m")
}
fn default_tolerance() -> f64 {
    0.001
}

/// `[anomaly]`: warning and timeout thresholds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnomalySection {
    pub stuck_after: DurationSetting,
    pub exit_clear_after: DurationSetting,
    pub inactivity_reset_after: DurationSetting,
    pub extended_occupancy_after: DurationSetting,
    pub simultaneous_window: DurationSetting,
    pub max_hops: usize,
}

impl Default for AnomalySection {
    fn default() -> Self {
        Self {
            stuck_after: DurationSetting::text("24h"),
            exit_clear_after: DurationSetting::text("5m"),
            inactivity_reset_after: DurationSetting::text("24h"),
            extended_occupancy_after: DurationSetting::text("12h"),
            simultaneous_window: DurationSetting::text("10s"),
            max_hops: 2,
        }
    }
}

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub anomaly: AnomalySection,

    #[serde(default)]
    pub areas: IndexMap<AreaId, AreaConfig>,

    /// Directed lists; links are made symmetric when loaded.
    #[serde(default)]
    pub adjacency: IndexMap<AreaId, Vec<AreaId>>,

    #[serde(default)]
    pub sensors: IndexMap<SensorId, SensorConfig>,
}

impl ConfigFile {
    /// Resolve durations and build the core configuration.
    pub fn to_tracker_config(&self) -> Result<TrackerConfig, ConfigError> {
        if self.areas.is_empty() {
            return Err(ConfigError::Validation {
                field: "areas".into(),
                reason: "at least one area is required".into(),
            });
        }
        let settings = EngineSettings {
            max_snapshots: self.engine.max_snapshots,
            tick_interval: self.engine.tick_interval.seconds("engine.tick_interval")?,
            consistency: self.engine.consistency,
            tolerance: self.engine.tolerance,
        };
        let a = &self.anomaly;
        let anomaly = AnomalySettings {
            stuck_after: a.stuck_after.seconds("anomaly.stuck_after")?,
            exit_clear_after: a.exit_clear_after.seconds("anomaly.exit_clear_after")?,
            inactivity_reset_after: a
                .inactivity_reset_after
                .seconds("anomaly.inactivity_reset_after")?,
            extended_occupancy_after: a
                .extended_occupancy_after
                .seconds("anomaly.extended_occupancy_after")?,
            simultaneous_window: a.simultaneous_window.seconds("anomaly.simultaneous_window")?,
            max_hops: a.max_hops,
        };
        let config = TrackerConfig {
            areas: self.areas.clone(),
            adjacency: self.adjacency.clone(),
            sensors: self.sensors.clone(),
            settings,
            anomaly,
        };
        config.validate().map_err(|e| ConfigError::Validation {
            field: "engine".into(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    /// Pretty TOML, as `config show` prints it.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "occupancy", "occupancy").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("occupancy");
    p
}

/// An explicit path wins; otherwise the platform default.
pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(config_path, Path::to_path_buf)
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the file at `path`, layered over defaults and under env overrides.
///
/// Area and sensor order follows the file, which is the order the
/// engine walks them in.
pub fn load_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let figment = Figment::new()
        .merge(Serialized::defaults(ConfigFile::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let mut config: ConfigFile = figment.extract()?;
    let text = std::fs::read_to_string(path)?;
    preserve_file_order(&mut config, &text);
    Ok(config)
}

/// Load and translate in one step.
pub fn load_tracker_config(path: &Path) -> Result<TrackerConfig, ConfigError> {
    load_file(path)?.to_tracker_config()
}

/// Key order as written in the file.
#[derive(Deserialize)]
struct FileOrder {
    #[serde(default)]
    areas: IndexMap<String, toml::Value>,
    #[serde(default)]
    sensors: IndexMap<String, toml::Value>,
}

// Layered extraction sorts keys; restore document order where we can.
fn preserve_file_order(config: &mut ConfigFile, text: &str) {
    let Ok(order) = toml::from_str::<FileOrder>(text) else {
        return;
    };
    reorder(&mut config.areas, &order.areas);
    reorder(&mut config.sensors, &order.sensors);
}

fn reorder<K, V>(map: &mut IndexMap<K, V>, order: &IndexMap<String, toml::Value>)
where
    K: Borrow<str> + std::hash::Hash + Eq,
{
    let rank = |key: &K| {
        let key: &str = key.borrow();
        order.get_index_of(key).unwrap_or(usize::MAX)
    };
    map.sort_by(|a, _, b, _| rank(a).cmp(&rank(b)));
}

// ── Lint ────────────────────────────────────────────────────────────

/// A non-fatal configuration finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigIssue {
    /// Dotted location, e.g. `sensors.motion_hall`.
    pub subject: String,
    pub message: String,
}

impl ConfigIssue {
    fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

/// Problems the engine tolerates at runtime but that are almost
/// certainly mistakes.
pub fn lint(config: &TrackerConfig) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();
    let known = |id: &AreaId| config.areas.contains_key(id);

    for (area, neighbours) in &config.adjacency {
        let subject = format!("adjacency.{area}");
        if !known(area) {
            issues.push(ConfigIssue::new(&subject, "unknown area"));
        }
        for n in neighbours.iter().filter(|n| !known(n)) {
            issues.push(ConfigIssue::new(&subject, format!("unknown neighbour '{n}'")));
        }
    }

    for (id, sensor) in &config.sensors {
        let subject = format!("sensors.{id}");
        let bound = sensor.bound_areas();
        for area in bound.iter().filter(|a| !known(a)) {
            issues.push(ConfigIssue::new(&subject, format!("bound to unknown area '{area}'")));
        }
        match sensor.kind {
            SensorKind::Magnetic if bound.len() != 2 => issues.push(ConfigIssue::new(
                &subject,
                format!("magnetic sensor needs exactly two between_areas, has {}", bound.len()),
            )),
            SensorKind::Unsupported => issues.push(ConfigIssue::new(
                &subject,
                "unsupported sensor type; its events will be ignored",
            )),
            kind if kind.is_motion_family() && bound.is_empty() => {
                issues.push(ConfigIssue::new(&subject, "not linked to any area"));
            }
            _ => {}
        }
    }

    let graph = AdjacencyGraph::from_directed(&config.adjacency);
    for (id, area) in &config.areas {
        if !area.exit_capable && graph.neighbors(id.as_str()).next().is_none() {
            issues.push(ConfigIssue::new(
                format!("areas.{id}"),
                "no neighbours and not exit-capable; every entry will be unexpected",
            ));
        }
    }
    issues
}

// ── Sample config ───────────────────────────────────────────────────

pub const SAMPLE_CONFIG: &str = r#"# Occupancy tracker configuration.
#
# Durations accept humantime strings ("90s", "5m", "24h") or plain seconds.
# Any value can be overridden from the environment, for example
# OCCUPANCY_ENGINE__MAX_SNAPSHOTS=1000 or OCCUPANCY_ANOMALY__EXIT_CLEAR_AFTER=10m.

[engine]
max_snapshots = 500
tick_interval = "5m"
# "after_every_event" or "on_demand"
consistency = "after_every_event"
tolerance = 0.001

[anomaly]
stuck_after = "24h"
exit_clear_after = "5m"
inactivity_reset_after = "24h"
extended_occupancy_after = "12h"
simultaneous_window = "10s"
max_hops = 2

[areas.frontyard]
name = "Front Yard"
indoors = false
exit_capable = true

[areas.entrance]
name = "Entrance"

[areas.hall]
name = "Hall"

[areas.living]
name = "Living Room"

# Links are symmetric: listing a pair once is enough.
[adjacency]
frontyard = ["entrance"]
entrance = ["hall", "living"]

[sensors."binary_sensor.person_front_camera"]
type = "camera_person"
area = "frontyard"

[sensors."binary_sensor.motion_entrance"]
type = "motion"
area = "entrance"

[sensors."binary_sensor.motion_hall"]
type = "motion"
area = "hall"

[sensors."binary_sensor.motion_living"]
type = "motion"
area = "living"

[sensors."binary_sensor.front_door"]
type = "magnetic"
between_areas = ["entrance", "frontyard"]
"#;

/// Write [`SAMPLE_CONFIG`] to `path`, creating parent directories.
pub fn write_sample_config(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::Validation {
            field: "path".into(),
            reason: format!("{} already exists (use --force to overwrite)", path.display()),
        });
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, SAMPLE_CONFIG)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn sample_config_loads_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        write_sample_config(&path, false).unwrap();

        let config = load_tracker_config(&path).unwrap();
        assert_eq!(config.areas.len(), 4);
        assert!((config.anomaly.exit_clear_after - 300.0).abs() < f64::EPSILON);
        assert!((config.settings.tick_interval - 300.0).abs() < f64::EPSILON);
        assert_eq!(lint(&config), Vec::new());
    }

    #[test]
    fn init_refuses_to_clobber_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "# mine\n");
        assert!(matches!(
            write_sample_config(&path, false),
            Err(ConfigError::Validation { .. })
        ));
        write_sample_config(&path, true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("[engine]"));
    }

    #[test]
    fn file_order_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
[areas.zulu]
[areas.alpha]
[areas.mike]

[sensors.s2]
area = "zulu"
[sensors.s1]
area = ["alpha", "mike"]
"#,
        );
        let config = load_file(&path).unwrap();
        let areas: Vec<_> = config.areas.keys().map(AreaId::as_str).collect();
        assert_eq!(areas, vec!["zulu", "alpha", "mike"]);
        let sensors: Vec<_> = config.sensors.keys().map(SensorId::as_str).collect();
        assert_eq!(sensors, vec!["s2", "s1"]);
        assert_eq!(
            config.sensors["s1"].bound_areas(),
            vec![AreaId::from("alpha"), AreaId::from("mike")]
        );
    }

    #[test]
    fn durations_accept_text_and_seconds() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
[anomaly]
exit_clear_after = 90
simultaneous_window = "1500ms"

[areas.yard]
exit_capable = true
"#,
        );
        let config = load_tracker_config(&path).unwrap();
        assert!((config.anomaly.exit_clear_after - 90.0).abs() < f64::EPSILON);
        assert!((config.anomaly.simultaneous_window - 1.5).abs() < f64::EPSILON);
        assert!((config.anomaly.stuck_after - 86_400.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bad_duration_names_the_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[engine]\ntick_interval = \"soon\"\n[areas.a]\n");
        let err = load_tracker_config(&path).unwrap_err();
        assert!(err.to_string().starts_with("invalid engine.tick_interval"));
    }

    #[test]
    fn unknown_policy_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[engine]\nconsistency = \"sometimes\"\n[areas.a]\n");
        assert!(matches!(load_file(&path), Err(ConfigError::Figment(_))));
    }

    #[test]
    fn empty_and_missing_configs_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_file(&dir.path().join("absent.toml")),
            Err(ConfigError::NotFound { .. })
        ));
        let path = write(&dir, "[engine]\nmax_snapshots = 10\n");
        assert!(matches!(
            load_tracker_config(&path),
            Err(ConfigError::Validation { field, .. }) if field == "areas"
        ));
    }

    #[test]
    fn zero_capacity_fails_core_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[engine]\nmax_snapshots = 0\n[areas.a]\n");
        assert!(matches!(
            load_tracker_config(&path),
            Err(ConfigError::Validation { field, .. }) if field == "engine"
        ));
    }

    #[test]
    fn lint_reports_wiring_mistakes() {
        let config = TrackerConfig::default()
            .area("hall", AreaConfig::default())
            .area("den", AreaConfig::default())
            .area("yard", AreaConfig::exit())
            .link("hall", "yard")
            .link("hall", "attic")
            .sensor("m_hall", SensorConfig::motion("hall"))
            .sensor("m_garage", SensorConfig::motion("garage"))
            .sensor("door", SensorConfig::of_kind(SensorKind::Magnetic, "hall"))
            .sensor(
                "bell",
                SensorConfig {
                    kind: SensorKind::Unsupported,
                    area: None,
                    between_areas: None,
                },
            );
        let issues: Vec<String> = lint(&config).iter().map(ToString::to_string).collect();
        assert_eq!(
            issues,
            vec![
                "adjacency.hall: unknown neighbour 'attic'",
                "sensors.m_garage: bound to unknown area 'garage'",
                "sensors.door: magnetic sensor needs exactly two between_areas, has 1",
                "sensors.bell: unsupported sensor type; its events will be ignored",
                "areas.den: no neighbours and not exit-capable; every entry will be unexpected",
            ]
        );
    }

    #[test]
    fn rendered_toml_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        write_sample_config(&path, false).unwrap();
        let loaded = load_file(&path).unwrap();

        let rendered = loaded.to_toml().unwrap();
        let again = write(&dir, &rendered);
        assert_eq!(load_file(&again).unwrap(), loaded);
    }
}
