//! Sensor traces: recorded input for `replay`, `warnings`, `history`, and
//! `sensors`, plus the state values shared with `live`.
//!
//! A trace is a list of entries, each one of
//!
//! ```text
//! {"at": 1000.0, "sensor": "binary_sensor.hall", "state": "on"}
//! {"at": 1300.0, "sweep": true}
//! {"at": 1310.0, "consistency": true}
//! ```
//!
//! written as a JSON array, JSON lines, or a YAML list.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use occupancy_core::{Engine, Timestamp};

use crate::error::CliError;

// ── State values ─────────────────────────────────────────────────────

/// A sensor state as hosts report it: a bool or a state string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Text(String),
}

impl StateValue {
    /// `Some(on)` for usable states, `None` for `unavailable` / `unknown`.
    pub fn to_state(&self) -> Result<Option<bool>, String> {
        match self {
            Self::Bool(b) => Ok(Some(*b)),
            Self::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "on" | "true" | "1" | "open" | "detected" => Ok(Some(true)),
                "off" | "false" | "0" | "closed" | "clear" => Ok(Some(false)),
                "unavailable" | "unknown" => Ok(None),
                other => Err(format!("unrecognised sensor state {other:?}")),
            },
        }
    }
}

// ── Entries ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TraceEntry {
    Sensor {
        at: Timestamp,
        sensor: String,
        state: StateValue,
    },
    Sweep {
        at: Timestamp,
        sweep: bool,
    },
    Consistency {
        at: Timestamp,
        consistency: bool,
    },
}

impl TraceEntry {
    pub fn at(&self) -> Timestamp {
        match self {
            Self::Sensor { at, .. } | Self::Sweep { at, .. } | Self::Consistency { at, .. } => *at,
        }
    }
}

/// A parsed trace plus the source it came from, for error messages.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub source: String,
    pub entries: Vec<TraceEntry>,
}

/// Running totals from feeding a trace into an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayCounts {
    pub entries: usize,
    /// Events that changed a sensor's state.
    pub transitions: usize,
    /// Repeats, unknown sensors, and unavailable states.
    pub ignored: usize,
    pub sweeps: usize,
    pub consistency_passes: usize,
}

impl Trace {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CliError::NotFound {
                    resource_type: "trace file".into(),
                    identifier: path.display().to_string(),
                    list_command: "replay --help".into(),
                }
            } else {
                CliError::Io(e)
            }
        })?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        Self::parse(&path.display().to_string(), &text, is_yaml)
    }

    /// Parse trace text. JSON arrays and YAML lists are read whole;
    /// anything else is JSON lines, skipping blanks and `#` comments.
    pub fn parse(source: &str, text: &str, yaml: bool) -> Result<Self, CliError> {
        let invalid = |line: usize, reason: String| CliError::Trace {
            path: source.into(),
            line,
            reason,
        };

        let entries: Vec<TraceEntry> = if yaml {
            serde_yaml::from_str(text).map_err(|e| {
                let line = e.location().map_or(0, |l| l.line());
                invalid(line, e.to_string())
            })?
        } else if text.trim_start().starts_with('[') {
            serde_json::from_str(text).map_err(|e| invalid(e.line(), e.to_string()))?
        } else {
            text.lines()
                .enumerate()
                .filter(|(_, line)| {
                    let line = line.trim();
                    !line.is_empty() && !line.starts_with('#')
                })
                .map(|(index, line)| {
                    serde_json::from_str(line).map_err(|e| invalid(index + 1, e.to_string()))
                })
                .collect::<Result<_, _>>()?
        };

        for (index, entry) in entries.iter().enumerate() {
            let check = match entry {
                TraceEntry::Sensor { state, .. } => state.to_state().map(|_| ()),
                TraceEntry::Sweep { sweep: false, .. } => Err("`sweep` must be true".into()),
                TraceEntry::Consistency {
                    consistency: false, ..
                } => Err("`consistency` must be true".into()),
                TraceEntry::Sweep { .. } | TraceEntry::Consistency { .. } => Ok(()),
            };
            check.map_err(|reason| invalid(index + 1, reason))?;
            if !entry.at().is_finite() {
                return Err(invalid(index + 1, "`at` must be a finite number".into()));
            }
        }

        debug!(source, entries = entries.len(), "trace parsed");
        Ok(Self {
            source: source.into(),
            entries,
        })
    }

    /// Timestamp of the last entry.
    pub fn end(&self) -> Option<Timestamp> {
        self.entries.last().map(TraceEntry::at)
    }

    /// Feed every entry into `engine`, calling `on_entry` after each one.
    pub fn apply(&self, engine: &mut Engine, mut on_entry: impl FnMut()) -> ReplayCounts {
        let mut counts = ReplayCounts::default();
        for entry in &self.entries {
            counts.entries += 1;
            match entry {
                TraceEntry::Sensor { at, sensor, state } => {
                    // Validated in `parse`.
                    let Ok(Some(state)) = state.to_state() else {
                        counts.ignored += 1;
                        on_entry();
                        continue;
                    };
                    if engine.process_event(sensor, state, *at) {
                        counts.transitions += 1;
                    } else {
                        counts.ignored += 1;
                    }
                }
                TraceEntry::Sweep { at, .. } => {
                    engine.check_timeouts(*at);
                    counts.sweeps += 1;
                }
                TraceEntry::Consistency { at, .. } => {
                    engine.resolve_consistency(*at);
                    counts.consistency_passes += 1;
                }
            }
            on_entry();
        }
        counts
    }
}
