//! `sensors`: per-sensor diagnostics after replaying a trace.

use tabled::Tabled;

use occupancy_core::SensorDiagnosis;

use crate::cli::{GlobalOpts, SensorsArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "Sensor")]
    id: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Areas")]
    areas: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Changed")]
    changed: String,
    #[tabled(rename = "Events")]
    events: usize,
    #[tabled(rename = "Problems")]
    problems: String,
}

impl From<&SensorDiagnosis> for SensorRow {
    fn from(d: &SensorDiagnosis) -> Self {
        Self {
            id: d.id.to_string(),
            kind: d.kind.to_string(),
            areas: d
                .bound_areas
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
            state: if d.current_state { "on" } else { "off" }.into(),
            changed: format!("{:.1}", d.last_changed),
            events: d.history_len,
            problems: if d.problems.is_empty() {
                "-".into()
            } else {
                d.problems.join("; ")
            },
        }
    }
}

pub fn handle(args: &SensorsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (engine, _, _) = util::replay_trace(global, &args.trace)?;
    let diagnoses = engine.diagnose_sensors();
    let out = output::render_list(&global.output, &diagnoses, |d| SensorRow::from(d), |d| {
        let state = if d.current_state { "on" } else { "off" };
        if d.problems.is_empty() {
            format!("{} {state} ok", d.id)
        } else {
            format!("{} {state} {}", d.id, d.problems.join("; "))
        }
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
