//! `history`: print the snapshots recorded while replaying a trace.

use tabled::Tabled;

use occupancy_core::{MergedSnapshot, Snapshot, SnapshotKind};

use crate::cli::{GlobalOpts, HistoryArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "Time")]
    at: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Event")]
    description: String,
    #[tabled(rename = "Occupied")]
    occupied: String,
}

fn occupied_summary<'a>(counts: impl Iterator<Item = (&'a str, u32)>) -> String {
    let parts: Vec<String> = counts
        .filter(|(_, n)| *n > 0)
        .map(|(id, n)| format!("{id}={n}"))
        .collect();
    if parts.is_empty() { "-".into() } else { parts.join(" ") }
}

fn row(at: f64, kind: SnapshotKind, description: &str, occupied: String) -> SnapshotRow {
    SnapshotRow {
        at: format!("{at:.1}"),
        kind: kind.to_string(),
        description: description.to_owned(),
        occupied,
    }
}

pub fn handle(args: &HistoryArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (engine, _, _) = util::replay_trace(global, &args.trace)?;

    let out = if args.merged {
        let history: Vec<MergedSnapshot> = engine.export_merged_history();
        output::render_list(
            &global.output,
            &history,
            |s| {
                let counts = s.areas.iter().map(|(id, a)| (id.as_str(), a.state.occupancy));
                row(s.timestamp, s.event_type, &s.description, occupied_summary(counts))
            },
            |s| format!("{} {}", s.timestamp, s.description),
        )?
    } else {
        let history: Vec<Snapshot> = engine.export_history();
        output::render_list(
            &global.output,
            &history,
            |s| {
                let counts = s.areas.iter().map(|(id, a)| (id.as_str(), a.occupancy));
                row(s.timestamp, s.event_type, &s.description, occupied_summary(counts))
            },
            |s| format!("{} {}", s.timestamp, s.description),
        )?
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_only_occupied_areas() {
        let counts = [("yard", 0), ("hall", 2), ("kitchen", 1)];
        assert_eq!(occupied_summary(counts.into_iter()), "hall=2 kitchen=1");
        assert_eq!(occupied_summary([("yard", 0)].into_iter()), "-");
    }
}
