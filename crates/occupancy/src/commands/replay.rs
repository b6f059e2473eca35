//! `replay`: feed a trace through a fresh engine and report occupancy.

use std::fmt::Write as _;

use serde::Serialize;
use tabled::Tabled;
use tracing::info;

use occupancy_core::{AreaStatus, SystemStatus, VerificationReport, VerifyMode};

use crate::cli::{GlobalOpts, ReplayArgs, VerifyScope};
use crate::error::CliError;
use crate::output;
use crate::trace::ReplayCounts;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct AreaRow {
    #[tabled(rename = "Area")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Occupancy")]
    occupancy: String,
    #[tabled(rename = "Probability")]
    probability: String,
    #[tabled(rename = "Idle (s)")]
    idle: String,
    #[tabled(rename = "Flags")]
    flags: String,
}

impl AreaRow {
    fn new(area: &AreaStatus, color: bool) -> Self {
        let mut flags = Vec::new();
        if area.active {
            flags.push("active");
        }
        if area.exit_capable {
            flags.push("exit");
        }
        if !area.indoors {
            flags.push("outdoor");
        }
        Self {
            id: area.id.to_string(),
            name: area.name.clone(),
            occupancy: output::count(area.occupancy, color),
            probability: format!("{:.2}", area.probability),
            idle: output::seconds(area.seconds_since_motion),
            flags: flags.join(","),
        }
    }
}

// ── Report ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ReplayReport {
    source: String,
    evaluated_at: f64,
    counts: ReplayCounts,
    status: SystemStatus,
    areas: Vec<AreaStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verification: Option<VerificationReport>,
}

fn detail(report: &ReplayReport, color: bool) -> String {
    let rows: Vec<AreaRow> = report
        .areas
        .iter()
        .map(|a| AreaRow::new(a, color))
        .collect();
    let mut out = tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string();

    let c = &report.counts;
    let _ = write!(
        out,
        "\nEntries:   {} ({} transitions, {} ignored, {} sweeps)\
         \nTotal:     {} people\
         \nWarnings:  {} active\
         \nSnapshots: {}",
        c.entries,
        c.transitions,
        c.ignored,
        c.sweeps,
        report.status.total_occupancy,
        report.status.active_warnings,
        report.status.snapshots_recorded,
    );
    if let Some(verification) = &report.verification {
        let _ = write!(
            out,
            "\nVerify:    {} ({} snapshots, {} differences)",
            output::verdict(verification.passed(), color),
            verification.snapshots_checked,
            verification.summary.total_differences,
        );
    }
    out
}

fn plain(report: &ReplayReport) -> String {
    report
        .areas
        .iter()
        .map(|a| format!("{} {}", a.id, a.occupancy))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &ReplayArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (mut engine, trace, counts) = util::replay_trace(global, &args.trace)?;

    if let Some(path) = &args.export {
        let history = engine.export_history();
        std::fs::write(path, output::render_json_pretty(&history)?)?;
        info!(path = %path.display(), snapshots = history.len(), "history exported");
    }

    let verification = args.verify.map(|scope| {
        let mode = match scope {
            VerifyScope::Final => VerifyMode::FinalSnapshot,
            VerifyScope::All => VerifyMode::EverySnapshot,
        };
        engine.verify_history(mode)
    });

    let evaluated_at = args.at.or_else(|| trace.end()).unwrap_or_default();
    let report = ReplayReport {
        source: trace.source,
        evaluated_at,
        counts,
        status: engine.system_status(),
        areas: engine.area_statuses(evaluated_at),
        verification,
    };

    let color = output::should_color(&global.color);
    let out = output::render_single(&global.output, &report, |r| detail(r, color), plain)?;
    output::print_output(&out, global.quiet);

    match &report.verification {
        Some(v) if !v.passed() => Err(CliError::VerificationFailed {
            differences: v.summary.total_differences,
        }),
        _ => Ok(()),
    }
}
