//! `verify`: replay an exported history and compare it with what was
//! recorded.

use std::fmt::Write as _;
use std::path::Path;

use tabled::Tabled;
use tracing::info;

use occupancy_core::{Engine, ReplayStart, Snapshot, StateDifference, VerificationReport, VerifyMode};

use crate::cli::{GlobalOpts, VerifyArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct DifferenceRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Time")]
    at: String,
    #[tabled(rename = "Difference")]
    kind: String,
    #[tabled(rename = "Subject")]
    subject: String,
    #[tabled(rename = "Recorded")]
    recorded: String,
    #[tabled(rename = "Replayed")]
    replayed: String,
}

impl From<&StateDifference> for DifferenceRow {
    fn from(d: &StateDifference) -> Self {
        let subject = d
            .area
            .as_ref()
            .map(ToString::to_string)
            .or_else(|| d.sensor.as_ref().map(ToString::to_string))
            .unwrap_or_else(|| "-".into());
        Self {
            index: d.snapshot_index,
            at: format!("{:.1}", d.timestamp),
            kind: d.kind.to_string(),
            subject,
            recorded: d.recorded.to_string(),
            replayed: d.replayed.to_string(),
        }
    }
}

fn detail(report: &VerificationReport, color: bool) -> String {
    let mut out = format!(
        "Result:      {}\nMode:        {}\nSnapshots:   {}\nDifferences: {}",
        output::verdict(report.passed(), color),
        report.mode,
        report.snapshots_checked,
        report.summary.total_differences,
    );
    if report.passed() {
        return out;
    }
    for (kind, n) in &report.summary.differences_by_type {
        let _ = write!(out, "\n  {kind}: {n}");
    }
    let rows: Vec<DifferenceRow> = report.differences.iter().map(DifferenceRow::from).collect();
    let table = tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string();
    let _ = write!(out, "\n{table}");
    out
}

fn plain(report: &VerificationReport) -> String {
    if report.passed() {
        return "pass".into();
    }
    report
        .differences
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read an exported history: a JSON array of snapshots.
pub fn read_history(path: &Path) -> Result<Vec<Snapshot>, CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CliError::NotFound {
                resource_type: "history file".into(),
                identifier: path.display().to_string(),
                list_command: "replay <TRACE> --export".into(),
            }
        } else {
            CliError::Io(e)
        }
    })?;
    let history: Vec<Snapshot> = serde_json::from_str(&text).map_err(|e| CliError::History {
        message: format!("{}: {e}", path.display()),
    })?;
    // Surface undecodable descriptions before replay silently skips them.
    for snapshot in &history {
        snapshot.event()?;
    }
    Ok(history)
}

pub fn handle(args: &VerifyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut config = util::load_config(global)?;
    if let Some(tolerance) = args.tolerance {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(CliError::Validation {
                field: "--tolerance".into(),
                reason: "must be a non-negative number of seconds".into(),
            });
        }
        config.settings.tolerance = tolerance;
    }
    let mut engine = Engine::new(config)?;
    let history = read_history(&args.history)?;

    let mode = if args.all {
        VerifyMode::EverySnapshot
    } else {
        VerifyMode::FinalSnapshot
    };
    let start = if args.seed_from_first {
        ReplayStart::FirstSnapshot
    } else {
        ReplayStart::for_history(&history)
    };
    info!(snapshots = history.len(), %mode, ?start, "verifying history");

    let report = engine.verify_snapshots(&history, mode, start);

    let color = output::should_color(&global.color);
    let out = output::render_single(&global.output, &report, |r| detail(r, color), plain)?;
    output::print_output(&out, global.quiet);

    if report.passed() {
        Ok(())
    } else {
        Err(CliError::VerificationFailed {
            differences: report.summary.total_differences,
        })
    }
}
