//! `warnings`: list anomalies raised while replaying a trace.

use std::str::FromStr;

use strum::IntoEnumIterator;
use tabled::Tabled;

use occupancy_core::{AreaId, Warning, WarningFilter, WarningKind};

use crate::cli::{GlobalOpts, WarningsArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct WarningRow {
    #[tabled(rename = "Time")]
    at: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Area")]
    area: String,
    #[tabled(rename = "Sensor")]
    sensor: String,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl From<&Warning> for WarningRow {
    fn from(w: &Warning) -> Self {
        Self {
            at: format!("{:.1}", w.timestamp),
            kind: w.kind.to_string(),
            area: w.area.as_ref().map_or_else(|| "-".into(), ToString::to_string),
            sensor: w.sensor.as_ref().map_or_else(|| "-".into(), ToString::to_string),
            active: if w.is_active { "yes" } else { "no" }.into(),
            message: w.message.clone(),
        }
    }
}

fn parse_kind(raw: &str) -> Result<WarningKind, CliError> {
    WarningKind::from_str(raw).map_err(|_| CliError::Validation {
        field: "--kind".into(),
        reason: format!(
            "unknown warning kind '{raw}' (expected one of: {})",
            WarningKind::iter()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    })
}

pub fn handle(args: &WarningsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let kind = args.kind.as_deref().map(parse_kind).transpose()?;
    let (engine, _, _) = util::replay_trace(global, &args.trace)?;

    let area_filter = match &args.area {
        Some(area) if !engine.config().areas.contains_key(area.as_str()) => {
            return Err(CliError::NotFound {
                resource_type: "area".into(),
                identifier: area.clone(),
                list_command: "config show".into(),
            });
        }
        Some(area) => Some(WarningFilter::ByArea(AreaId::new(area.as_str()))),
        None => None,
    };
    let kind_filter = kind.map(WarningFilter::ByKind);

    let warnings: Vec<Warning> = engine
        .warnings_matching(&if args.all {
            WarningFilter::All
        } else {
            WarningFilter::Active
        })
        .into_iter()
        .filter(|w| kind_filter.as_ref().is_none_or(|f| f.matches(w)))
        .filter(|w| area_filter.as_ref().is_none_or(|f| f.matches(w)))
        .cloned()
        .collect();

    let out = output::render_list(&global.output, &warnings, |w| WarningRow::from(w), |w| {
        w.to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
