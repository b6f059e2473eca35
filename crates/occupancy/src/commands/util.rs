//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use occupancy_core::{Engine, TrackerConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::trace::{ReplayCounts, Trace};

/// Load the tracker configuration named by `--config` / `OCCUPANCY_CONFIG`
/// or the platform default.
pub fn load_config(global: &GlobalOpts) -> Result<TrackerConfig, CliError> {
    let path = occupancy_config::resolve_path(global.config.as_deref());
    debug!(path = %path.display(), "loading configuration");
    Ok(occupancy_config::load_tracker_config(&path)?)
}

/// Build an engine from the configuration.
pub fn load_engine(global: &GlobalOpts) -> Result<Engine, CliError> {
    Ok(Engine::new(load_config(global)?)?)
}

/// Replay `trace_path` through a fresh engine.
///
/// Shows a progress bar on an interactive stderr unless `--quiet`.
pub fn replay_trace(
    global: &GlobalOpts,
    trace_path: &Path,
) -> Result<(Engine, Trace, ReplayCounts), CliError> {
    let mut engine = load_engine(global)?;
    let trace = Trace::load(trace_path)?;

    let bar = progress_bar(trace.entries.len(), global.quiet);
    let counts = trace.apply(&mut engine, || {
        if let Some(bar) = &bar {
            bar.inc(1);
        }
    });
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    info!(
        source = %trace.source,
        entries = counts.entries,
        transitions = counts.transitions,
        ignored = counts.ignored,
        "trace replayed"
    );
    Ok((engine, trace, counts))
}

fn progress_bar(len: usize, quiet: bool) -> Option<ProgressBar> {
    if quiet || !std::io::stderr().is_terminal() {
        return None;
    }
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .ok()?
        .progress_chars("█▓▒░  ");
    let bar = ProgressBar::new(u64::try_from(len).unwrap_or(u64::MAX));
    bar.set_style(style);
    bar.set_message("replaying");
    Some(bar)
}
