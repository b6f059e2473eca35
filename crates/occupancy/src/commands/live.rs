//! `live`: line-oriented adapter for hosts that stream sensor states.
//!
//! Reads one JSON object per stdin line,
//! `{"sensor": "...", "state": "on", "at": 1700000000.0}`, and writes one
//! JSON object per processed input. `at` defaults to the wall clock.
//! Timeout sweeps run on a timer; their clock advances from the last
//! input's `at` so recorded timelines and live ones behave the same.
//! One task owns the engine; stdin is read on another and queued.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use occupancy_core::{Engine, SystemStatus, Timestamp};

use crate::cli::{GlobalOpts, LiveArgs, OutputFormat};
use crate::error::CliError;
use crate::output;
use crate::trace::StateValue;

use super::util;

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LiveInput {
    sensor: String,
    state: StateValue,
    #[serde(default)]
    at: Option<Timestamp>,
}

#[derive(Debug, Serialize)]
struct Push {
    at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    sensor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<bool>,
    /// The sensor changed state (inputs) or occupancy changed (sweeps).
    changed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    sweep: bool,
    status: SystemStatus,
}

impl Push {
    fn render(&self, format: &OutputFormat) -> Result<String, CliError> {
        match format {
            OutputFormat::Plain => {
                let occupied: Vec<String> = self
                    .status
                    .occupied_areas
                    .iter()
                    .map(|(id, n)| format!("{id}={n}"))
                    .collect();
                Ok(format!("{} {}", self.at, occupied.join(" ")))
            }
            _ => output::render_json_compact(self),
        }
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// Engine plus the clock anchor used for sweeps.
struct LiveSession {
    engine: Engine,
    anchor: Option<(Timestamp, Instant)>,
}

impl LiveSession {
    fn new(engine: Engine) -> Self {
        Self {
            engine,
            anchor: None,
        }
    }

    /// Process one input line. `None` for blank, malformed, or
    /// unavailable inputs.
    fn handle_line(&mut self, line: &str, received: Instant) -> Option<Push> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let input: LiveInput = match serde_json::from_str(line) {
            Ok(input) => input,
            Err(e) => {
                warn!(error = %e, "ignoring malformed input line");
                return None;
            }
        };
        let state = match input.state.to_state() {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!(sensor = %input.sensor, "state unavailable; dropped");
                return None;
            }
            Err(reason) => {
                warn!(sensor = %input.sensor, %reason, "ignoring input");
                return None;
            }
        };
        let at = input.at.unwrap_or_else(wall_clock);
        self.anchor = Some((at, received));

        let changed = self.engine.process_event(&input.sensor, state, at);
        Some(Push {
            at,
            sensor: Some(input.sensor),
            state: Some(state),
            changed,
            sweep: false,
            status: self.engine.system_status(),
        })
    }

    /// Sweep clock: the last input's time plus the time since it arrived.
    fn sweep_time(&self, now: Instant) -> Timestamp {
        match self.anchor {
            Some((at, received)) => at + now.saturating_duration_since(received).as_secs_f64(),
            None => wall_clock(),
        }
    }

    /// Run a timeout sweep; `Some` only when occupancy changed.
    fn sweep(&mut self, now: Instant) -> Option<Push> {
        let at = self.sweep_time(now);
        let before = self.engine.system_status().occupied_areas;
        self.engine.check_timeouts(at);
        let status = self.engine.system_status();
        if status.occupied_areas == before {
            return None;
        }
        info!(at, "sweep cleared occupancy");
        Some(Push {
            at,
            sensor: None,
            state: None,
            changed: true,
            sweep: true,
            status,
        })
    }
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn wall_clock() -> Timestamp {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

fn parse_interval(raw: &str) -> Result<Duration, CliError> {
    let interval = humantime::parse_duration(raw).map_err(|e| CliError::Validation {
        field: "--sweep-every".into(),
        reason: e.to_string(),
    })?;
    if interval.is_zero() {
        return Err(CliError::Validation {
            field: "--sweep-every".into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(interval)
}

// ── Handler ─────────────────────────────────────────────────────────

/// Input lines queued between the stdin reader and the engine task.
const INPUT_CHANNEL_SIZE: usize = 256;

pub async fn handle(args: &LiveArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let interval = parse_interval(&args.sweep_every)?;
    let mut session = LiveSession::new(util::load_engine(global)?);
    info!(sweep_every = %args.sweep_every, "live session started");

    // Reader task: stdin lines, stamped on arrival. The engine stays on
    // this task so inputs and sweeps never interleave.
    let (tx, mut rx) = mpsc::channel::<(String, Instant)>(INPUT_CHANNEL_SIZE);
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if tx.send((line, Instant::now())).await.is_err() {
                break;
            }
        }
        Ok::<(), std::io::Error>(())
    });

    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        let push = tokio::select! {
            input = rx.recv() => match input {
                Some((line, received)) => session.handle_line(&line, received),
                None => break,
            },
            _ = ticker.tick() => session.sweep(Instant::now()),
        };
        if let Some(push) = push {
            output::print_output(&push.render(&global.output)?, global.quiet);
        }
    }

    info!(
        snapshots = session.engine.system_status().snapshots_recorded,
        "live session ended"
    );
    // The channel closes only once the reader has returned.
    match reader.await {
        Ok(result) => Ok(result?),
        Err(e) => {
            warn!(error = %e, "stdin reader task failed");
            Ok(())
        }
    }
}
