//! Clap derive structures for the `occupancy` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.
//! Also compiled by `build.rs` for man pages, so it depends on clap only.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// occupancy -- adjacency-aware room occupancy from binary motion sensors
#[derive(Debug, Parser)]
#[command(
    name = "occupancy",
    version,
    about = "Track room occupancy from motion sensors and an adjacency map",
    long_about = "Counts people per area from binary motion, camera, and door sensors\n\
        using only which areas touch each other and when each sensor fired.\n\n\
        Replays recorded sensor traces, explains warnings, exports and verifies\n\
        snapshot history, and runs a line-oriented live adapter on stdin.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "OCCUPANCY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "OCCUPANCY_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Feed a sensor trace through a fresh engine and show occupancy
    #[command(alias = "r")]
    Replay(ReplayArgs),

    /// List warnings raised while replaying a trace
    #[command(alias = "w")]
    Warnings(WarningsArgs),

    /// Print the snapshot history recorded while replaying a trace
    History(HistoryArgs),

    /// Verify an exported history against the current logic
    Verify(VerifyArgs),

    /// Sensor diagnostics after replaying a trace
    Sensors(SensorsArgs),

    /// Read sensor states from stdin and print occupancy after each one
    Live(LiveArgs),

    /// Inspect and create the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  TRACE COMMANDS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum VerifyScope {
    /// Only the newest snapshot
    Final,
    /// Every snapshot against the replay state at that point
    All,
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Trace file (JSON array, JSON lines, or YAML list)
    pub trace: PathBuf,

    /// Verify the recorded history after the replay
    #[arg(long, value_name = "SCOPE")]
    pub verify: Option<VerifyScope>,

    /// Write the recorded history (JSON) to this path
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,

    /// Evaluate probabilities at this timestamp (defaults to the last entry)
    #[arg(long, value_name = "TS")]
    pub at: Option<f64>,
}

#[derive(Debug, Args)]
pub struct WarningsArgs {
    /// Trace file (JSON array, JSON lines, or YAML list)
    pub trace: PathBuf,

    /// Include resolved warnings
    #[arg(long)]
    pub all: bool,

    /// Only this warning kind (e.g. stuck_sensor, unexpected_motion)
    #[arg(long)]
    pub kind: Option<String>,

    /// Only warnings about this area
    #[arg(long)]
    pub area: Option<String>,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Trace file (JSON array, JSON lines, or YAML list)
    pub trace: PathBuf,

    /// Include static area and sensor configuration in each snapshot
    #[arg(long)]
    pub merged: bool,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Exported history file (JSON array of snapshots)
    pub history: PathBuf,

    /// Compare every snapshot, not only the newest
    #[arg(long)]
    pub all: bool,

    /// Seed state from the oldest snapshot (for truncated logs)
    #[arg(long)]
    pub seed_from_first: bool,

    /// Timestamp tolerance in seconds (overrides the config)
    #[arg(long)]
    pub tolerance: Option<f64>,
}

#[derive(Debug, Args)]
pub struct SensorsArgs {
    /// Trace file (JSON array, JSON lines, or YAML list)
    pub trace: PathBuf,
}

#[derive(Debug, Args)]
pub struct LiveArgs {
    /// How often to run timeout sweeps (e.g. "30s", "1m")
    #[arg(long, default_value = "30s", value_name = "DURATION")]
    pub sweep_every: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the resolved config file path
    Path,

    /// Display the resolved configuration (file + environment)
    Show,

    /// Load the configuration and report likely mistakes
    Check,

    /// Write a commented sample configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
