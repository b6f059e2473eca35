//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use occupancy_config::ConfigError;
use occupancy_core::CoreError;

/// Process exit codes. Success is 0.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const INVALID_INPUT: i32 = 5;
    pub const VERIFICATION: i32 = 6;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file not found")]
    #[diagnostic(
        code(occupancy::no_config),
        help(
            "Create one with: occupancy config init\n\
             Expected at: {path}\n\
             Or point OCCUPANCY_CONFIG / --config at an existing file."
        )
    )]
    NoConfig { path: String },

    #[error("Configuration file already exists: {path}")]
    #[diagnostic(
        code(occupancy::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(
        code(occupancy::config),
        help("Run: occupancy config check")
    )]
    Config { message: String },

    // ── Lookups ──────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(occupancy::not_found),
        help("Run: occupancy {list_command} to see configured {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Input ────────────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(occupancy::validation))]
    Validation { field: String, reason: String },

    #[error("Could not parse {path} line {line}: {reason}")]
    #[diagnostic(
        code(occupancy::trace),
        help(
            "Each entry needs `at` plus either `sensor` and `state`,\n\
             `sweep: true`, or `consistency: true`."
        )
    )]
    Trace {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("Invalid history: {message}")]
    #[diagnostic(
        code(occupancy::history),
        help("Export a history with: occupancy replay <TRACE> --export <PATH>")
    )]
    History { message: String },

    // ── Verification ─────────────────────────────────────────────────

    #[error("Replay does not reproduce the recorded history ({differences} differences)")]
    #[diagnostic(
        code(occupancy::verification_failed),
        help("Re-run with -o json for the full difference list.")
    )]
    VerificationFailed { differences: usize },

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(occupancy::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML payload: {0}")]
    #[diagnostic(code(occupancy::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig { .. } | Self::ConfigExists { .. } | Self::Config { .. } => {
                exit_code::CONFIG
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Trace { .. } | Self::History { .. } | Self::Json(_) | Self::Yaml(_) => {
                exit_code::INVALID_INPUT
            }
            Self::VerificationFailed { .. } => exit_code::VERIFICATION,
            Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AreaNotFound { identifier } => CliError::NotFound {
                resource_type: "area".into(),
                identifier,
                list_command: "config show".into(),
            },
            CoreError::SensorNotFound { identifier } => CliError::NotFound {
                resource_type: "sensor".into(),
                identifier,
                list_command: "config show".into(),
            },
            CoreError::InvalidSnapshot { description } => CliError::History {
                message: format!("unrecognised snapshot description {description:?}"),
            },
            CoreError::ValidationFailed { message } => CliError::Config { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => CliError::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn missing_config_maps_to_config_exit_code() {
        let err = CliError::from(ConfigError::NotFound {
            path: PathBuf::from("/nowhere/config.toml"),
        });
        assert!(matches!(err, CliError::NoConfig { ref path } if path == "/nowhere/config.toml"));
        assert_eq!(err.exit_code(), exit_code::CONFIG);
    }

    #[test]
    fn unknown_area_maps_to_not_found() {
        let err = CliError::from(CoreError::AreaNotFound {
            identifier: "attic".into(),
        });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        assert_eq!(err.to_string(), "area 'attic' not found");
    }

    #[test]
    fn verification_failure_has_its_own_code() {
        let err = CliError::VerificationFailed { differences: 3 };
        assert_eq!(err.exit_code(), exit_code::VERIFICATION);
    }
}
