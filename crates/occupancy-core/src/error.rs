// ── Core error types ──
//
// Event processing never fails: unknown sensors, unknown areas, and
// malformed sensor bindings are logged and dropped. These errors cover
// construction, lookups, and decoding recorded history.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Area not found: {identifier}")]
    AreaNotFound { identifier: String },

    #[error("Sensor not found: {identifier}")]
    SensorNotFound { identifier: String },

    // ── History errors ───────────────────────────────────────────────
    #[error("Invalid snapshot description: {description:?}")]
    InvalidSnapshot { description: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}
