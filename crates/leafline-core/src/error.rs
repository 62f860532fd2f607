// ── Core error types ──
//
// Setup and configuration failures only. Per-operation device failures
// never surface here: the relay and reader fold them into `Outcome`.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid device address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("Invalid colour temperature bounds {min}-{max}: {reason}")]
    InvalidBounds { min: i64, max: i64, reason: String },

    #[error("Service discovery unavailable: {message}")]
    Discovery { message: String },

    #[error("Credential storage failed: {message}")]
    Persistence { message: String },

    #[error("Failed to build device client: {0}")]
    Client(#[from] leafline_api::Error),
}
