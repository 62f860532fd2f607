//! CLI error types with miette diagnostics.
//!
//! Maps `Outcome` failures, `CoreError` and `ConfigError` into user-facing
//! errors with actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use leafline_config::ConfigError;
use leafline_core::{CoreError, Missing, Outcome};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Device ───────────────────────────────────────────────────────

    #[error("Device unreachable: {reason}")]
    #[diagnostic(
        code(leafline::unreachable),
        help(
            "Check that the panel is powered and on the same network.\n\
             Try: leafline discover"
        )
    )]
    Unreachable { reason: String },

    #[error("No Nanoleaf device answered within {timeout_ms} ms")]
    #[diagnostic(
        code(leafline::discovery_timeout),
        help("Pass the address directly with --host <ip:port>, or raise [discovery] timeout_ms.")
    )]
    DiscoveryTimeout { timeout_ms: u64 },

    // ── Authentication ───────────────────────────────────────────────

    #[error("The device rejected the auth token")]
    #[diagnostic(
        code(leafline::unauthorized),
        help(
            "The stored token has been discarded.\n\
             Hold the power button for 5-7 seconds, then run: leafline pair"
        )
    )]
    Unauthorized,

    #[error("The device is not accepting pairing requests")]
    #[diagnostic(
        code(leafline::pairing_window_closed),
        help("Hold the power button for 5-7 seconds until the LEDs flash, then retry within 30 seconds.")
    )]
    PairingWindowClosed,

    #[error("Not configured: missing {missing}")]
    #[diagnostic(code(leafline::not_configured), help("Next step: {hint}"))]
    NotConfigured { missing: Missing, hint: &'static str },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(leafline::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(leafline::config),
        help("Inspect the resolved settings with: leafline config show")
    )]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(code(leafline::core))]
    Core(#[from] CoreError),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } => exit_code::CONNECTION,
            Self::DiscoveryTimeout { .. } => exit_code::TIMEOUT,
            Self::Unauthorized
            | Self::NotConfigured {
                missing: Missing::Credential | Missing::Both,
                ..
            } => exit_code::AUTH,
            Self::NotConfigured { .. } => exit_code::NOT_FOUND,
            Self::PairingWindowClosed => exit_code::PERMISSION,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Config(_) | Self::Core(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }

    /// Convert a failed outcome. `field` names the input for validation errors.
    pub fn from_failure<T>(outcome: Outcome<T>, field: &str) -> Self {
        match outcome {
            Outcome::ValidationError { reason } => Self::Validation {
                field: field.to_owned(),
                reason,
            },
            Outcome::Unauthorized => Self::Unauthorized,
            Outcome::PairingWindowClosed => Self::PairingWindowClosed,
            Outcome::NotConfigured { missing } => Self::NotConfigured {
                missing,
                hint: missing.hint(),
            },
            Outcome::DeviceUnreachable { reason } => Self::Unreachable { reason },
            Outcome::DiscoveryTimeout { timeout_ms } => Self::DiscoveryTimeout { timeout_ms },
            Outcome::Success { .. } => Self::Validation {
                field: field.to_owned(),
                reason: "unexpected success passed as failure".into(),
            },
        }
    }
}

/// Unwrap a successful outcome or turn it into a `CliError`.
pub fn require<T>(outcome: Outcome<T>, field: &str) -> Result<T, CliError> {
    match outcome {
        Outcome::Success { value, .. } => Ok(value),
        failure => Err(CliError::from_failure(failure, field)),
    }
}
