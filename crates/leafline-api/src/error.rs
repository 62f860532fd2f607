use thiserror::Error;

/// Top-level error type for the `leafline-api` crate.
///
/// Covers every failure mode of the device's local HTTP API: transport,
/// authorization, pairing, and payload decoding. `leafline-core` folds these
/// into its uniform `Outcome` so callers never branch on HTTP details.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authorization ───────────────────────────────────────────────
    /// The device rejected the auth token (HTTP 401 or 403).
    #[error("Auth token rejected by device (HTTP {status})")]
    Unauthorized { status: u16 },

    /// `POST /api/v1/new` was refused because the pairing window is not open.
    #[error("Pairing window closed -- hold the power button for 5-7 seconds and retry within 30s")]
    PairingWindowClosed,

    /// Pairing succeeded at the HTTP level but the body carried no token.
    #[error("Pairing response did not contain an auth_token")]
    MissingToken,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, timeout, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Device responses ────────────────────────────────────────────
    /// The requested resource does not exist on this device.
    #[error("Resource not found: {path}")]
    NotFound { path: String },

    /// Any other non-success status, with the raw body for diagnostics.
    #[error("Device API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the device refused the credential that was sent.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Returns `true` for network-level failures (timeout, refused connection).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP status attached to this error, if the device answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status } | Self::Api { status, .. } => Some(*status),
            Self::PairingWindowClosed => Some(403),
            Self::NotFound { .. } => Some(404),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
