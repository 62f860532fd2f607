// ── Outcome ──
//
// The one result shape every intent returns. Device and network failures
// are folded in here; nothing past the relay/reader boundary sees an
// HTTP status or a transport error directly.

use std::fmt;

use serde::Serialize;

use crate::intent::AppliedValue;
use crate::session::{Missing, NotConfigured};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome<T = AppliedValue> {
    /// The device accepted the call. `status` is the device's HTTP status;
    /// absent for operations that never reach the device API.
    Success {
        value: T,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },
    /// A caller-supplied parameter was out of range. Never reaches the network.
    ValidationError { reason: String },
    /// The device rejected the credential; it has been invalidated.
    Unauthorized,
    /// The device is not accepting pairing requests right now.
    PairingWindowClosed,
    /// The session lacks an address, a credential, or both.
    NotConfigured { missing: Missing },
    /// Network failure, timeout, or a non-auth HTTP error.
    DeviceUnreachable { reason: String },
    /// No device advertisement arrived in time.
    DiscoveryTimeout { timeout_ms: u64 },
}

impl<T> Outcome<T> {
    pub fn success(value: T, status: u16) -> Self {
        Self::Success {
            value,
            status: Some(status),
        }
    }

    /// Success for operations that complete without a device call.
    pub fn local(value: T) -> Self {
        Self::Success {
            value,
            status: None,
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::ValidationError {
            reason: reason.into(),
        }
    }

    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self::DeviceUnreachable {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Success { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Transform the success payload, leaving every failure untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success { value, status } => Outcome::Success {
                value: f(value),
                status,
            },
            Self::ValidationError { reason } => Outcome::ValidationError { reason },
            Self::Unauthorized => Outcome::Unauthorized,
            Self::PairingWindowClosed => Outcome::PairingWindowClosed,
            Self::NotConfigured { missing } => Outcome::NotConfigured { missing },
            Self::DeviceUnreachable { reason } => Outcome::DeviceUnreachable { reason },
            Self::DiscoveryTimeout { timeout_ms } => Outcome::DiscoveryTimeout { timeout_ms },
        }
    }

    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::ValidationError { .. } => "validation_error",
            Self::Unauthorized => "unauthorized",
            Self::PairingWindowClosed => "pairing_window_closed",
            Self::NotConfigured { .. } => "not_configured",
            Self::DeviceUnreachable { .. } => "device_unreachable",
            Self::DiscoveryTimeout { .. } => "discovery_timeout",
        }
    }

    /// HTTP status the relay server answers with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Success { .. } => 200,
            Self::ValidationError { .. } => 400,
            Self::Unauthorized => 401,
            Self::PairingWindowClosed => 403,
            Self::NotConfigured { .. } => 428,
            Self::DeviceUnreachable { .. } => 502,
            Self::DiscoveryTimeout { .. } => 504,
        }
    }

    /// Classify a device API failure.
    ///
    /// 401/403 become `Unauthorized`; 404 and everything else the device or
    /// the network can throw become `DeviceUnreachable`.
    pub fn from_api_error(err: &leafline_api::Error) -> Self {
        use leafline_api::Error as E;
        match err {
            E::Unauthorized { .. } => Self::Unauthorized,
            E::PairingWindowClosed => Self::PairingWindowClosed,
            E::NotFound { .. } => Self::unreachable("not found"),
            E::Api { status, body } if body.is_empty() => Self::unreachable(format!("HTTP {status}")),
            E::Api { status, body } => Self::unreachable(format!("HTTP {status}: {body}")),
            E::Transport(e) if e.is_timeout() => Self::unreachable(format!("timed out: {e}")),
            E::Transport(e) if e.is_connect() => Self::unreachable(format!("connection failed: {e}")),
            E::Transport(e) => Self::unreachable(e.to_string()),
            E::Deserialization { message, .. } => {
                Self::unreachable(format!("unexpected response from device: {message}"))
            }
            E::MissingToken | E::InvalidUrl(_) => Self::unreachable(err.to_string()),
        }
    }
}

impl<T> From<NotConfigured> for Outcome<T> {
    fn from(nc: NotConfigured) -> Self {
        Self::NotConfigured {
            missing: nc.missing,
        }
    }
}

/// Human-readable summary of the non-payload part.
impl<T> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success {
                status: Some(status),
                ..
            } => write!(f, "ok (device status {status})"),
            Self::Success { status: None, .. } => f.write_str("ok"),
            Self::ValidationError { reason } => write!(f, "invalid input: {reason}"),
            Self::Unauthorized => f.write_str("device rejected the auth token; pair again"),
            Self::PairingWindowClosed => f.write_str(
                "pairing window closed; hold the power button for 5-7 seconds, then retry within 30 seconds",
            ),
            Self::NotConfigured { missing } => write!(f, "not configured: {}", missing.hint()),
            Self::DeviceUnreachable { reason } => write!(f, "device unreachable: {reason}"),
            Self::DiscoveryTimeout { timeout_ms } => {
                write!(f, "no device found within {timeout_ms} ms")
            }
        }
    }
}
