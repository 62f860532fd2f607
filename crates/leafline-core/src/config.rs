// ── Runtime configuration ──
//
// These types describe how to find and talk to a device. They carry the
// startup address and credential but never touch disk: the CLI and the
// relay server build a `CoreConfig` and hand it in.

use std::ops::RangeInclusive;
use std::time::Duration;

use crate::address::{DEFAULT_API_PORT, DeviceAddress};
use crate::credential::Credential;
use crate::error::CoreError;

/// mDNS service type the device advertises its API under.
pub const NANOLEAF_SERVICE_TYPE: &str = "_nanoleafapi._tcp.local.";

/// Discovery gives up after this long unless told otherwise.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Accepted colour temperature range in Kelvin.
///
/// Device-reported minima differ between panel generations; the relay
/// validates against these static bounds instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTempBounds {
    min: i64,
    max: i64,
}

impl ColorTempBounds {
    pub const DEFAULT_MIN: i64 = 1200;
    pub const DEFAULT_MAX: i64 = 6500;

    pub fn new(min: i64, max: i64) -> Result<Self, CoreError> {
        if min <= 0 {
            return Err(CoreError::InvalidBounds {
                min,
                max,
                reason: "floor must be positive".into(),
            });
        }
        if min >= max {
            return Err(CoreError::InvalidBounds {
                min,
                max,
                reason: "floor must be below ceiling".into(),
            });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn range(&self) -> RangeInclusive<i64> {
        self.min..=self.max
    }
}

impl Default for ColorTempBounds {
    fn default() -> Self {
        Self {
            min: Self::DEFAULT_MIN,
            max: Self::DEFAULT_MAX,
        }
    }
}

/// Configuration for the process-wide controller.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// mDNS service type to browse for.
    pub service_type: String,
    /// Port used when an advertisement carries none.
    pub default_port: u16,
    /// Upper bound on a single discovery attempt.
    pub discovery_timeout: Duration,
    /// Per-request timeout for device API calls.
    pub request_timeout: Duration,
    pub ct_bounds: ColorTempBounds,
    /// Address known at startup (config file, env, or CLI flag).
    pub address: Option<DeviceAddress>,
    /// Credential known at startup.
    pub credential: Option<Credential>,
    /// Store key `credential` was loaded from, if it came from the store.
    /// A rejection clears this entry along with the session's own.
    pub credential_key: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            service_type: NANOLEAF_SERVICE_TYPE.into(),
            default_port: DEFAULT_API_PORT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            request_timeout: Duration::from_secs(5),
            ct_bounds: ColorTempBounds::default(),
            address: None,
            credential: None,
            credential_key: None,
        }
    }
}
