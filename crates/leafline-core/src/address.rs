// ── Device address ──
//
// `host:port` of one physical device. Replaced wholesale on re-discovery
// or manual re-entry; there are no setters.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CoreError;

/// Port the device's local API listens on unless the advertisement says otherwise.
pub const DEFAULT_API_PORT: u16 = 16021;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceAddress {
    host: String,
    port: u16,
}

impl DeviceAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, CoreError> {
        let host = host.into();
        validate_host(&host).map_err(|reason| CoreError::InvalidAddress {
            input: format!("{host}:{port}"),
            reason,
        })?;
        if port == 0 {
            return Err(CoreError::InvalidAddress {
                input: format!("{host}:{port}"),
                reason: "port must be between 1 and 65535".into(),
            });
        }
        Ok(Self { host, port })
    }

    /// Address from a discovered IP. IPs never fail host validation.
    pub fn from_ip(ip: IpAddr, port: u16) -> Result<Self, CoreError> {
        Self::new(ip.to_string(), port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `http://host:port/`, the root every API path hangs off.
    pub fn base_url(&self) -> Result<Url, CoreError> {
        Url::parse(&format!("http://{self}/")).map_err(|e| CoreError::InvalidAddress {
            input: self.to_string(),
            reason: e.to_string(),
        })
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for DeviceAddress {
    type Err = CoreError;

    /// Parse `host:port` or `[v6]:port`. The port is mandatory.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let invalid = |reason: &str| CoreError::InvalidAddress {
            input: input.to_string(),
            reason: reason.into(),
        };

        let (host, port) = if let Some(rest) = input.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| invalid("unterminated '[' in IPv6 address"))?;
            let port = tail
                .strip_prefix(':')
                .ok_or_else(|| invalid("expected host:port"))?;
            if host.parse::<std::net::Ipv6Addr>().is_err() {
                return Err(invalid("bracketed host is not an IPv6 address"));
            }
            (host, port)
        } else {
            let (host, port) = input
                .rsplit_once(':')
                .ok_or_else(|| invalid("expected host:port"))?;
            if host.contains(':') {
                return Err(invalid("IPv6 addresses must be written as [addr]:port"));
            }
            (host, port)
        };

        let port: u16 = port
            .parse()
            .map_err(|_| invalid("port must be a number between 1 and 65535"))?;

        Self::new(host, port).map_err(|e| match e {
            CoreError::InvalidAddress { reason, .. } => invalid(&reason),
            other => other,
        })
    }
}

fn validate_host(host: &str) -> Result<(), String> {
    if host.is_empty() {
        return Err("host is empty".into());
    }
    if host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }
    let valid = host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'));
    if valid {
        Ok(())
    } else {
        Err(format!("'{host}' is not a hostname or IP address"))
    }
}
