// Shared transport configuration for building reqwest::Client instances.
//
// The device speaks plain HTTP on the LAN, so there is no TLS or cookie
// state here: one pooled client is built once and handed to every
// per-address `NanoleafClient`.

use std::time::Duration;

use url::Url;

use crate::client::NanoleafClient;

const USER_AGENT: &str = concat!("leafline/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(3),
            user_agent: USER_AGENT.into(),
        }
    }
}

impl TransportConfig {
    /// Config with a custom overall request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.connect_timeout = self.connect_timeout.min(timeout);
        self
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.as_str())
            .build()
            .map_err(crate::error::Error::Transport)
    }
}

/// One pooled `reqwest::Client` handing out per-device `NanoleafClient`s.
///
/// Device addresses change on re-discovery; the pool does not.
#[derive(Debug, Clone)]
pub struct ClientFactory {
    http: reqwest::Client,
}

impl ClientFactory {
    pub fn new(transport: &TransportConfig) -> Result<Self, crate::error::Error> {
        Ok(Self {
            http: transport.build_client()?,
        })
    }

    /// Client for the device rooted at `base_url`.
    pub fn client(&self, base_url: Url) -> NanoleafClient {
        NanoleafClient::with_client(self.http.clone(), base_url)
    }
}
