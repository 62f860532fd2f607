// Device API HTTP client
//
// Wraps `reqwest::Client` with Nanoleaf URL construction and status
// classification. Endpoint methods live in `pairing.rs` and `device.rs`
// as inherent impls so this module stays focused on transport mechanics.

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Raw HTTP client for one device's local API.
///
/// The base URL is the device root (e.g. `http://192.168.1.50:16021`).
/// Token-scoped paths are built per call; the token itself is never
/// logged -- log lines show the path with the token segment masked.
#[derive(Debug, Clone)]
pub struct NanoleafClient {
    http: reqwest::Client,
    base_url: Url,
}

impl NanoleafClient {
    /// Create a client with its own connection pool.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client on top of a shared `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/api/v1/{path}` for routes that need no token.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(&format!("/api/v1/{path}"))?)
    }

    /// `{base}/api/v1/{token}/{path}`. The token is one percent-encoded
    /// segment whatever characters it holds.
    pub(crate) fn token_url(&self, token: &SecretString, path: &str) -> Result<Url, Error> {
        let mut url = self.api_url("")?;
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push(token.expose_secret())
            .extend(path.split('/'));
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a PUT with a JSON body. Returns the status code on 2xx.
    pub(crate) async fn put_json(
        &self,
        url: Url,
        display_path: &str,
        body: &impl Serialize,
    ) -> Result<u16, Error> {
        debug!(path = display_path, "PUT");

        let resp = self
            .http
            .put(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let resp = check_status(resp, display_path).await?;
        Ok(resp.status().as_u16())
    }

    /// Send a GET and decode the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        display_path: &str,
    ) -> Result<T, Error> {
        debug!(path = display_path, "GET");

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let resp = check_status(resp, display_path).await?;
        decode(resp).await
    }

    /// Send a body-less POST and hand back the raw response for
    /// endpoint-specific status handling.
    pub(crate) async fn post_empty(
        &self,
        url: Url,
        display_path: &str,
    ) -> Result<reqwest::Response, Error> {
        debug!(path = display_path, "POST");
        self.http.post(url).send().await.map_err(Error::Transport)
    }
}

/// Map non-success statuses to typed errors, passing 2xx through.
async fn check_status(resp: reqwest::Response, path: &str) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    debug!(path, status = status.as_u16(), "device returned error status");

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Unauthorized {
            status: status.as_u16(),
        }),
        StatusCode::NOT_FOUND => Err(Error::NotFound { path: path.into() }),
        _ => {
            let body = resp.text().await.unwrap_or_default();
            Err(Error::Api {
                status: status.as_u16(),
                body,
            })
        }
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let body = resp.text().await.map_err(Error::Transport)?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}
