// Pairing (auth token issuance)
//
// The device hands out a token on `POST /api/v1/new` only while its
// pairing window is open: the user holds the power button for 5-7 seconds
// and the window stays open for roughly 30 seconds. Outside that window
// the device answers 403.

use reqwest::StatusCode;
use tracing::{debug, info};

use crate::client::{NanoleafClient, decode};
use crate::error::Error;
use crate::models::NewUserResponse;

impl NanoleafClient {
    /// Request a new auth token.
    ///
    /// `POST /api/v1/new`
    pub async fn add_user(&self) -> Result<String, Error> {
        let url = self.api_url("new")?;
        let resp = self.post_empty(url, "/api/v1/new").await?;

        let status = resp.status();
        debug!(status = status.as_u16(), "pairing response");

        if status == StatusCode::FORBIDDEN {
            return Err(Error::PairingWindowClosed);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                path: "/api/v1/new".into(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: NewUserResponse = decode(resp).await?;
        let token = parsed
            .auth_token
            .filter(|t| !t.is_empty())
            .ok_or(Error::MissingToken)?;

        info!("device issued a new auth token");
        Ok(token)
    }
}
