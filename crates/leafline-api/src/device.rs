// State and effect endpoints
//
// Everything under `/api/v1/{token}/`. Writes return the device's status
// code (usually 204) so callers can echo it; reads decode JSON.

use secrecy::SecretString;

use crate::client::NanoleafClient;
use crate::error::Error;
use crate::models::{DeviceInfo, EffectSelect, StateWrite};

impl NanoleafClient {
    /// Write one state field.
    ///
    /// `PUT /api/v1/{token}/state` with `{"<field>": {"value": <v>}}`
    pub async fn put_state(&self, token: &SecretString, write: &StateWrite) -> Result<u16, Error> {
        let url = self.token_url(token, "state")?;
        self.put_json(url, "/api/v1/***/state", write).await
    }

    /// Activate an effect by name.
    ///
    /// `PUT /api/v1/{token}/effects` with `{"select": "<name>"}`
    pub async fn select_effect(&self, token: &SecretString, name: &str) -> Result<u16, Error> {
        let url = self.token_url(token, "effects")?;
        self.put_json(url, "/api/v1/***/effects", &EffectSelect { select: name })
            .await
    }

    /// List installed effect names.
    ///
    /// `GET /api/v1/{token}/effects/effectsList`
    pub async fn effects_list(&self, token: &SecretString) -> Result<Vec<String>, Error> {
        let url = self.token_url(token, "effects/effectsList")?;
        self.get_json(url, "/api/v1/***/effects/effectsList").await
    }

    /// Fetch the full device description, including current state.
    ///
    /// `GET /api/v1/{token}/`
    pub async fn device_info(&self, token: &SecretString) -> Result<DeviceInfo, Error> {
        let url = self.token_url(token, "")?;
        self.get_json(url, "/api/v1/***/").await
    }
}
