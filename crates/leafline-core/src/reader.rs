// ── State reader ──
//
// Read-only twin of the relay: same session gate, same error
// classification, no validation step.

use leafline_api::DeviceInfo;
use serde::Serialize;

use crate::config::ColorTempBounds;
use crate::connector::Connector;
use crate::credential::CredentialManager;
use crate::intent::{BRIGHTNESS_RANGE, HUE_RANGE, SATURATION_RANGE};
use crate::outcome::Outcome;
use crate::relay::settle;
use crate::session::SessionHandle;

/// Status reported for successful reads; the client only returns the body
/// for 2xx responses.
const READ_OK: u16 = 200;

/// Panel state plus the full device description it was read from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullState {
    pub on: Option<bool>,
    pub brightness: Option<i64>,
    pub ct: Option<i64>,
    pub hue: Option<i64>,
    pub sat: Option<i64>,
    pub color_mode: Option<String>,
    /// Currently selected effect.
    pub effect: Option<String>,
    /// Everything the device reported, untouched.
    pub device: DeviceInfo,
}

impl FullState {
    pub fn from_device(device: DeviceInfo, ct_bounds: &ColorTempBounds) -> Self {
        let state = &device.state;
        let bounded = |v: Option<&leafline_api::RangedValue>, lo: i64, hi: i64| {
            v.map(|r| r.value.clamp(lo, hi))
        };
        Self {
            on: state.on.map(|f| f.value),
            brightness: bounded(state.brightness.as_ref(), *BRIGHTNESS_RANGE.start(), *BRIGHTNESS_RANGE.end()),
            ct: bounded(state.ct.as_ref(), ct_bounds.min(), ct_bounds.max()),
            hue: bounded(state.hue.as_ref(), *HUE_RANGE.start(), *HUE_RANGE.end()),
            sat: bounded(state.sat.as_ref(), *SATURATION_RANGE.start(), *SATURATION_RANGE.end()),
            color_mode: state.color_mode.clone(),
            effect: device.effects.select.clone(),
            device,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateReader {
    session: SessionHandle,
    credentials: CredentialManager,
    connector: Connector,
    ct_bounds: ColorTempBounds,
}

impl StateReader {
    pub fn new(
        session: SessionHandle,
        credentials: CredentialManager,
        connector: Connector,
        ct_bounds: ColorTempBounds,
    ) -> Self {
        Self {
            session,
            credentials,
            connector,
            ct_bounds,
        }
    }

    pub async fn read_state(&self) -> Outcome<FullState> {
        let ready = match self.session.require() {
            Ok(ready) => ready,
            Err(nc) => return nc.into(),
        };
        let client = match self.connector.client_for(&ready.address) {
            Ok(client) => client,
            Err(e) => return Outcome::unreachable(e.to_string()),
        };

        let result = client
            .device_info(ready.credential.secret())
            .await
            .map(|info| (FullState::from_device(info, &self.ct_bounds), READ_OK));
        settle(&self.credentials, &ready, "read_state", result)
    }

    pub async fn read_effects_list(&self) -> Outcome<Vec<String>> {
        let ready = match self.session.require() {
            Ok(ready) => ready,
            Err(nc) => return nc.into(),
        };
        let client = match self.connector.client_for(&ready.address) {
            Ok(client) => client,
            Err(e) => return Outcome::unreachable(e.to_string()),
        };

        let result = client
            .effects_list(ready.credential.secret())
            .await
            .map(|effects| (effects, READ_OK));
        settle(&self.credentials, &ready, "read_effects_list", result)
    }
}
