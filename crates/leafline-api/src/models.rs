// Wire types for the device's `/api/v1` surface.
//
// Read models keep every field the device sends: the handful the panel
// needs are typed, the rest ride along in `extra` maps so the full state
// round-trips unmodified.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

// ── Writes ──────────────────────────────────────────────────────────

/// A single field of the `/state` resource that accepts `{"value": v}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum StateField {
    On,
    Brightness,
    Ct,
    Hue,
    Sat,
}

/// Value carried by a state write. Power takes a boolean, everything else
/// an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Int(i64),
}

/// Body of `PUT /api/v1/{token}/state`: `{"<field>": {"value": <v>}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateWrite {
    pub field: StateField,
    pub value: StateValue,
}

impl StateWrite {
    pub fn new(field: StateField, value: StateValue) -> Self {
        Self { field, value }
    }
}

#[derive(Serialize)]
struct ValueEnvelope {
    value: StateValue,
}

impl Serialize for StateWrite {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.field.as_ref(), &ValueEnvelope { value: self.value })?;
        map.end()
    }
}

/// Body of `PUT /api/v1/{token}/effects`.
#[derive(Debug, Clone, Serialize)]
pub struct EffectSelect<'a> {
    pub select: &'a str,
}

// ── Reads ───────────────────────────────────────────────────────────

/// Response of `POST /api/v1/new`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUserResponse {
    #[serde(default)]
    pub auth_token: Option<String>,
}

/// `{"value": true}` as reported for `state.on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagValue {
    pub value: bool,
}

/// `{"value": 50, "min": 0, "max": 100}` as reported for ranged fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangedValue {
    pub value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<FlagValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<RangedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<RangedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sat: Option<RangedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ct: Option<RangedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_mode: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Effects {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    #[serde(default)]
    pub effects_list: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Full device description returned by `GET /api/v1/{token}/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub state: DeviceState,
    #[serde(default)]
    pub effects: Effects,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn state_write_uses_single_field_envelope() {
        let write = StateWrite::new(StateField::Brightness, StateValue::Int(42));
        assert_eq!(
            serde_json::to_value(write).unwrap(),
            json!({ "brightness": { "value": 42 } })
        );

        let write = StateWrite::new(StateField::On, StateValue::Bool(false));
        assert_eq!(
            serde_json::to_value(write).unwrap(),
            json!({ "on": { "value": false } })
        );
    }

    #[test]
    fn state_field_wire_names() {
        assert_eq!(StateField::Ct.as_ref(), "ct");
        assert_eq!(StateField::Sat.to_string(), "sat");
        assert_eq!("hue".parse::<StateField>().unwrap(), StateField::Hue);
    }

    #[test]
    fn device_info_keeps_unknown_fields() {
        let raw = json!({
            "name": "Shapes 4E2A",
            "serialNo": "S19124C8036",
            "firmwareVersion": "9.2.4",
            "model": "NL42",
            "panelLayout": { "layout": { "numPanels": 9 } },
            "state": {
                "on": { "value": true },
                "brightness": { "value": 64, "max": 100, "min": 0 },
                "ct": { "value": 4000, "max": 6500, "min": 1200 },
                "colorMode": "effect",
                "alert": { "value": "none" }
            },
            "effects": {
                "select": "Northern Lights",
                "effectsList": ["Northern Lights", "Forest"]
            }
        });

        let info: DeviceInfo = serde_json::from_value(raw).unwrap();
        assert_eq!(info.state.brightness.unwrap().value, 64);
        assert_eq!(info.state.ct.unwrap().max, Some(6500));
        assert_eq!(info.state.color_mode.as_deref(), Some("effect"));
        assert!(info.state.hue.is_none());
        assert!(info.extra.contains_key("panelLayout"));
        assert!(info.state.extra.contains_key("alert"));
        assert_eq!(info.effects.effects_list.len(), 2);

        let back = serde_json::to_value(&info).unwrap();
        assert_eq!(back["panelLayout"]["layout"]["numPanels"], 9);
        assert_eq!(back["serialNo"], "S19124C8036");
    }
}
