// ── Control intents ──
//
// One variant per user action. Validation happens here, before any
// session or network access, and yields exactly one device call.

use std::fmt;
use std::ops::RangeInclusive;

use leafline_api::{StateField, StateValue, StateWrite};
use serde::{Deserialize, Serialize};

use crate::config::ColorTempBounds;

pub const BRIGHTNESS_RANGE: RangeInclusive<i64> = 0..=100;
pub const HUE_RANGE: RangeInclusive<i64> = 0..=360;
pub const SATURATION_RANGE: RangeInclusive<i64> = 0..=100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", content = "value", rename_all = "snake_case")]
pub enum ControlIntent {
    SetPower(bool),
    SetBrightness(i64),
    /// Kelvin.
    SetColorTemperature(i64),
    /// Degrees.
    SetHue(i64),
    SetSaturation(i64),
    SelectEffect(String),
}

/// The value a successful intent applied, echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AppliedValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl fmt::Display for AppliedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("on"),
            Self::Bool(false) => f.write_str("off"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// The device request a validated intent turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAction {
    State(StateWrite),
    Effect(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedIntent {
    pub action: DeviceAction,
    pub applied: AppliedValue,
}

impl ControlIntent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetPower(_) => "set_power",
            Self::SetBrightness(_) => "set_brightness",
            Self::SetColorTemperature(_) => "set_color_temperature",
            Self::SetHue(_) => "set_hue",
            Self::SetSaturation(_) => "set_saturation",
            Self::SelectEffect(_) => "select_effect",
        }
    }

    /// Check parameters against the accepted ranges.
    pub fn validate(&self, ct_bounds: &ColorTempBounds) -> Result<ValidatedIntent, String> {
        match self {
            Self::SetPower(on) => Ok(state(StateField::On, StateValue::Bool(*on), AppliedValue::Bool(*on))),
            Self::SetBrightness(v) => ranged("brightness", StateField::Brightness, *v, &BRIGHTNESS_RANGE),
            Self::SetColorTemperature(v) => {
                ranged("colour temperature", StateField::Ct, *v, &ct_bounds.range())
            }
            Self::SetHue(v) => ranged("hue", StateField::Hue, *v, &HUE_RANGE),
            Self::SetSaturation(v) => ranged("saturation", StateField::Sat, *v, &SATURATION_RANGE),
            Self::SelectEffect(name) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err("effect name must not be empty".into());
                }
                Ok(ValidatedIntent {
                    action: DeviceAction::Effect(name.to_owned()),
                    applied: AppliedValue::Text(name.to_owned()),
                })
            }
        }
    }
}

fn state(field: StateField, value: StateValue, applied: AppliedValue) -> ValidatedIntent {
    ValidatedIntent {
        action: DeviceAction::State(StateWrite::new(field, value)),
        applied,
    }
}

fn ranged(
    label: &str,
    field: StateField,
    value: i64,
    range: &RangeInclusive<i64>,
) -> Result<ValidatedIntent, String> {
    if range.contains(&value) {
        Ok(state(field, StateValue::Int(value), AppliedValue::Int(value)))
    } else {
        Err(format!(
            "{label} {value} out of range (allowed {}-{})",
            range.start(),
            range.end()
        ))
    }
}
