//! Control and read command handlers.

use serde::Serialize;
use tabled::Tabled;

use leafline_core::{AppliedValue, ControlIntent, ControlScope, Controller, FullState, Outcome};

use crate::cli::{EffectsArgs, EffectsCommand, GlobalOpts};
use crate::error::{self, CliError};
use crate::output;

use super::ensure_address;

// ── Row types ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct EffectRow {
    #[tabled(rename = "Effect")]
    name: String,
}

/// What a successful write reports back.
#[derive(Serialize)]
struct Applied {
    intent: &'static str,
    value: AppliedValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
}

fn field_label(intent: &ControlIntent) -> &'static str {
    match intent {
        ControlIntent::SetPower(_) => "power",
        ControlIntent::SetBrightness(_) => "brightness",
        ControlIntent::SetColorTemperature(_) => "ct",
        ControlIntent::SetHue(_) => "hue",
        ControlIntent::SetSaturation(_) => "sat",
        ControlIntent::SelectEffect(_) => "effect",
    }
}

// ── Writes ──────────────────────────────────────────────────────────

/// Validate locally, make sure there is a device, then relay the intent.
pub async fn apply(
    controller: &Controller,
    scope: &ControlScope,
    intent: &ControlIntent,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let field = field_label(intent);
    intent
        .validate(&controller.config().ct_bounds)
        .map_err(|reason| CliError::Validation {
            field: field.into(),
            reason,
        })?;
    ensure_address(scope, global).await?;

    let (value, status) = match scope.execute(intent).await {
        Outcome::Success { value, status } => (value, status),
        failure => return Err(CliError::from_failure(failure, field)),
    };
    tracing::debug!(intent = intent.name(), ?status, "intent applied");

    let applied = Applied {
        intent: intent.name(),
        value,
        status,
    };
    let out = output::render_single(
        &global.output,
        &applied,
        |a| format!("{field} set to {}", a.value),
        |a| a.value.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Reads ───────────────────────────────────────────────────────────

pub async fn state(scope: &ControlScope, global: &GlobalOpts) -> Result<(), CliError> {
    ensure_address(scope, global).await?;
    let state = error::require(scope.get_state().await, "state")?;
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &state,
        |s| detail(s, color),
        |s| output::power_label(s.on, false),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn effects(
    controller: &Controller,
    scope: &ControlScope,
    args: EffectsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        EffectsCommand::List => {
            ensure_address(scope, global).await?;
            let names = error::require(scope.get_effects_list().await, "effects")?;
            let out = output::render_list(
                &global.output,
                &names,
                |n| EffectRow { name: n.clone() },
                Clone::clone,
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
        EffectsCommand::Select { name } => {
            apply(controller, scope, &ControlIntent::SelectEffect(name), global).await
        }
    }
}

fn detail(state: &FullState, color: bool) -> String {
    let num = |v: Option<i64>| v.map_or_else(|| "-".into(), |v| v.to_string());
    let text = |v: Option<&String>| v.map_or_else(|| "-".into(), Clone::clone);
    let lines = [
        ("Name", text(state.device.name.as_ref())),
        ("Model", text(state.device.model.as_ref())),
        ("Firmware", text(state.device.firmware_version.as_ref())),
        ("Power", output::power_label(state.on, color)),
        ("Brightness", num(state.brightness)),
        ("Colour temp", state.ct.map_or_else(|| "-".into(), |k| format!("{k} K"))),
        ("Hue", num(state.hue)),
        ("Saturation", num(state.sat)),
        ("Colour mode", text(state.color_mode.as_ref())),
        ("Effect", text(state.effect.as_ref())),
    ];
    lines
        .iter()
        .map(|(k, v)| format!("{} {v}", output::key(&format!("{k:<12}"), color)))
        .collect::<Vec<_>>()
        .join("\n")
}
