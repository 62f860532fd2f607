//! Command dispatch: bridges CLI args -> controller intents -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod setup;

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use leafline_core::{ControlIntent, ControlScope, Controller, DeviceAddress};

use crate::cli::{Command, GlobalOpts};
use crate::error::{self, CliError};

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let scope = controller.process();
    match cmd {
        Command::Discover(args) => setup::discover(&scope, args, global).await,
        Command::Pair(args) => setup::pair(&scope, args, global).await,
        Command::State => control::state(&scope, global).await,
        Command::Effects(args) => control::effects(controller, &scope, args, global).await,
        Command::Power(args) => {
            let intent = ControlIntent::SetPower(args.state.is_on());
            control::apply(controller, &scope, &intent, global).await
        }
        Command::Brightness(args) => {
            let intent = ControlIntent::SetBrightness(args.value);
            control::apply(controller, &scope, &intent, global).await
        }
        Command::Ct(args) => {
            let intent = ControlIntent::SetColorTemperature(args.value);
            control::apply(controller, &scope, &intent, global).await
        }
        Command::Hue(args) => {
            let intent = ControlIntent::SetHue(args.value);
            control::apply(controller, &scope, &intent, global).await
        }
        Command::Sat(args) => {
            let intent = ControlIntent::SetSaturation(args.value);
            control::apply(controller, &scope, &intent, global).await
        }
        // Handled before a controller exists
        Command::Config(_) | Command::Completions(_) | Command::Serve(_) => Ok(()),
    }
}

// ── Shared helpers ──────────────────────────────────────────────────

/// Spinner on stderr while mDNS runs; hidden when quiet or piped.
fn spinner(message: &'static str, global: &GlobalOpts) -> ProgressBar {
    if global.quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Browse for a panel and bind it to `scope`, showing progress.
async fn discover_into(scope: &ControlScope, global: &GlobalOpts) -> Result<DeviceAddress, CliError> {
    let bar = spinner("Searching for a Nanoleaf panel...", global);
    let outcome = scope.discover().await;
    bar.finish_and_clear();
    error::require(outcome, "address")
}

/// Make sure the session has an address, discovering one if needed.
///
/// Discovery only happens here, before any device call, and says so on
/// stderr.
async fn ensure_address(scope: &ControlScope, global: &GlobalOpts) -> Result<(), CliError> {
    if scope.snapshot().address.is_some() {
        return Ok(());
    }
    if !global.quiet {
        eprintln!("No device address configured; running discovery");
    }
    let address = discover_into(scope, global).await?;
    if !global.quiet {
        eprintln!("Found panel at {address}");
    }
    Ok(())
}
