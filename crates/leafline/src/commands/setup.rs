//! Device setup: discovery and pairing.

use serde::Serialize;

use leafline_config::save_device_address;
use leafline_core::ControlScope;

use crate::cli::{DiscoverArgs, GlobalOpts, PairArgs};
use crate::config;
use crate::error::{self, CliError};
use crate::output;

use super::{discover_into, ensure_address};

#[derive(Serialize)]
struct Found {
    address: String,
    host: String,
    port: u16,
}

#[derive(Serialize)]
struct Paired {
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

pub async fn discover(scope: &ControlScope, args: DiscoverArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let address = discover_into(scope, global).await?;

    if args.save {
        let path = config::active_path(global);
        let written = save_device_address(&address, Some(&path))?;
        if !global.quiet {
            eprintln!("Saved address to {}", written.display());
        }
    }

    let found = Found {
        address: address.to_string(),
        host: address.host().to_owned(),
        port: address.port(),
    };
    let out = output::render_single(
        &global.output,
        &found,
        |f| format!("Found Nanoleaf panel at {}", f.address),
        |f| f.address.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn pair(scope: &ControlScope, args: PairArgs, global: &GlobalOpts) -> Result<(), CliError> {
    ensure_address(scope, global).await?;
    let address = scope
        .snapshot()
        .address
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    if !global.quiet {
        eprintln!("Requesting a token from {address}");
    }

    let credential = error::require(scope.pair().await, "pair")?;
    let paired = Paired {
        address,
        token: args.show_token.then(|| credential.expose().to_owned()),
    };
    let out = output::render_single(
        &global.output,
        &paired,
        |p| match p.token {
            Some(ref token) => format!("Paired with {}\nToken: {token}", p.address),
            None => format!("Paired with {}; token stored in the system keyring", p.address),
        },
        |p| p.token.clone().unwrap_or_else(|| p.address.clone()),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
