//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const MASK: &str = "********";

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let mut cfg = config::load(global)?;
            if cfg.device.token.is_some() {
                cfg.device.token = Some(MASK.into());
            }
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| {
                    toml::to_string_pretty(c)
                        .unwrap_or_else(|e| format!("failed to render config: {e}"))
                },
                |c| c.device.address.clone().unwrap_or_default(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::active_path(global).display().to_string(), global.quiet);
            Ok(())
        }
    }
}
