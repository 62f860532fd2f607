mod cli;
mod commands;
mod config;
mod error;
mod output;
mod server;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use leafline_core::Controller;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose, cli.global.quiet);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Logs go to stderr so `--output json` stays machine-readable.
fn init_tracing(verbosity: u8, quiet: bool) {
    let filter = match (quiet, verbosity) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a device
        Command::Config(ref args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "leafline", &mut std::io::stdout());
            Ok(())
        }

        Command::Serve(args) => {
            let resolved = config::resolve(&cli.global)?;
            let bind = match args.bind {
                Some(ref raw) => raw.parse().map_err(|_| CliError::Validation {
                    field: "bind".into(),
                    reason: format!("expected ip:port, got '{raw}'"),
                })?,
                None => resolved.file.bind_addr()?,
            };
            let policy = server::RelayPolicy::from_section(&resolved.file.server)?;
            let controller = Controller::builder(resolved.core)
                .store(resolved.store)
                .build()?;
            server::run(controller, bind, policy).await
        }

        cmd => {
            let resolved = config::resolve(&cli.global)?;
            let controller = Controller::builder(resolved.core)
                .store(resolved.store)
                .build()?;

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &controller, &cli.global).await;
            controller.stop_discovery();
            result
        }
    }
}
