//! Clap derive structures for the `leafline` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// leafline -- control Nanoleaf light panels on the local network
#[derive(Debug, Parser)]
#[command(
    name = "leafline",
    version,
    about = "Control Nanoleaf light panels from the command line",
    long_about = "Discover, pair with, and control a Nanoleaf panel over its local HTTP API.\n\n\
        `leafline serve` runs the same controls as a small HTTP relay for a browser panel.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device address as host:port (a bare host uses the default API port)
    #[arg(long, short = 'H', env = "NANOLEAF_HOST", global = true)]
    pub host: Option<String>,

    /// Auth token (overrides config and keyring)
    #[arg(long, env = "NANOLEAF_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "LEAFLINE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LEAFLINE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Device request timeout in seconds
    #[arg(long, env = "LEAFLINE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Find a panel on the local network via mDNS
    Discover(DiscoverArgs),

    /// Request a new auth token (hold the power button 5-7 s first)
    Pair(PairArgs),

    /// Show the current panel state
    #[command(alias = "status")]
    State,

    /// List or select lighting effects
    #[command(alias = "fx")]
    Effects(EffectsArgs),

    /// Switch the panel on or off
    Power(PowerArgs),

    /// Set brightness (0-100)
    #[command(alias = "bri")]
    Brightness(ValueArgs),

    /// Set colour temperature in Kelvin
    Ct(ValueArgs),

    /// Set hue in degrees (0-360)
    Hue(ValueArgs),

    /// Set saturation (0-100)
    Sat(ValueArgs),

    /// Inspect CLI configuration
    Config(ConfigArgs),

    /// Run the HTTP relay for the browser panel
    Serve(ServeArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Device setup ─────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Write the found address to the config file
    #[arg(long)]
    pub save: bool,
}

#[derive(Debug, Args)]
pub struct PairArgs {
    /// Print the new token instead of only storing it
    #[arg(long)]
    pub show_token: bool,
}

// ── Control ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EffectsArgs {
    #[command(subcommand)]
    pub command: EffectsCommand,
}

#[derive(Debug, Subcommand)]
pub enum EffectsCommand {
    /// List installed effects
    #[command(alias = "ls")]
    List,

    /// Activate an effect by name
    Select {
        /// Effect name as listed by `effects list`
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct PowerArgs {
    pub state: PowerState,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Debug, Args)]
pub struct ValueArgs {
    /// Target value; out-of-range values are rejected before any request
    #[arg(allow_negative_numbers = true)]
    pub value: i64,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,
}

// ── Server ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Listen address (overrides `[server] bind`)
    #[arg(long, short = 'b', env = "LEAFLINE_BIND")]
    pub bind: Option<String>,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
