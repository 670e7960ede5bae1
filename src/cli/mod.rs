//! Command-line interface definitions.

pub mod banner;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// bracket15 - automated market making for 15-minute up/down brackets.
#[derive(Parser, Debug)]
#[command(name = "bracket15")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: PathBuf,

    /// Override log level (debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scanner loop (foreground, until Ctrl-C)
    Run(RunArgs),

    /// Print a one-shot status snapshot and exit
    Status,

    /// List aborted executions with an unresolved hedge leg
    Unresolved,

    /// Apply any pending database migrations and exit
    Migrate,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Skip the startup banner
    #[arg(long)]
    pub no_banner: bool,

    /// Use JSON log format instead of pretty
    #[arg(long)]
    pub json_logs: bool,
}
