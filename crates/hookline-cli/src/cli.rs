use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hookline")]
#[command(about = "Hookline - lifecycle hook dispatch engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the rules file (default: $HOOKLINE_CONFIG or ./hookline.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Surface handler-failure reasons in decisions (always logged)
    #[arg(long, default_value = "false")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scaffold a starter rules file
    Init {
        /// Path for the new rules file
        #[arg(default_value = "hookline.toml")]
        path: PathBuf,
    },
    /// Validate the rules file and report excluded rules
    Check,
    /// Dispatch one event and print the terminal decision as JSON
    Dispatch {
        /// Read the event JSON from a file instead of stdin
        #[arg(long)]
        event: Option<PathBuf>,
        /// List the rules that would run without executing handlers
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },
}
